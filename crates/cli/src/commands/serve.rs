//! `toolgate serve` — start the HTTP gateway.

use super::{CliError, load_config, require_api_key};

pub async fn run(host: Option<String>, port: Option<u16>) -> Result<(), CliError> {
    let mut config = load_config()?;
    require_api_key(&config)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    toolgate_gateway::start(config).await.map_err(CliError::turn)
}
