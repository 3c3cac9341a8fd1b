//! `toolgate config` — show the effective configuration.

use toolgate_config::AppConfig;

use super::{CliError, load_config};

pub fn run() -> Result<(), CliError> {
    let config = load_config()?;
    println!(
        "config file: {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    println!("workspace:   {}", config.workspace_root().display());
    // the Debug impl redacts the API key
    println!("{config:#?}");
    Ok(())
}
