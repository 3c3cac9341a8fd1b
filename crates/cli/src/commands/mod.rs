//! CLI subcommand implementations.

use std::fmt;
use std::sync::Arc;

use toolgate_agent::{CompositeDispatcher, DomainRouter};
use toolgate_config::AppConfig;
use toolgate_core::ToolHandler;
use toolgate_security::WorkspaceGuard;
use toolgate_tools::{assistant_domain, files_domain, git_domain, system_domain};

pub mod chat;
pub mod config_cmd;
pub mod run;
pub mod serve;
pub mod tools;

/// Command failures, split by exit code: configuration and usage problems
/// exit 2, turn failures exit 1.
#[derive(Debug)]
pub enum CliError {
    Config(String),
    Turn(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => 2,
            CliError::Turn(_) => 1,
        }
    }

    pub fn config(e: impl fmt::Display) -> Self {
        CliError::Config(e.to_string())
    }

    pub fn turn(e: impl fmt::Display) -> Self {
        CliError::Turn(e.to_string())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) | CliError::Turn(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {}

/// Load and validate the configuration, with a readable hint when no API
/// key is present.
pub fn load_config() -> Result<AppConfig, CliError> {
    let config = AppConfig::load().map_err(CliError::config)?;
    config.validate().map_err(CliError::config)?;
    Ok(config)
}

pub fn require_api_key(config: &AppConfig) -> Result<(), CliError> {
    if config.provider.kind == "ollama" || config.has_api_key() {
        return Ok(());
    }
    Err(CliError::Config(format!(
        "no API key configured; set TOOLGATE_API_KEY, OPENROUTER_API_KEY or \
         OPENAI_API_KEY, or add one to {}",
        AppConfig::config_dir().join("config.toml").display()
    )))
}

/// Standard tool wiring: the assistant domain always visible, the other
/// domains behind the router.
pub fn standard_handler(config: &AppConfig) -> Arc<dyn ToolHandler> {
    let root = config.workspace_root();
    let guard = Arc::new(
        WorkspaceGuard::new(&root).with_enforcement(config.workspace.enforce),
    );
    let router = DomainRouter::new()
        .with_domain("files", Arc::new(files_domain(guard)))
        .with_domain("git", Arc::new(git_domain(root.clone())))
        .with_domain(
            "system",
            Arc::new(system_domain(
                root,
                config.workspace.exec_allowlist.clone(),
            )),
        );
    Arc::new(
        CompositeDispatcher::new()
            .with(Arc::new(assistant_domain()))
            .with(Arc::new(router)),
    )
}
