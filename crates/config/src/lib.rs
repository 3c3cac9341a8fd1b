//! Configuration loading, validation, and management for Toolgate.
//!
//! Loads configuration from `~/.toolgate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.toolgate/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider connection settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Agent loop defaults
    #[serde(default)]
    pub agent: AgentConfig,

    /// Workspace boundary settings
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("workspace", &self.workspace)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Connection settings for the chat-completions provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind: "openai", "openrouter", or "ollama"
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// API key; environment variables take precedence when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent with every completion request
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL override; unset means the kind's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_provider_kind() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            api_key: None,
            model: default_model(),
            base_url: None,
        }
    }
}

/// Defaults applied to every agent turn unless the caller overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Hard ceiling on loop iterations per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Require the model to end turns with assistant.final
    #[serde(default = "default_true")]
    pub require_final_tool: bool,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    800
}
fn default_max_steps() -> u32 {
    100
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_steps: default_max_steps(),
            require_final_tool: true,
        }
    }
}

/// Filesystem and command boundaries for tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root; unset means the current directory at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Reject file paths that resolve outside the root
    #[serde(default = "default_true")]
    pub enforce: bool,

    /// Binaries system.exec is allowed to run
    #[serde(default = "default_exec_allowlist")]
    pub exec_allowlist: Vec<String>,
}

fn default_exec_allowlist() -> Vec<String> {
    vec!["ls".into(), "cat".into(), "rg".into(), "git".into()]
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            enforce: true,
            exec_allowlist: default_exec_allowlist(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Oldest sessions are evicted beyond this count
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    42710
}
fn default_max_sessions() -> usize {
    64
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolgate/config.toml).
    ///
    /// Also checks environment variables:
    /// - `TOOLGATE_API_KEY` (highest priority), then `OPENROUTER_API_KEY`,
    ///   then `OPENAI_API_KEY` for the API key
    /// - `TOOLGATE_PROVIDER` and `TOOLGATE_MODEL` for provider selection
    /// - `TOOLGATE_WORKSPACE` for the workspace root
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("TOOLGATE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(kind) = std::env::var("TOOLGATE_PROVIDER") {
            config.provider.kind = kind;
        }

        if let Ok(model) = std::env::var("TOOLGATE_MODEL") {
            config.provider.model = model;
        }

        if let Ok(root) = std::env::var("TOOLGATE_WORKSPACE") {
            config.workspace.root = Some(root);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolgate")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.gateway.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Workspace root, falling back to the process current directory.
    pub fn workspace_root(&self) -> PathBuf {
        match &self.workspace.root {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            agent: AgentConfig::default(),
            workspace: WorkspaceConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
