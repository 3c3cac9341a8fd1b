//! Chat-completions clients for Toolgate.
//!
//! All clients implement the `toolgate_core::CompletionClient` trait.
//! `build_from_config` selects and constructs the right one from
//! application configuration.

use std::sync::Arc;
use toolgate_config::AppConfig;
use toolgate_core::{CompletionClient, TransportError};

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

/// Build a completion client from configuration.
///
/// Resolves the base URL from `provider.base_url` or the kind's
/// well-known default. Every kind except Ollama requires an API key.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn CompletionClient>, TransportError> {
    let kind = config.provider.kind.as_str();
    let model = config.provider.model.clone();

    let base_url = match config.provider.base_url.clone() {
        Some(url) => url,
        None => default_base_url(kind).ok_or_else(|| {
            TransportError::NotConfigured(format!(
                "unknown provider kind '{kind}': set provider.base_url in config.toml"
            ))
        })?,
    };

    let api_key = match config.provider.api_key.clone() {
        Some(key) => key,
        // Ollama runs locally and takes any placeholder key
        None if kind == "ollama" => "ollama".into(),
        None => {
            return Err(TransportError::NotConfigured(
                "no API key configured: set TOOLGATE_API_KEY or provider.api_key in config.toml"
                    .into(),
            ));
        }
    };

    Ok(Arc::new(OpenAiCompatClient::new(
        kind, base_url, api_key, model,
    )))
}

/// Get the default base URL for well-known provider kinds.
fn default_base_url(kind: &str) -> Option<String> {
    match kind {
        "openrouter" => Some("https://openrouter.ai/api/v1".into()),
        "openai" => Some("https://api.openai.com/v1".into()),
        "ollama" => Some("http://localhost:11434/v1".into()),
        "deepseek" => Some("https://api.deepseek.com/v1".into()),
        "groq" => Some("https://api.groq.com/openai/v1".into()),
        "vllm" => Some("http://localhost:8000/v1".into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").unwrap().contains("openrouter.ai"));
        assert!(default_base_url("openai").unwrap().contains("api.openai.com"));
        assert!(default_base_url("ollama").unwrap().contains("localhost:11434"));
        assert!(default_base_url("something-else").is_none());
    }

    #[test]
    fn build_with_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-test".into());
        let client = build_from_config(&config).unwrap();
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn build_without_api_key_fails() {
        let config = AppConfig::default();
        let err = match build_from_config(&config) {
            Ok(_) => panic!("expected build_from_config to fail"),
            Err(err) => err,
        };
        assert!(matches!(err, TransportError::NotConfigured(_)));
    }

    #[test]
    fn build_ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.provider.kind = "ollama".into();
        config.provider.model = "llama3".into();
        let client = build_from_config(&config).unwrap();
        assert_eq!(client.name(), "ollama");
    }

    #[test]
    fn build_unknown_kind_requires_base_url() {
        let mut config = AppConfig::default();
        config.provider.kind = "my-proxy".into();
        config.provider.api_key = Some("sk-test".into());
        assert!(build_from_config(&config).is_err());

        config.provider.base_url = Some("http://localhost:9000/v1".into());
        let client = build_from_config(&config).unwrap();
        assert_eq!(client.name(), "my-proxy");
    }
}
