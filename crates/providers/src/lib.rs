//! Completion-service providers for Codeweave.
//!
//! All providers implement [`codeweave_core::provider::Provider`]. The
//! orchestrator only ever sees the trait object built here.

pub mod openai_compat;

use std::sync::Arc;

use codeweave_config::ProviderConfig;
use codeweave_core::error::ProviderError;
use codeweave_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
///
/// Remote endpoints need an API key; local ones (localhost, 127.0.0.1) do not.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let local = is_local(&config.api_url);
    let api_key = match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ if local => String::new(),
        _ => {
            return Err(ProviderError::NotConfigured(
                "no API key set (provider.api_key, CODEWEAVE_API_KEY or OPENAI_API_KEY)".into(),
            ));
        }
    };

    let name = provider_name(&config.api_url);
    tracing::debug!(provider = name, url = %config.api_url, "Building provider");
    Ok(Arc::new(OpenAiCompatProvider::new(name, &config.api_url, api_key)?))
}

fn is_local(url: &str) -> bool {
    url.contains("://localhost") || url.contains("://127.0.0.1")
}

/// Well-known host to provider name.
fn provider_name(url: &str) -> &'static str {
    if url.contains("openrouter.ai") {
        "openrouter"
    } else if url.contains("api.openai.com") {
        "openai"
    } else if url.contains(":11434") {
        "ollama"
    } else {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_provider_requires_key() {
        let config = ProviderConfig::default();
        assert!(matches!(build_from_config(&config), Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = ProviderConfig {
            api_key: Some("   ".into()),
            ..Default::default()
        };
        assert!(build_from_config(&config).is_err());
    }

    #[test]
    fn local_provider_needs_no_key() {
        let config = ProviderConfig {
            api_url: "http://localhost:11434/v1".into(),
            ..Default::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn keyed_provider_named_by_host() {
        let config = ProviderConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert_eq!(build_from_config(&config).unwrap().name(), "openai");
    }
}
