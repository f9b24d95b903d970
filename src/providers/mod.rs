// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model provider implementations.
//!
//! - [`anthropic::AnthropicProvider`] - Claude models via the Anthropic API
//!
//! # Quick Start
//!
//! ```bash
//! export ANTHROPIC_API_KEY=your-key
//! ```
//!
//! ```rust,ignore
//! use mcp_chatbot::providers::create_provider_from_env;
//!
//! let provider = create_provider_from_env()?;
//! let response = provider.chat(&messages, Some(&tools), None).await?;
//! ```

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use crate::config::ResolvedConfig;
use crate::error::ProviderError;
use crate::types::{BoxedProvider, ProviderConfig};

/// Default model.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Create an Anthropic provider from explicit configuration.
pub fn create_provider(config: ProviderConfig) -> Result<BoxedProvider, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ProviderError::NotConfigured("ANTHROPIC_API_KEY is not set".to_string()))?;

    let model = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    Ok(Box::new(AnthropicProvider::new(api_key, model, base_url, config)?))
}

/// Create a provider from environment variables.
///
/// | Variable | Description |
/// |----------|-------------|
/// | `ANTHROPIC_API_KEY` | Anthropic API key (required) |
/// | `ANTHROPIC_BASE_URL` | Custom API base URL |
/// | `MCP_CHATBOT_MODEL` | Override default model |
pub fn create_provider_from_env() -> Result<BoxedProvider, ProviderError> {
    let config = ProviderConfig {
        api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
        base_url: std::env::var("ANTHROPIC_BASE_URL").ok(),
        model: std::env::var("MCP_CHATBOT_MODEL").ok(),
        ..Default::default()
    };
    create_provider(config)
}

/// Create a provider from the resolved application configuration.
pub fn create_provider_from_config(
    config: &ResolvedConfig,
) -> Result<BoxedProvider, ProviderError> {
    // A missing key becomes blank, which `create_provider` rejects.
    let api_key = config.api_key.clone().unwrap_or_default();
    let provider_config = ProviderConfig::new(api_key, &config.model)
        .with_base_url(&config.base_url)
        .with_max_tokens(config.max_tokens);
    create_provider(provider_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        let err = create_provider(ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let blank = ProviderConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(create_provider(blank).is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let provider = create_provider(ProviderConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(provider.name(), "Anthropic");
        assert_eq!(provider.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_from_resolved_config() {
        let config = ResolvedConfig {
            api_key: Some("key".to_string()),
            model: "claude-3-5-haiku-latest".to_string(),
            ..Default::default()
        };
        let provider = create_provider_from_config(&config).unwrap();
        assert_eq!(provider.model(), "claude-3-5-haiku-latest");
    }

    #[test]
    fn test_from_resolved_config_without_key() {
        let err = create_provider_from_config(&ResolvedConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
