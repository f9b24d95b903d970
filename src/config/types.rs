// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration types.

use std::path::PathBuf;

use serde::Serialize;

use crate::providers::anthropic::DEFAULT_MAX_TOKENS;
use crate::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Default scheme used by the `@folders` and `@topic` shortcuts.
pub const DEFAULT_RESOURCE_SCHEME: &str = "papers";

/// Default cap on model calls per query.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Resolved configuration with all values set.
///
/// This is the merged result of CLI flags, environment and defaults.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    /// Path to the `mcpServers` document, if one was found.
    pub server_config: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_iterations: usize,
    pub resource_scheme: String,
    pub verbose: bool,
}

impl ResolvedConfig {
    /// Whether an API key is available for model calls.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            server_config: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            resource_scheme: DEFAULT_RESOURCE_SCHEME.to_string(),
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolvedConfig::default();
        assert_eq!(config.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.max_tokens, 2024);
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.resource_scheme, "papers");
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = ResolvedConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        assert!(config.has_api_key());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("\"resourceScheme\":\"papers\""));
    }
}
