// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Command-line values (with their environment fallbacks already applied by
//! clap) override the defaults.

use std::path::PathBuf;

use super::types::ResolvedConfig;

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub max_iterations: Option<usize>,
    pub resource_scheme: Option<String>,
    pub verbose: bool,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge CLI options over the defaults.
///
/// `server_config` is the already located server document.
pub fn merge_config(server_config: Option<PathBuf>, cli: CliOptions) -> ResolvedConfig {
    let mut result = default_config();
    result.server_config = server_config;

    if cli.api_key.is_some() {
        result.api_key = cli.api_key;
    }

    if let Some(base_url) = cli.base_url {
        result.base_url = base_url;
    }

    if let Some(model) = cli.model {
        result.model = model;
    }

    if let Some(max_tokens) = cli.max_tokens {
        result.max_tokens = max_tokens;
    }

    if let Some(max_iterations) = cli.max_iterations {
        result.max_iterations = max_iterations.max(1);
    }

    if let Some(scheme) = cli.resource_scheme {
        let scheme = scheme.trim_end_matches("://").to_string();
        if !scheme.is_empty() {
            result.resource_scheme = scheme;
        }
    }

    result.verbose = cli.verbose;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_overrides() {
        let config = merge_config(None, CliOptions::default());
        assert_eq!(config.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.resource_scheme, "papers");
        assert!(config.server_config.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = CliOptions {
            model: Some("claude-3-5-haiku-latest".to_string()),
            max_tokens: Some(512),
            max_iterations: Some(0),
            resource_scheme: Some("notes://".to_string()),
            verbose: true,
            ..Default::default()
        };
        let config = merge_config(Some(PathBuf::from("servers.json")), cli);

        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.max_iterations, 1);
        assert_eq!(config.resource_scheme, "notes");
        assert_eq!(config.server_config, Some(PathBuf::from("servers.json")));
        assert!(config.verbose);
    }

    #[test]
    fn test_empty_scheme_keeps_default() {
        let cli = CliOptions {
            resource_scheme: Some("://".to_string()),
            ..Default::default()
        };
        assert_eq!(merge_config(None, cli).resource_scheme, "papers");
    }
}
