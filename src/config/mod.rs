// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module.
//!
//! Two sources feed the chatbot:
//! - Server config: the `mcpServers` document (`server_config.json` or YAML)
//! - CLI options: command-line arguments with environment fallbacks
//!
//! CLI values take precedence over defaults.

mod loader;
mod merger;
mod types;

pub use loader::{
    find_server_config, get_global_config_dir, load_server_config, CONFIG_FILES,
    GLOBAL_CONFIG_DIR,
};

pub use merger::{default_config, merge_config, CliOptions};

pub use types::{ResolvedConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_RESOURCE_SCHEME};

use crate::error::ConfigError;
use std::path::Path;

/// Locate the server document and merge all settings.
///
/// This is the main entry point for configuration loading. A missing server
/// document is an error.
pub fn load_config(
    working_dir: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let server_config = find_server_config(cli_options.config.as_deref(), working_dir)?;
    Ok(merge_config(Some(server_config), cli_options))
}
