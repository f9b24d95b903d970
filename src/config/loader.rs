// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Server configuration discovery and loading.
//!
//! Handles locating the `mcpServers` document (JSON or YAML) in various locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::mcp::McpConfig;

/// Server config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    "server_config.json",
    "server_config.yaml",
    "server_config.yml",
];

/// Global config directory name, under the platform config dir.
pub const GLOBAL_CONFIG_DIR: &str = "mcp-chatbot";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Locate the server configuration document.
///
/// Search order:
/// 1. `explicit` (from `--config` or `MCP_CHATBOT_CONFIG`); must exist
/// 2. `server_config.{json,yaml,yml}` in `working_dir`
/// 3. the same names under the global config directory
pub fn find_server_config(
    explicit: Option<&Path>,
    working_dir: &Path,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    if let Some(path) = first_existing(working_dir) {
        return Ok(path);
    }

    get_global_config_dir()
        .and_then(|dir| first_existing(&dir))
        .ok_or_else(|| {
            ConfigError::NotFound(format!(
                "no {} in {} or the global config directory",
                CONFIG_FILES[0],
                working_dir.display()
            ))
        })
}

/// Load and parse a server configuration document.
pub fn load_server_config(path: &Path) -> Result<McpConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let config = McpConfig::load_from_file(path)?;
    tracing::debug!(path = %path.display(), servers = config.servers.len(), "Loaded server config");
    Ok(config)
}
