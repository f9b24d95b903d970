// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP Chatbot - one conversation, many MCP servers.
//!
//! Connects to every server in a `mcpServers` config, merges their tools,
//! prompts and resources into one catalog, and lets a Claude model call any
//! of them while answering a query.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (Message, ToolDefinition, ProviderResponse, etc.)
//! - [`error`] - Error types and result aliases
//! - [`config`] - Server config discovery and CLI/default merging
//! - [`providers`] - Model provider (Anthropic Messages API)
//! - [`telemetry`] - Tracing initialization
//! - [`mcp`] - Sessions, discovery, catalog, routing and shutdown
//! - [`agent`] - The turn engine
//! - [`repl`] - Interactive front-end
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_chatbot::config::{load_config, load_server_config, CliOptions};
//! use mcp_chatbot::mcp::{connect_all, discover_all, LifecycleManager, StdioConnector};
//!
//! let config = load_config(&std::env::current_dir()?, CliOptions::default())?;
//! let servers = load_server_config(config.server_config.as_deref().unwrap())?;
//!
//! let lifecycle = LifecycleManager::new();
//! let outcome = connect_all(&servers, &StdioConnector, &lifecycle).await;
//! let (catalog, _) = discover_all(&outcome.clients).await;
//! // ...
//! lifecycle.shutdown().await?;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod mcp;
pub mod providers;
pub mod repl;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{AgentError, ConfigError, ProviderError, Result};
pub use providers::{create_provider, create_provider_from_env, AnthropicProvider};
pub use types::{
    // Message types
    ContentBlock, Message, MessageContent, Role,
    // Tool types
    ToolCall, ToolDefinition, ToolResult,
    // Provider types
    BoxedProvider, Provider, ProviderConfig, ProviderResponse, SharedProvider, StopReason,
    TokenUsage,
};

/// Crate version, also sent as `clientInfo.version` during MCP initialization.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
