// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model Context Protocol (MCP) client support.
//!
//! Connects to many MCP servers at once and presents their tools, prompts and
//! resources as one catalog.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     LifecycleManager                      │
//! │   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐     │
//! │   │ McpClient   │   │ McpClient   │   │ McpClient   │     │
//! │   │ (server1)   │   │ (server2)   │   │ (server3)   │     │
//! │   └──────┬──────┘   └──────┬──────┘   └──────┬──────┘     │
//! └──────────┼─────────────────┼─────────────────┼────────────┘
//!            │ weak            │ weak            │ weak
//!      ┌─────┴─────────────────┴─────────────────┴─────┐
//!      │     Catalog (tools / prompts / resources)     │
//!      └───────────────────────┬───────────────────────┘
//!                              │
//!                           Router
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_chatbot::mcp::{connect_all, discover_all, LifecycleManager, McpConfig, Router, StdioConnector};
//!
//! let config = McpConfig::load_from_file("server_config.json")?;
//! let lifecycle = LifecycleManager::new();
//!
//! let outcome = connect_all(&config, &StdioConnector, &lifecycle).await;
//! let (catalog, _failures) = discover_all(&outcome.clients).await;
//! let router = Router::new(Arc::new(catalog));
//!
//! let result = router.call_tool("research_search_papers", json!({"topic": "llm"})).await?;
//!
//! lifecycle.shutdown().await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{connect_all, ConnectOutcome, McpClient};
pub use config::{McpConfig, ServerConfig};
pub use error::McpError;
pub use lifecycle::LifecycleManager;
pub use registry::{
    discover, discover_all, Catalog, CapabilityKind, CapabilityRecord, Discovery, DiscoveryFailure,
};
pub use router::{Route, Router};
pub use transport::{Connector, McpTransport, StdioConnector, StdioTransport};
pub use types::*;
