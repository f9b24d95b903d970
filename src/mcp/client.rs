// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP client implementation.
//!
//! `McpClient` is the handle for one established session. `connect_all`
//! opens every configured server concurrently, registering each one with the
//! [`LifecycleManager`] as soon as its transport exists.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use futures::future::join_all;
use serde_json::{json, Value};

use super::config::{McpConfig, ServerConfig};
use super::error::McpError;
use super::lifecycle::LifecycleManager;
use super::transport::{Connector, McpTransport};
use super::types::{
    ConnectionState, McpPromptInfo, McpResourceInfo, McpToolInfo, McpToolResult, PromptMessage,
    ResourceContents, ServerInfo,
};

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client for a single MCP server session.
pub struct McpClient {
    /// Server name (config key).
    name: String,

    /// Server configuration.
    config: ServerConfig,

    /// Exclusively owned transport.
    transport: Box<dyn McpTransport>,

    /// Cleared once the session is closed.
    alive: AtomicBool,

    /// Connection state.
    state: Mutex<ConnectionState>,

    /// Server info (after initialization).
    server_info: OnceLock<ServerInfo>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl McpClient {
    /// Wrap an open transport.
    pub fn new(
        name: impl Into<String>,
        config: ServerConfig,
        transport: Box<dyn McpTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            transport,
            alive: AtomicBool::new(true),
            state: Mutex::new(ConnectionState::Connected),
            server_info: OnceLock::new(),
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Failed)
    }

    fn set_state(&self, state: ConnectionState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    /// Whether the session is still open.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Get server info (if initialized).
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.get()
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if !self.is_alive() {
            return Err(McpError::SessionClosed(self.name.clone()));
        }
        self.transport.request(method, params).await
    }

    /// Perform the `initialize` handshake, bounded by the startup timeout.
    pub async fn initialize(&self) -> Result<&ServerInfo, McpError> {
        if let Some(info) = self.server_info.get() {
            return Ok(info);
        }

        let handshake = async {
            let params = json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "mcp-chatbot",
                    "version": crate::VERSION
                }
            });
            let result = self.request("initialize", Some(params)).await?;
            self.transport
                .notify("notifications/initialized", None)
                .await?;
            Ok::<_, McpError>(ServerInfo::from_value(&result))
        };

        let timeout = self.config.startup_timeout();
        let outcome = match tokio::time::timeout(timeout, handshake).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout {
                server: self.name.clone(),
                method: "initialize".to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(info) => {
                tracing::debug!(
                    server = %self.name,
                    remote = %info.name,
                    version = %info.version,
                    "MCP session initialized"
                );
                self.set_state(ConnectionState::Ready);
                Ok(self.server_info.get_or_init(|| info))
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                Err(McpError::connection_failed(&self.name, e.to_string()))
            }
        }
    }

    /// Fetch every page of a `*/list` method.
    async fn list_all(&self, method: &str, key: &str) -> Result<Vec<Value>, McpError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request(method, params).await?;

            if let Some(page) = result.get(key).and_then(|v| v.as_array()) {
                items.extend(page.iter().cloned());
            }

            match result.get("nextCursor").and_then(|c| c.as_str()) {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next) => {
                    cursor = Some(next.to_string());
                }
                _ => break,
            }
        }

        Ok(items)
    }

    /// List tools, honoring the server's enabled/disabled tool filters.
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        let tools = self.list_all("tools/list", "tools").await?;
        Ok(tools
            .iter()
            .filter_map(|t| McpToolInfo::from_value(&self.name, t))
            .filter(|t| self.config.is_tool_enabled(&t.name))
            .collect())
    }

    /// List prompt templates.
    pub async fn list_prompts(&self) -> Result<Vec<McpPromptInfo>, McpError> {
        let prompts = self.list_all("prompts/list", "prompts").await?;
        Ok(prompts
            .iter()
            .filter_map(|p| McpPromptInfo::from_value(&self.name, p))
            .collect())
    }

    /// List resources.
    pub async fn list_resources(&self) -> Result<Vec<McpResourceInfo>, McpError> {
        let resources = self.list_all("resources/list", "resources").await?;
        Ok(resources
            .iter()
            .filter_map(|r| McpResourceInfo::from_value(&self.name, r))
            .collect())
    }

    /// Call a tool by its server-local name.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        let result = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        Ok(McpToolResult::from_value(&result))
    }

    /// Render a prompt template with string arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let result = self
            .request("prompts/get", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        Ok(PromptMessage::list_from_value(&result))
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents, McpError> {
        let result = self
            .request("resources/read", Some(json!({ "uri": uri })))
            .await?;
        Ok(ResourceContents::from_value(&result))
    }

    /// Close the session. A second close reports `SessionClosed`.
    pub async fn close(&self) -> Result<(), McpError> {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return Err(McpError::SessionClosed(self.name.clone()));
        }
        self.set_state(ConnectionState::Closed);
        self.transport.close().await
    }
}

/// Result of connecting all configured servers.
#[derive(Debug, Default)]
pub struct ConnectOutcome {
    /// Initialized sessions, in acquisition order.
    pub clients: Vec<Arc<McpClient>>,
    /// Servers that failed to open or initialize.
    pub failures: Vec<McpError>,
}

/// Open and initialize every enabled server concurrently.
///
/// Each session is registered with `lifecycle` immediately after its
/// transport opens, so dropping this future mid-way still leaves every opened
/// session reachable for shutdown. Failures are isolated per server.
pub async fn connect_all(
    config: &McpConfig,
    connector: &dyn Connector,
    lifecycle: &LifecycleManager,
) -> ConnectOutcome {
    let attempts = config.enabled_servers().map(|(name, server)| async move {
        let opened = tokio::time::timeout(server.startup_timeout(), connector.open(name, server))
            .await
            .map_err(|_| McpError::connection_failed(name, "timed out starting server"))
            .and_then(|r| r.map_err(|e| as_connection_failure(name, e)))?;

        let client = Arc::new(McpClient::new(name.clone(), server.clone(), opened));
        let seq = lifecycle.register(client.clone());

        client.initialize().await?;
        Ok::<_, McpError>((seq, client))
    });

    let mut outcome = ConnectOutcome::default();
    let mut ready = Vec::new();

    for result in join_all(attempts).await {
        match result {
            Ok(entry) => ready.push(entry),
            Err(e) => {
                tracing::warn!(error = %e, "MCP server unavailable");
                outcome.failures.push(e);
            }
        }
    }

    ready.sort_by_key(|(seq, _)| *seq);
    outcome.clients = ready.into_iter().map(|(_, client)| client).collect();

    tracing::info!(
        connected = outcome.clients.len(),
        failed = outcome.failures.len(),
        "MCP startup complete"
    );

    outcome
}

fn as_connection_failure(name: &str, e: McpError) -> McpError {
    match e {
        McpError::ServerConnectionFailed { .. } => e,
        other => McpError::connection_failed(name, other.to_string()),
    }
}
