// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON-RPC over stdio transport.
//!
//! One line of JSON per message in each direction. Lines on stdout that are
//! not a JSON-RPC response for the pending request id are skipped, so servers
//! that print log output to stdout still work. Requests the server sends while
//! a call is pending are answered inline: `ping` gets an empty result, anything
//! else `Method not found`.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::config::ServerConfig;
use super::error::{McpError, METHOD_NOT_FOUND};

/// How long a child gets to exit after stdin closes before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// Extract the result from a response, converting a JSON-RPC error to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::protocol(err.code, err.message));
    }

    response
        .result
        .ok_or_else(|| McpError::InvalidResponse("response missing both result and error".into()))
}

/// A duplex request/response channel to one MCP server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and return its `result` payload.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError>;

    /// Send a notification; no response is expected.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError>;

    /// Close the channel and release the server process.
    async fn close(&self) -> Result<(), McpError>;
}

/// Opens transports for configured servers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        name: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn McpTransport>, McpError>;
}

/// Spawns each server as a child process and talks to it over stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioConnector;

#[async_trait]
impl Connector for StdioConnector {
    async fn open(
        &self,
        name: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn McpTransport>, McpError> {
        Ok(Box::new(StdioTransport::spawn(name, config)?))
    }
}

/// Bi-directional JSON-RPC transport over a child process's stdio.
pub struct StdioTransport {
    server_name: String,
    timeout: Duration,
    next_id: AtomicU64,
    writer: Mutex<Option<ChildStdin>>,
    reader: Mutex<BufReader<ChildStdout>>,
    child: Mutex<Option<Child>>,
}

impl StdioTransport {
    /// Spawn the server process described by `config`.
    ///
    /// The child is killed if the transport is dropped without `close`.
    pub fn spawn(name: &str, config: &ServerConfig) -> Result<Self, McpError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        cmd.envs(config.expanded_env());

        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| {
                McpError::connection_failed(name, format!("spawn '{}': {}", config.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::connection_failed(name, "Failed to get stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::connection_failed(name, "Failed to get stdout"))?;

        tracing::debug!(
            server = %name,
            command = %config.command,
            pid = ?child.id(),
            "Spawned MCP server"
        );

        Ok(Self {
            server_name: name.to_string(),
            timeout: config.request_timeout(),
            next_id: AtomicU64::new(1),
            writer: Mutex::new(Some(stdin)),
            reader: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(Some(child)),
        })
    }

    fn io_error(&self, context: &str, e: std::io::Error) -> McpError {
        McpError::transport(&self.server_name, format!("{}: {}", context, e))
    }

    async fn write_line(&self, value: &impl Serialize) -> Result<(), McpError> {
        let mut json = serde_json::to_string(value)?;
        json.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| McpError::SessionClosed(self.server_name.clone()))?;

        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| self.io_error("failed to write to stdin", e))?;
        writer
            .flush()
            .await
            .map_err(|e| self.io_error("failed to flush stdin", e))
    }

    async fn read_response(&self, id: u64) -> Result<JsonRpcResponse, McpError> {
        let mut line = String::new();
        let mut reader = self.reader.lock().await;

        loop {
            line.clear();
            let bytes_read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| self.io_error("failed to read from stdout", e))?;

            if bytes_read == 0 {
                return Err(McpError::transport(
                    &self.server_name,
                    "server stdout closed (process may have exited)",
                ));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(_) => {
                    tracing::trace!(
                        server = %self.server_name,
                        line = %trimmed,
                        "Skipping non-JSON line"
                    );
                    continue;
                }
            };

            // Requests and notifications from the server share the id space
            // with our responses, so they must be told apart by `method`.
            if let Some(method) = message.get("method").and_then(Value::as_str) {
                self.answer_server_message(method, message.get("id")).await?;
                continue;
            }

            match serde_json::from_value::<JsonRpcResponse>(message) {
                Ok(resp) if resp.id == id => return Ok(resp),
                Ok(resp) => {
                    tracing::trace!(
                        server = %self.server_name,
                        expected = id,
                        got = resp.id,
                        "Skipping response"
                    );
                }
                Err(_) => {
                    tracing::trace!(
                        server = %self.server_name,
                        line = %trimmed,
                        "Skipping non-response line"
                    );
                }
            }
        }
    }

    /// Reply to a server-initiated request; notifications are dropped.
    ///
    /// Only `ping` is supported; anything else gets `Method not found`.
    async fn answer_server_message(
        &self,
        method: &str,
        id: Option<&Value>,
    ) -> Result<(), McpError> {
        let Some(id) = id.filter(|id| !id.is_null()) else {
            tracing::trace!(server = %self.server_name, %method, "Ignoring server notification");
            return Ok(());
        };

        let reply = if method == "ping" {
            serde_json::json!({"jsonrpc": "2.0", "id": id, "result": {}})
        } else {
            tracing::debug!(
                server = %self.server_name,
                %method,
                "Rejecting unsupported server request"
            );
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": METHOD_NOT_FOUND,
                    "message": format!("Method not found: {}", method)
                }
            })
        };
        self.write_line(&reply).await
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let exchange = async {
            self.write_line(&request).await?;
            self.read_response(id).await
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| McpError::Timeout {
                server: self.server_name.clone(),
                method: method.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })??;

        extract_result(response)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let mut notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        if let Some(params) = params {
            notification["params"] = params;
        }
        self.write_line(&notification).await
    }

    async fn close(&self) -> Result<(), McpError> {
        // Dropping stdin signals EOF; well-behaved servers exit on it.
        self.writer.lock().await.take();

        let mut child = self
            .child
            .lock()
            .await
            .take()
            .ok_or_else(|| McpError::SessionClosed(self.server_name.clone()))?;

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.server_name, %status, "MCP server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Teardown {
                server: self.server_name.clone(),
                message: e.to_string(),
            }),
            Err(_) => {
                tracing::debug!(server = %self.server_name, "MCP server did not exit, killing");
                match child.kill().await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                        Err(McpError::Teardown {
                            server: self.server_name.clone(),
                            message: "process already exited".to_string(),
                        })
                    }
                    Err(e) => Err(McpError::Teardown {
                        server: self.server_name.clone(),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }
}
