// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP error types.

use thiserror::Error;

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server could not be started, initialized, or discovered.
    #[error("Failed to connect to MCP server '{server}': {message}")]
    ServerConnectionFailed { server: String, message: String },

    /// No registered tool matches the requested name.
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    /// No registered prompt matches the requested name.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// No registered resource matches the requested URI.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A resolved call failed at the transport or on the server.
    #[error("Call to '{capability}' on MCP server '{server}' failed: {cause}")]
    InvocationFailed {
        server: String,
        capability: String,
        cause: String,
    },

    /// The session was already closed.
    #[error("MCP server '{0}' session is closed")]
    SessionClosed(String),

    /// Request timed out.
    #[error("Request '{method}' to MCP server '{server}' timed out after {timeout_secs}s")]
    Timeout {
        server: String,
        method: String,
        timeout_secs: u64,
    },

    /// Closing a session failed.
    #[error("Failed to close MCP server '{server}': {message}")]
    Teardown { server: String, message: String },

    /// Invalid response from server.
    #[error("Invalid response from MCP server: {0}")]
    InvalidResponse(String),

    /// Transport error.
    #[error("Transport error for MCP server '{server}': {message}")]
    Transport { server: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol error (JSON-RPC).
    #[error("Protocol error: code={code}, message={message}")]
    Protocol { code: i32, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Create a connection failed error.
    pub fn connection_failed(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServerConnectionFailed {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create an invocation failed error from an underlying cause.
    pub fn invocation_failed(
        server: impl Into<String>,
        capability: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::InvocationFailed {
            server: server.into(),
            capability: capability.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(code: i32, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Whether the server rejected the request because it does not implement it.
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Protocol { code, .. } if *code == METHOD_NOT_FOUND)
    }

    /// Teardown races that mean the session is already gone.
    ///
    /// These are logged and swallowed during shutdown; anything else is reported.
    pub fn is_benign_teardown(&self) -> bool {
        match self {
            Self::SessionClosed(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::Interrupted
            ),
            Self::Teardown { message, .. } | Self::Transport { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("cancel") || lower.contains("already exited")
            }
            _ => false,
        }
    }
}
