// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP types for capabilities and content handling.
//!
//! Wire payloads from `tools/call`, `prompts/get` and `resources/read` come in
//! several shapes (a bare string, a single content object, a list of content
//! objects). They are normalized here, once, so the rest of the crate only sees
//! the enums below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Information about an MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolInfo {
    /// Tool name, local to its server.
    pub name: String,

    /// Tool description.
    pub description: Option<String>,

    /// JSON Schema for tool input.
    pub input_schema: Value,

    /// Server this tool belongs to.
    pub server: String,
}

impl McpToolInfo {
    /// Parse a `tools/list` entry.
    pub fn from_value(server: &str, value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        Some(Self {
            name,
            description: value
                .get("description")
                .and_then(|d| d.as_str())
                .map(|s| s.to_string()),
            input_schema: value
                .get("inputSchema")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
            server: server.to_string(),
        })
    }

    /// Get the namespaced tool name (`server_tool` format).
    pub fn qualified_name(&self) -> String {
        format!("{}_{}", self.server, self.name)
    }
}

/// A declared argument of a prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Argument description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the server requires the argument.
    #[serde(default)]
    pub required: bool,
}

/// Information about an MCP prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpPromptInfo {
    /// Prompt name.
    pub name: String,
    /// Prompt description.
    pub description: Option<String>,
    /// Declared arguments.
    pub arguments: Vec<PromptArgument>,
    /// Server this prompt belongs to.
    pub server: String,
}

impl McpPromptInfo {
    /// Parse a `prompts/list` entry.
    pub fn from_value(server: &str, value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        let arguments = value
            .get("arguments")
            .and_then(|a| a.as_array())
            .map(|args| {
                args.iter()
                    .filter_map(|a| serde_json::from_value(a.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name,
            description: value
                .get("description")
                .and_then(|d| d.as_str())
                .map(|s| s.to_string()),
            arguments,
            server: server.to_string(),
        })
    }
}

/// Information about an MCP resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResourceInfo {
    /// Resource URI.
    pub uri: String,
    /// Human-readable name.
    pub name: Option<String>,
    /// Resource description.
    pub description: Option<String>,
    /// MIME type, when the server declares one.
    pub mime_type: Option<String>,
    /// Server this resource belongs to.
    pub server: String,
}

impl McpResourceInfo {
    /// Parse a `resources/list` entry.
    pub fn from_value(server: &str, value: &Value) -> Option<Self> {
        let uri = value.get("uri")?.as_str()?.to_string();
        let field = |key: &str| value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());
        Some(Self {
            uri,
            name: field("name"),
            description: field("description"),
            mime_type: field("mimeType"),
            server: server.to_string(),
        })
    }
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    /// Result content (text, images, etc.).
    pub content: Vec<McpContent>,

    /// Whether the server flagged the result as an error.
    #[serde(default)]
    pub is_error: bool,
}

impl McpToolResult {
    /// Parse a `tools/call` result.
    pub fn from_value(value: &Value) -> Self {
        let is_error = value
            .get("isError")
            .and_then(|e| e.as_bool())
            .unwrap_or(false);

        let content = value
            .get("content")
            .and_then(|c| c.as_array())
            .map(|items| items.iter().filter_map(McpContent::from_value).collect())
            .unwrap_or_default();

        Self { content, is_error }
    }

    /// Get the content as a single string.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .map(McpContent::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Content types that can be returned by MCP servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    /// Plain text content.
    Text {
        /// The text content.
        text: String,
    },

    /// Image content.
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type of the image.
        mime_type: String,
    },

    /// Embedded resource.
    Resource {
        /// URI of the resource.
        uri: String,
        /// Optional MIME type.
        mime_type: Option<String>,
        /// Optional text content.
        text: Option<String>,
    },
}

impl McpContent {
    /// Parse one wire content object. Unknown types are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let content_type = value.get("type")?.as_str()?;
        match content_type {
            "text" => Some(Self::Text {
                text: value.get("text")?.as_str()?.to_string(),
            }),
            "image" => Some(Self::Image {
                data: value.get("data")?.as_str()?.to_string(),
                mime_type: value.get("mimeType")?.as_str()?.to_string(),
            }),
            "resource" => {
                let resource = value.get("resource")?;
                Some(Self::Resource {
                    uri: resource.get("uri")?.as_str()?.to_string(),
                    mime_type: resource
                        .get("mimeType")
                        .and_then(|m| m.as_str())
                        .map(|s| s.to_string()),
                    text: resource
                        .get("text")
                        .and_then(|t| t.as_str())
                        .map(|s| s.to_string()),
                })
            }
            _ => None,
        }
    }

    /// Render as text for the model or the terminal.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Image { mime_type, .. } => format!("[image: {}]", mime_type),
            Self::Resource { uri, text, .. } => match text {
                Some(text) => text.clone(),
                None => format!("[resource: {}]", uri),
            },
        }
    }
}

/// Content of a rendered prompt message.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptContent {
    /// A plain string or a single text object.
    Text(String),
    /// Anything else: one non-text object or a list of content objects.
    Structured(Vec<McpContent>),
}

impl PromptContent {
    /// Normalize a prompt message `content` field.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => {
                Self::Structured(items.iter().filter_map(McpContent::from_value).collect())
            }
            other => match McpContent::from_value(other) {
                Some(McpContent::Text { text }) => Self::Text(text),
                Some(content) => Self::Structured(vec![content]),
                None => Self::Text(other.to_string()),
            },
        }
    }

    /// Flatten to text; structured items are joined with spaces.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(items) => items
                .iter()
                .map(McpContent::to_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    /// Message role, usually `user`.
    pub role: String,
    /// Normalized content.
    pub content: PromptContent,
}

impl PromptMessage {
    /// Parse the `messages` array of a `prompts/get` result.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .get("messages")
            .and_then(|m| m.as_array())
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| Self {
                        role: m
                            .get("role")
                            .and_then(|r| r.as_str())
                            .unwrap_or("user")
                            .to_string(),
                        content: m
                            .get("content")
                            .map(PromptContent::from_value)
                            .unwrap_or(PromptContent::Text(String::new())),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One item returned by `resources/read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceItem {
    /// URI of the item.
    pub uri: String,
    /// Optional MIME type.
    pub mime_type: Option<String>,
    /// Text content, for text resources.
    pub text: Option<String>,
    /// Base64 content, for binary resources.
    pub blob: Option<String>,
}

/// Contents returned by `resources/read`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    /// Content items in server order.
    pub items: Vec<ResourceItem>,
}

impl ResourceContents {
    /// Parse a `resources/read` result.
    pub fn from_value(value: &Value) -> Self {
        let items = value
            .get("contents")
            .and_then(|c| c.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let field = |key: &str| {
                            item.get(key).and_then(|v| v.as_str()).map(str::to_string)
                        };
                        Some(ResourceItem {
                            uri: field("uri")?,
                            mime_type: field("mimeType"),
                            text: field("text"),
                            blob: field("blob"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { items }
    }

    /// Text of the first item, if it has any.
    pub fn first_text(&self) -> Option<&str> {
        self.items.first().and_then(|item| item.text.as_deref())
    }

    /// Whether the server returned nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Capability classes a server advertised during initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Whether the server supports tools.
    #[serde(default)]
    pub tools: bool,

    /// Whether the server supports resources.
    #[serde(default)]
    pub resources: bool,

    /// Whether the server supports prompts.
    #[serde(default)]
    pub prompts: bool,
}

impl ServerCapabilities {
    /// Read the `capabilities` object of an `initialize` result.
    pub fn from_value(value: &Value) -> Self {
        let has = |key: &str| value.get(key).is_some_and(|v| !v.is_null());
        Self {
            tools: has("tools"),
            resources: has("resources"),
            prompts: has("prompts"),
        }
    }
}

/// Server information reported during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,

    /// Server version.
    pub version: String,

    /// Server capabilities.
    #[serde(default)]
    pub capabilities: ServerCapabilities,

    /// Protocol version supported.
    #[serde(default)]
    pub protocol_version: Option<String>,
}

impl ServerInfo {
    /// Parse an `initialize` result.
    pub fn from_value(result: &Value) -> Self {
        let info = result.get("serverInfo");
        let field = |key: &str, default: &str| {
            info.and_then(|s| s.get(key))
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };

        Self {
            name: field("name", "unknown"),
            version: field("version", "0.0.0"),
            capabilities: result
                .get("capabilities")
                .map(ServerCapabilities::from_value)
                .unwrap_or_default(),
            protocol_version: result
                .get("protocolVersion")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            version: "0.0.0".to_string(),
            capabilities: ServerCapabilities::default(),
            protocol_version: None,
        }
    }
}

/// Connection state for an MCP server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Transport open, handshake not done yet.
    #[default]
    Connected,

    /// Fully initialized and ready.
    Ready,

    /// Handshake or transport failed.
    Failed,

    /// Session closed.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
