// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Scripted in-memory MCP server for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::McpClient;
use super::config::ServerConfig;
use super::error::{McpError, METHOD_NOT_FOUND};
use super::transport::{Connector, McpTransport};

/// Shared record of what the scripted servers saw, in order.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// A fake server answering from fixed tables.
#[derive(Clone, Default)]
pub struct ScriptedServer {
    pub name: String,
    pub tools: Vec<Value>,
    pub prompts: Option<Vec<Value>>,
    pub resources: Option<Vec<Value>>,
    pub tool_results: HashMap<String, Result<Value, String>>,
    pub resource_texts: HashMap<String, String>,
    pub prompt_texts: HashMap<String, String>,
    pub close_error: Option<String>,
    pub log: EventLog,
}

impl ScriptedServer {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn tool(mut self, name: &str) -> Self {
        self.tools.push(json!({
            "name": name,
            "description": format!("{} tool", name),
            "inputSchema": {"type": "object", "properties": {}}
        }));
        self
    }

    pub fn tool_result(mut self, name: &str, result: Result<&str, &str>) -> Self {
        let result = result
            .map(|text| json!({"content": [{"type": "text", "text": text}], "isError": false}))
            .map_err(|e| e.to_string());
        self.tool_results.insert(name.to_string(), result);
        self
    }

    pub fn prompt(mut self, name: &str, text: &str) -> Self {
        self.prompts.get_or_insert_with(Vec::new).push(json!({
            "name": name,
            "description": format!("{} prompt", name),
            "arguments": [{"name": "topic", "required": true}]
        }));
        self.prompt_texts.insert(name.to_string(), text.to_string());
        self
    }

    pub fn resource(mut self, uri: &str, text: &str) -> Self {
        self.resources
            .get_or_insert_with(Vec::new)
            .push(json!({"uri": uri, "name": uri}));
        self.resource_texts.insert(uri.to_string(), text.to_string());
        self
    }

    pub fn failing_close(mut self, message: &str) -> Self {
        self.close_error = Some(message.to_string());
        self
    }

    pub fn transport(self) -> ScriptedTransport {
        ScriptedTransport {
            server: self,
            closed: AtomicBool::new(false),
        }
    }

    /// Build a handle that has completed `initialize`.
    pub async fn client(self) -> Arc<McpClient> {
        let name = self.name.clone();
        let client = Arc::new(McpClient::new(
            name.clone(),
            ServerConfig::stdio(name),
            Box::new(self.transport()),
        ));
        client.initialize().await.unwrap();
        client
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

pub struct ScriptedTransport {
    server: ScriptedServer,
    closed: AtomicBool,
}

fn not_found(method: &str) -> McpError {
    McpError::protocol(METHOD_NOT_FOUND, format!("Method not found: {}", method))
}

#[async_trait]
impl McpTransport for ScriptedTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::transport(&self.server.name, "stdin closed"));
        }
        let params = params.unwrap_or(Value::Null);
        let s = &self.server;

        match method {
            "initialize" => {
                let mut capabilities = json!({"tools": {}});
                if s.prompts.is_some() {
                    capabilities["prompts"] = json!({});
                }
                if s.resources.is_some() {
                    capabilities["resources"] = json!({});
                }
                Ok(json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {"name": s.name, "version": "1.0.0"},
                    "capabilities": capabilities
                }))
            }
            "tools/list" => Ok(json!({"tools": s.tools})),
            "prompts/list" => s
                .prompts
                .as_ref()
                .map(|p| json!({"prompts": p}))
                .ok_or_else(|| not_found(method)),
            "resources/list" => s
                .resources
                .as_ref()
                .map(|r| json!({"resources": r}))
                .ok_or_else(|| not_found(method)),
            "tools/call" => {
                let name = params["name"].as_str().unwrap_or_default().to_string();
                s.record(format!("call:{}:{}", s.name, name));
                match s.tool_results.get(&name) {
                    Some(Ok(result)) => Ok(result.clone()),
                    Some(Err(message)) => Err(McpError::protocol(-32603, message.clone())),
                    None => Ok(json!({
                        "content": [{"type": "text", "text": format!("{} ok", name)}]
                    })),
                }
            }
            "prompts/get" => {
                let name = params["name"].as_str().unwrap_or_default();
                s.record(format!("prompt:{}:{}", s.name, name));
                let text = s
                    .prompt_texts
                    .get(name)
                    .ok_or_else(|| {
                        McpError::protocol(-32602, format!("Unknown prompt: {}", name))
                    })?;
                let topic = params["arguments"]["topic"].as_str().unwrap_or("");
                let rendered = text.replace("{topic}", topic);
                Ok(json!({
                    "messages": [{"role": "user", "content": {"type": "text", "text": rendered}}]
                }))
            }
            "resources/read" => {
                let uri = params["uri"].as_str().unwrap_or_default();
                s.record(format!("read:{}:{}", s.name, uri));
                let text = s
                    .resource_texts
                    .get(uri)
                    .cloned()
                    .unwrap_or_else(|| format!("{} from {}", uri, s.name));
                Ok(json!({"contents": [{"uri": uri, "mimeType": "text/plain", "text": text}]}))
            }
            other => Err(not_found(other)),
        }
    }

    async fn notify(&self, _method: &str, _params: Option<Value>) -> Result<(), McpError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(McpError::SessionClosed(self.server.name.clone()));
        }
        self.server.record(format!("close:{}", self.server.name));
        match &self.server.close_error {
            Some(message) => Err(McpError::Teardown {
                server: self.server.name.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Connector that serves scripted servers by name; unknown names fail to open.
pub struct ScriptedConnector {
    pub servers: HashMap<String, ScriptedServer>,
}

impl ScriptedConnector {
    pub fn new(servers: impl IntoIterator<Item = ScriptedServer>) -> Self {
        Self {
            servers: servers.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(
        &self,
        name: &str,
        _config: &ServerConfig,
    ) -> Result<Box<dyn McpTransport>, McpError> {
        let server = self
            .servers
            .get(name)
            .cloned()
            .ok_or_else(|| McpError::connection_failed(name, "spawn failed: no such command"))?;
        server.record(format!("open:{}", name));
        Ok(Box::new(server.transport()))
    }
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}
