// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end tests: config -> startup -> discovery -> routing -> turns -> shutdown,
//! with in-memory servers and a scripted model.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use mcp_chatbot::agent::{Agent, AgentCallbacks, AgentConfig, AgentOptions};
use mcp_chatbot::mcp::{
    connect_all, discover_all, Catalog, Connector, LifecycleManager, McpConfig, McpError,
    McpTransport, Router, ServerConfig,
};
use mcp_chatbot::types::{ContentBlock, Message, Provider, ProviderResponse, ToolDefinition};
use mcp_chatbot::ProviderError;

// ============================================================================
// In-memory servers
// ============================================================================

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Default)]
struct FakeServer {
    tools: Vec<&'static str>,
    resources: Vec<&'static str>,
    failing_tools: Vec<&'static str>,
}

impl FakeServer {
    fn tools(tools: &[&'static str]) -> Self {
        Self {
            tools: tools.to_vec(),
            ..Default::default()
        }
    }

    fn with_resources(mut self, uris: &[&'static str]) -> Self {
        self.resources = uris.to_vec();
        self
    }

    fn failing(mut self, tool: &'static str) -> Self {
        self.failing_tools.push(tool);
        self
    }
}

struct FakeTransport {
    name: String,
    server: FakeServer,
    log: Log,
    closed: AtomicBool,
}

#[async_trait]
impl McpTransport for FakeTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::transport(&self.name, "closed"));
        }
        let params = params.unwrap_or(Value::Null);
        match method {
            "initialize" => {
                let mut capabilities = json!({"tools": {}});
                if !self.server.resources.is_empty() {
                    capabilities["resources"] = json!({});
                }
                Ok(json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {"name": self.name, "version": "0.1.0"},
                    "capabilities": capabilities
                }))
            }
            "tools/list" => Ok(json!({
                "tools": self.server.tools.iter().map(|t| json!({
                    "name": t,
                    "description": format!("{} on {}", t, self.name),
                    "inputSchema": {"type": "object"}
                })).collect::<Vec<_>>()
            })),
            "resources/list" => Ok(json!({
                "resources": self
                    .server
                    .resources
                    .iter()
                    .map(|u| json!({"uri": u, "name": u}))
                    .collect::<Vec<_>>()
            })),
            "resources/read" => {
                let uri = params["uri"].as_str().unwrap_or_default().to_string();
                self.log.lock().unwrap().push(format!("read:{}:{}", self.name, uri));
                Ok(json!({"contents": [{"uri": uri, "text": format!("from {}", self.name)}]}))
            }
            "tools/call" => {
                let tool = params["name"].as_str().unwrap_or_default().to_string();
                self.log.lock().unwrap().push(format!("call:{}:{}", self.name, tool));
                if self.server.failing_tools.contains(&tool.as_str()) {
                    return Err(McpError::protocol(-32603, "backend unavailable"));
                }
                Ok(json!({"content": [{"type": "text", "text": format!("{} result", tool)}]}))
            }
            other => Err(McpError::protocol(-32601, format!("Method not found: {}", other))),
        }
    }

    async fn notify(&self, _method: &str, _params: Option<Value>) -> Result<(), McpError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(McpError::SessionClosed(self.name.clone()));
        }
        self.log.lock().unwrap().push(format!("close:{}", self.name));
        Ok(())
    }
}

/// Serves the named fakes; any other configured server fails to start.
struct FakeConnector {
    servers: HashMap<String, FakeServer>,
    log: Log,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(
        &self,
        name: &str,
        _config: &ServerConfig,
    ) -> Result<Box<dyn McpTransport>, McpError> {
        let server = self
            .servers
            .get(name)
            .cloned()
            .ok_or_else(|| McpError::connection_failed(name, "command not found"))?;
        Ok(Box::new(FakeTransport {
            name: name.to_string(),
            server,
            log: self.log.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct Harness {
    lifecycle: LifecycleManager,
    catalog: Arc<Catalog>,
    log: Log,
    connect_failures: Vec<McpError>,
}

/// Configure `names` in order, serve only those in `servers`, connect and discover.
async fn start(names: &[&str], servers: Vec<(&str, FakeServer)>) -> Harness {
    let mut config = McpConfig::new();
    for name in names {
        config.add_server(*name, ServerConfig::stdio(format!("{}-server", name)));
    }
    let log = Log::default();
    let connector = FakeConnector {
        servers: servers.into_iter().map(|(n, s)| (n.to_string(), s)).collect(),
        log: log.clone(),
    };

    let lifecycle = LifecycleManager::new();
    let outcome = connect_all(&config, &connector, &lifecycle).await;
    let (catalog, failures) = discover_all(&outcome.clients).await;
    assert!(failures.is_empty());

    Harness {
        lifecycle,
        catalog: Arc::new(catalog),
        log,
        connect_failures: outcome.failures,
    }
}

fn log_of(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ============================================================================
// Scripted model
// ============================================================================

struct ScriptedModel {
    responses: Mutex<VecDeque<ProviderResponse>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedModel {
    async fn chat(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
        _system_prompt: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::api_message("script exhausted"))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

fn agent(model: Arc<ScriptedModel>, catalog: Arc<Catalog>) -> Agent {
    Agent::new(AgentOptions {
        provider: model,
        router: Router::new(catalog),
        config: AgentConfig::default(),
        callbacks: AgentCallbacks::default(),
    })
}

// ============================================================================
// Catalog properties
// ============================================================================

#[tokio::test]
async fn test_disjoint_tools_are_namespaced() {
    let h = start(
        &["alpha", "beta", "gamma"],
        vec![
            ("alpha", FakeServer::tools(&["read", "write"])),
            ("beta", FakeServer::tools(&["search", "fetch"])),
            ("gamma", FakeServer::tools(&["list", "stat"])),
        ],
    )
    .await;

    assert_eq!(h.catalog.tools.len(), 6);
    let keys: Vec<&str> = h.catalog.tools.keys().collect();
    assert_eq!(
        keys,
        vec!["alpha_read", "alpha_write", "beta_search", "beta_fetch", "gamma_list", "gamma_stat"]
    );
    for record in h.catalog.tools.iter() {
        assert_eq!(record.public_id, format!("{}_{}", record.server, record.local_id));
    }

    let definitions = h.catalog.tool_definitions();
    assert_eq!(definitions[2].description, "[beta] search on beta");

    h.lifecycle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_colliding_qualified_tool_keeps_first_server() {
    let h = start(
        &["a", "a_b"],
        vec![
            ("a", FakeServer::tools(&["b_c"])),
            ("a_b", FakeServer::tools(&["c"])),
        ],
    )
    .await;

    assert_eq!(h.catalog.tools.len(), 1);
    let router = Router::new(h.catalog.clone());
    let result = router.call_tool("a_b_c", json!({})).await.unwrap();
    assert_eq!(result.as_text(), "b_c result");
    assert_eq!(log_of(&h.log), vec!["call:a:b_c"]);

    h.lifecycle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_resource_uri_last_discovered_wins() {
    let h = start(
        &["first", "second"],
        vec![
            ("first", FakeServer::default().with_resources(&["notes://shared"])),
            ("second", FakeServer::default().with_resources(&["notes://shared"])),
        ],
    )
    .await;

    assert_eq!(h.catalog.resources.len(), 1);
    let router = Router::new(h.catalog.clone());
    assert_eq!(router.resolve_resource("notes://shared").unwrap().record.server, "second");

    let contents = router.read_resource("notes://shared").await.unwrap();
    assert_eq!(contents.first_text(), Some("from second"));
    assert_eq!(log_of(&h.log), vec!["read:second:notes://shared"]);

    h.lifecycle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_suffix_fallback_unique_and_ambiguous() {
    let h = start(
        &["A", "B"],
        vec![
            ("A", FakeServer::tools(&["fetch", "search"])),
            ("B", FakeServer::tools(&["fetch"])),
        ],
    )
    .await;
    let router = Router::new(h.catalog.clone());

    assert!(h.catalog.tools.contains("A_fetch"));
    assert!(h.catalog.tools.contains("B_fetch"));

    let route = router.resolve_tool("search").unwrap();
    assert_eq!(route.record.public_id, "A_search");
    assert_eq!(route.target, "search");

    assert!(matches!(router.resolve_tool("fetch"), Err(McpError::ToolNotFound { .. })));
    assert!(matches!(router.resolve_tool("delete"), Err(McpError::ToolNotFound { .. })));

    h.lifecycle.shutdown().await.unwrap();
}

// ============================================================================
// Turn engine properties
// ============================================================================

#[tokio::test]
async fn test_text_only_response_takes_one_model_call() {
    let h = start(&["fs"], vec![("fs", FakeServer::tools(&["read"]))]).await;
    let model = ScriptedModel::new(vec![ProviderResponse::text("Nothing to do.")]);

    let outcome = agent(model.clone(), h.catalog.clone()).chat("hello").await.unwrap();

    assert_eq!(model.call_count(), 1);
    assert_eq!(outcome.response, "Nothing to do.");
    assert!(log_of(&h.log).is_empty());

    h.lifecycle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_two_tool_uses_run_in_order_then_one_follow_up() {
    let h = start(
        &["docs", "fs"],
        vec![
            ("docs", FakeServer::tools(&["search"])),
            ("fs", FakeServer::tools(&["read"])),
        ],
    )
    .await;
    let model = ScriptedModel::new(vec![
        ProviderResponse::from_blocks(vec![
            ContentBlock::text("Checking two places."),
            ContentBlock::tool_use("call_1", "fs_read", json!({"path": "a.txt"})),
            ContentBlock::tool_use("call_2", "docs_search", json!({"q": "a"})),
        ]),
        ProviderResponse::text("Both done."),
    ]);

    let outcome = agent(model.clone(), h.catalog.clone()).chat("look").await.unwrap();

    assert_eq!(log_of(&h.log), vec!["call:fs:read", "call:docs:search"]);
    assert_eq!(model.call_count(), 2);
    assert_eq!(outcome.response, "Both done.");

    let calls = model.calls.lock().unwrap();
    let follow_up = &calls[1];
    assert_eq!(follow_up.len(), 4);
    let ids: Vec<_> = follow_up[2..]
        .iter()
        .map(|m| m.as_blocks().unwrap()[0].tool_use_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["call_1", "call_2"]);
    assert_eq!(
        follow_up[2].as_blocks().unwrap()[0].content.as_deref(),
        Some("read result")
    );
    drop(calls);

    h.lifecycle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invocation_failure_is_fed_back_and_turn_continues() {
    let h = start(&["api"], vec![("api", FakeServer::tools(&["query"]).failing("query"))]).await;
    let model = ScriptedModel::new(vec![
        ProviderResponse::from_blocks(vec![ContentBlock::tool_use("c1", "api_query", json!({}))]),
        ProviderResponse::text("The API is unavailable right now."),
    ]);

    let outcome = agent(model.clone(), h.catalog.clone()).chat("ask").await.unwrap();

    assert_eq!(model.call_count(), 2);
    let result = &outcome.conversation[2].as_blocks().unwrap()[0];
    assert_eq!(result.is_error, Some(true));
    assert!(result.content.as_deref().unwrap().contains("backend unavailable"));
    assert_eq!(outcome.response, "The API is unavailable right now.");

    h.lifecycle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ambiguous_bare_name_from_model_becomes_error_result() {
    let h = start(
        &["A", "B"],
        vec![("A", FakeServer::tools(&["fetch"])), ("B", FakeServer::tools(&["fetch"]))],
    )
    .await;
    let model = ScriptedModel::new(vec![
        ProviderResponse::from_blocks(vec![ContentBlock::tool_use("c1", "fetch", json!({}))]),
        ProviderResponse::text("Which fetch?"),
    ]);

    let outcome = agent(model, h.catalog.clone()).chat("fetch it").await.unwrap();

    let result = &outcome.conversation[2].as_blocks().unwrap()[0];
    assert_eq!(result.is_error, Some(true));
    assert!(result.content.as_deref().unwrap().contains("Tool not found: fetch"));
    assert!(log_of(&h.log).is_empty());

    h.lifecycle.shutdown().await.unwrap();
}

// ============================================================================
// Lifecycle properties
// ============================================================================

#[tokio::test]
async fn test_shutdown_after_partial_startup_closes_opened_in_reverse() {
    let h = start(
        &["s1", "s2", "s3"],
        vec![("s1", FakeServer::tools(&["a"])), ("s3", FakeServer::tools(&["c"]))],
    )
    .await;

    assert_eq!(h.connect_failures.len(), 1);
    assert!(matches!(
        &h.connect_failures[0],
        McpError::ServerConnectionFailed { server, .. } if server == "s2"
    ));
    assert_eq!(h.lifecycle.len(), 2);

    h.lifecycle.shutdown().await.unwrap();
    assert_eq!(log_of(&h.log), vec!["close:s3", "close:s1"]);

    // A second shutdown is a no-op.
    h.lifecycle.shutdown().await.unwrap();
    assert_eq!(log_of(&h.log).len(), 2);
}

#[tokio::test]
async fn test_calls_after_shutdown_fail_fast() {
    let h = start(&["fs"], vec![("fs", FakeServer::tools(&["read"]))]).await;
    let router = Router::new(h.catalog.clone());
    h.lifecycle.shutdown().await.unwrap();

    let err = router.call_tool("fs_read", json!({})).await.unwrap_err();
    assert!(matches!(err, McpError::InvocationFailed { .. }));
    assert_eq!(log_of(&h.log), vec!["close:fs"]);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_server_config_document() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("server_config.json");
    std::fs::write(
        &path,
        r#"{
            "mcpServers": {
                "research": {"command": "uv", "args": ["run", "research_server.py"]},
                "filesystem": {"command": "npx", "args": ["-y", "@modelcontextprotocol/server-filesystem", "."]},
                "fetch": {"command": "uvx", "args": ["mcp-server-fetch"], "enabled": false}
            }
        }"#,
    )
    .unwrap();

    let config = mcp_chatbot::config::load_server_config(&path).unwrap();
    let enabled: Vec<&str> = config.enabled_servers().map(|(name, _)| name.as_str()).collect();
    assert_eq!(enabled, vec!["filesystem", "research"]);
}
