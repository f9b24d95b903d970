// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Capability discovery and the merged catalog.
//!
//! Every connected server is asked for its tools, prompts and resources. The
//! answers are merged into one [`Catalog`]:
//!
//! - tools are keyed `{server}_{tool}`; if two servers still qualify to the
//!   same key, the first one keeps it;
//! - prompts and resources keep their bare name or URI, and a later server
//!   overwrites an earlier one (last write wins, in handle order).
//!
//! The catalog is built once and is read-only afterwards. Records hold weak
//! references to their sessions; the [`LifecycleManager`](super::LifecycleManager)
//! owns them.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use serde_json::Value;

use super::client::McpClient;
use super::error::McpError;
use super::types::{McpPromptInfo, McpResourceInfo, McpToolInfo, PromptArgument};
use crate::types::ToolDefinition;

/// Kind of capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Tool,
    Prompt,
    Resource,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tool => write!(f, "tool"),
            Self::Prompt => write!(f, "prompt"),
            Self::Resource => write!(f, "resource"),
        }
    }
}

/// Kind-specific data of a capability.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityDetail {
    /// JSON Schema of a tool's input.
    InputSchema(Value),
    /// Declared prompt arguments.
    Arguments(Vec<PromptArgument>),
    /// Resource URI.
    Uri(String),
}

/// One discovered tool, prompt, or resource.
#[derive(Debug, Clone)]
pub struct CapabilityRecord {
    /// Identifier used by the model and the user.
    pub public_id: String,
    /// Identifier the owning server knows it by.
    pub local_id: String,
    pub kind: CapabilityKind,
    pub description: Option<String>,
    pub detail: CapabilityDetail,
    /// Owning server name.
    pub server: String,
    handle: Weak<McpClient>,
}

impl CapabilityRecord {
    /// Record for a tool, namespaced by server.
    pub fn tool(info: McpToolInfo, handle: &Arc<McpClient>) -> Self {
        Self {
            public_id: info.qualified_name(),
            local_id: info.name,
            kind: CapabilityKind::Tool,
            description: info.description,
            detail: CapabilityDetail::InputSchema(info.input_schema),
            server: info.server,
            handle: Arc::downgrade(handle),
        }
    }

    /// Record for a prompt, under its bare name.
    pub fn prompt(info: McpPromptInfo, handle: &Arc<McpClient>) -> Self {
        Self {
            public_id: info.name.clone(),
            local_id: info.name,
            kind: CapabilityKind::Prompt,
            description: info.description,
            detail: CapabilityDetail::Arguments(info.arguments),
            server: info.server,
            handle: Arc::downgrade(handle),
        }
    }

    /// Record for a resource, under its URI.
    pub fn resource(info: McpResourceInfo, handle: &Arc<McpClient>) -> Self {
        Self {
            public_id: info.uri.clone(),
            local_id: info.uri.clone(),
            kind: CapabilityKind::Resource,
            description: info.description.or(info.name),
            detail: CapabilityDetail::Uri(info.uri),
            server: info.server,
            handle: Arc::downgrade(handle),
        }
    }

    /// The owning session, if it still exists.
    pub fn handle(&self) -> Option<Arc<McpClient>> {
        self.handle.upgrade()
    }

    /// Prompt arguments, empty for other kinds.
    pub fn arguments(&self) -> &[PromptArgument] {
        match &self.detail {
            CapabilityDetail::Arguments(args) => args,
            _ => &[],
        }
    }

    /// Tool definition handed to the model.
    pub fn to_tool_definition(&self) -> ToolDefinition {
        let description = format!(
            "[{}] {}",
            self.server,
            self.description.as_deref().unwrap_or("")
        );
        let definition = ToolDefinition::new(&self.public_id, description.trim_end());
        match &self.detail {
            CapabilityDetail::InputSchema(schema) => definition.with_schema(schema.clone()),
            _ => definition,
        }
    }
}

/// Insertion-ordered map of records keyed by public identifier.
///
/// Overwriting a key keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct CapabilityMap {
    records: Vec<CapabilityRecord>,
    index: HashMap<String, usize>,
}

impl CapabilityMap {
    /// Insert a record, returning the one it replaced.
    pub fn insert(&mut self, record: CapabilityRecord) -> Option<CapabilityRecord> {
        match self.index.get(&record.public_id) {
            Some(&pos) => Some(std::mem::replace(&mut self.records[pos], record)),
            None => {
                self.index.insert(record.public_id.clone(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    pub fn get(&self, public_id: &str) -> Option<&CapabilityRecord> {
        self.index.get(public_id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.index.contains_key(public_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityRecord> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.public_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The merged view of every server's capabilities.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub tools: CapabilityMap,
    pub prompts: CapabilityMap,
    pub resources: CapabilityMap,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one server's discovery result.
    pub fn merge(&mut self, discovery: Discovery, handle: &Arc<McpClient>) {
        for tool in discovery.tools.into_iter().flatten() {
            let record = CapabilityRecord::tool(tool, handle);
            // `a` + `b_c` and `a_b` + `c` both qualify to `a_b_c`.
            if let Some(existing) = self.tools.get(&record.public_id) {
                tracing::warn!(
                    tool = %record.public_id,
                    kept = %existing.server,
                    dropped = %record.server,
                    local = %record.local_id,
                    "Qualified tool name collides across servers; keeping the first"
                );
                continue;
            }
            self.tools.insert(record);
        }

        for prompt in discovery.prompts.into_iter().flatten() {
            if let Some(old) = self.prompts.insert(CapabilityRecord::prompt(prompt, handle)) {
                if old.server != handle.name() {
                    tracing::warn!(
                        prompt = %old.public_id,
                        previous = %old.server,
                        server = %handle.name(),
                        "Prompt registered by two servers; keeping the later one"
                    );
                }
            }
        }

        for resource in discovery.resources.into_iter().flatten() {
            if let Some(old) = self.resources.insert(CapabilityRecord::resource(resource, handle)) {
                if old.server != handle.name() {
                    tracing::warn!(
                        uri = %old.public_id,
                        previous = %old.server,
                        server = %handle.name(),
                        "Resource registered by two servers; keeping the later one"
                    );
                }
            }
        }
    }

    /// Tool definitions for the model, in catalog order.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(CapabilityRecord::to_tool_definition).collect()
    }

    /// Count of (tools, prompts, resources) owned by one server.
    pub fn counts_for(&self, server: &str) -> (usize, usize, usize) {
        let count = |map: &CapabilityMap| map.iter().filter(|r| r.server == server).count();
        (count(&self.tools), count(&self.prompts), count(&self.resources))
    }

    /// Whether nothing was discovered at all.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.prompts.is_empty() && self.resources.is_empty()
    }
}

/// What one server offers. `None` means the class is not supported.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub server: String,
    pub tools: Option<Vec<McpToolInfo>>,
    pub prompts: Option<Vec<McpPromptInfo>>,
    pub resources: Option<Vec<McpResourceInfo>>,
}

impl Discovery {
    /// Whether the server offered nothing usable.
    pub fn is_empty(&self) -> bool {
        let empty = |n: Option<usize>| n.unwrap_or(0) == 0;
        empty(self.tools.as_ref().map(Vec::len))
            && empty(self.prompts.as_ref().map(Vec::len))
            && empty(self.resources.as_ref().map(Vec::len))
    }
}

/// A server whose discovery failed entirely.
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub server: String,
    pub error: McpError,
}

/// List one capability class; failure means "unsupported".
async fn list_class<T, F>(
    server: &str,
    kind: CapabilityKind,
    advertised: bool,
    list: F,
) -> Result<Option<Vec<T>>, McpError>
where
    F: std::future::Future<Output = Result<Vec<T>, McpError>>,
{
    if !advertised {
        tracing::debug!(server, %kind, "Capability class not advertised");
        return Ok(None);
    }

    match list.await {
        Ok(items) => Ok(Some(items)),
        Err(e) if e.is_method_not_found() => {
            tracing::debug!(server, %kind, "Capability class not supported");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn settle<T>(
    server: &str,
    kind: CapabilityKind,
    result: Result<Option<Vec<T>>, McpError>,
    first_error: &mut Option<McpError>,
) -> Option<Vec<T>> {
    match result {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(server, %kind, error = %e, "Failed to list capabilities");
            first_error.get_or_insert(e);
            None
        }
    }
}

/// Query one session for its three capability lists.
///
/// Each class is independent: a class that is not advertised or fails to
/// list is recorded as `None`. Discovery only fails when the session is
/// closed or every class failed.
pub async fn discover(handle: &McpClient) -> Result<Discovery, McpError> {
    let server = handle.name();
    if !handle.is_alive() {
        return Err(McpError::connection_failed(server, "session is closed"));
    }

    let caps = handle
        .server_info()
        .map(|info| info.capabilities)
        .unwrap_or_default();
    // Servers that advertise nothing get probed for every class.
    let probe_all = !(caps.tools || caps.prompts || caps.resources);

    let tools = list_class(
        server,
        CapabilityKind::Tool,
        probe_all || caps.tools,
        handle.list_tools(),
    )
    .await;
    let prompts = list_class(
        server,
        CapabilityKind::Prompt,
        probe_all || caps.prompts,
        handle.list_prompts(),
    )
    .await;
    let resources = list_class(
        server,
        CapabilityKind::Resource,
        probe_all || caps.resources,
        handle.list_resources(),
    )
    .await;

    let mut first_error = None;
    let discovery = Discovery {
        server: server.to_string(),
        tools: settle(server, CapabilityKind::Tool, tools, &mut first_error),
        prompts: settle(server, CapabilityKind::Prompt, prompts, &mut first_error),
        resources: settle(server, CapabilityKind::Resource, resources, &mut first_error),
    };

    match first_error {
        Some(e)
            if discovery.tools.is_none()
                && discovery.prompts.is_none()
                && discovery.resources.is_none() =>
        {
            Err(McpError::connection_failed(server, e.to_string()))
        }
        _ => Ok(discovery),
    }
}

/// Discover every session concurrently and merge in handle order.
pub async fn discover_all(handles: &[Arc<McpClient>]) -> (Catalog, Vec<DiscoveryFailure>) {
    let results = join_all(handles.iter().map(|h| discover(h))).await;

    let mut catalog = Catalog::new();
    let mut failures = Vec::new();

    for (handle, result) in handles.iter().zip(results) {
        match result {
            Ok(discovery) => {
                tracing::info!(
                    server = %handle.name(),
                    tools = discovery.tools.as_ref().map_or(0, Vec::len),
                    prompts = discovery.prompts.as_ref().map_or(0, Vec::len),
                    resources = discovery.resources.as_ref().map_or(0, Vec::len),
                    "Discovered capabilities"
                );
                catalog.merge(discovery, handle);
            }
            Err(error) => {
                tracing::warn!(server = %handle.name(), %error, "Discovery failed");
                failures.push(DiscoveryFailure {
                    server: handle.name().to_string(),
                    error,
                });
            }
        }
    }

    (catalog, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::mock::{EventLog, ScriptedServer};

    #[tokio::test]
    async fn test_tools_are_namespaced() {
        let log = EventLog::default();
        let mut handles = Vec::new();
        for (server, tools) in [("a", ["x", "y"]), ("b", ["x", "z"]), ("c", ["p", "q"])] {
            let mut s = ScriptedServer::new(server, &log);
            for t in tools {
                s = s.tool(t);
            }
            handles.push(s.client().await);
        }

        let (catalog, failures) = discover_all(&handles).await;
        assert!(failures.is_empty());
        assert_eq!(catalog.tools.len(), 6);

        let keys: Vec<_> = catalog.tools.keys().collect();
        assert_eq!(keys, vec!["a_x", "a_y", "b_x", "b_z", "c_p", "c_q"]);

        let record = catalog.tools.get("b_x").unwrap();
        assert_eq!(record.local_id, "x");
        assert_eq!(record.server, "b");
        assert_eq!(record.handle().unwrap().name(), "b");
    }

    #[tokio::test]
    async fn test_qualified_tool_collision_keeps_first() {
        let log = EventLog::default();
        let a = ScriptedServer::new("a", &log).tool("b_c").client().await;
        let a_b = ScriptedServer::new("a_b", &log).tool("c").tool("d").client().await;

        let handles = [a, a_b];
        let (catalog, failures) = discover_all(&handles).await;
        assert!(failures.is_empty());

        let keys: Vec<_> = catalog.tools.keys().collect();
        assert_eq!(keys, vec!["a_b_c", "a_b_d"]);

        let record = catalog.tools.get("a_b_c").unwrap();
        assert_eq!(record.server, "a");
        assert_eq!(record.local_id, "b_c");
        assert_eq!(record.handle().unwrap().name(), "a");
        assert_eq!(catalog.counts_for("a_b"), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_duplicate_resource_last_write_wins() {
        let log = EventLog::default();
        let first = ScriptedServer::new("first", &log)
            .resource("papers://folders", "from first")
            .client()
            .await;
        let second = ScriptedServer::new("second", &log)
            .resource("papers://folders", "from second")
            .client()
            .await;

        let (catalog, _) = discover_all(&[first, second]).await;
        assert_eq!(catalog.resources.len(), 1);
        assert_eq!(catalog.resources.get("papers://folders").unwrap().server, "second");
    }

    #[tokio::test]
    async fn test_unsupported_classes_are_none() {
        let log = EventLog::default();
        let client = ScriptedServer::new("tools_only", &log).tool("echo").client().await;

        let discovery = discover(&client).await.unwrap();
        assert_eq!(discovery.tools.map(|t| t.len()), Some(1));
        assert!(discovery.prompts.is_none());
        assert!(discovery.resources.is_none());
    }

    #[tokio::test]
    async fn test_discover_closed_handle_fails() {
        let log = EventLog::default();
        let client = ScriptedServer::new("gone", &log).tool("echo").client().await;
        client.close().await.unwrap();

        let err = discover(&client).await.unwrap_err();
        assert!(matches!(err, McpError::ServerConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_isolated() {
        let log = EventLog::default();
        let healthy = ScriptedServer::new("healthy", &log).tool("ok").client().await;
        let broken = ScriptedServer::new("broken", &log).tool("nope").client().await;
        broken.close().await.unwrap();

        let (catalog, failures) = discover_all(&[broken, healthy]).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].server, "broken");
        assert!(catalog.tools.contains("healthy_ok"));
    }

    #[tokio::test]
    async fn test_tool_definition_description() {
        let log = EventLog::default();
        let client = ScriptedServer::new("fs", &log).tool("read").client().await;
        let (catalog, _) = discover_all(&[client]).await;

        let defs = catalog.tool_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "fs_read");
        assert_eq!(defs[0].description, "[fs] read tool");
        assert_eq!(catalog.counts_for("fs"), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_weak_handle_does_not_keep_session() {
        let log = EventLog::default();
        let client = ScriptedServer::new("tmp", &log).tool("t").client().await;
        let (catalog, _) = discover_all(&[client]).await;

        // The only strong reference was the slice argument.
        assert!(catalog.tools.get("tmp_t").unwrap().handle().is_none());
    }
}
