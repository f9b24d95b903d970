// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Invocation routing.
//!
//! Resolves a name from the model or the user to the session that owns it and
//! dispatches the call.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::client::McpClient;
use super::error::McpError;
use super::registry::{Catalog, CapabilityRecord};
use super::types::{McpToolResult, ResourceContents};

/// A resolved capability and the identifier to send to its server.
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub record: &'a CapabilityRecord,
    /// Server-local name, or the requested URI for resources.
    pub target: &'a str,
}

impl Route<'_> {
    fn handle(&self) -> Result<Arc<McpClient>, McpError> {
        self.record
            .handle()
            .filter(|h| h.is_alive())
            .ok_or_else(|| self.failed(McpError::SessionClosed(self.record.server.clone())))
    }

    fn failed(&self, cause: McpError) -> McpError {
        McpError::invocation_failed(&self.record.server, &self.record.public_id, cause)
    }
}

/// Routes calls through a shared, read-only catalog.
#[derive(Debug, Clone)]
pub struct Router {
    catalog: Arc<Catalog>,
}

impl Router {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve a tool name.
    ///
    /// Exact match first. Otherwise the name is treated as bare and matched
    /// against `_{name}` suffixes; exactly one match resolves, zero or several
    /// fail with `ToolNotFound`.
    pub fn resolve_tool<'a>(&'a self, name: &str) -> Result<Route<'a>, McpError> {
        if let Some(record) = self.catalog.tools.get(name) {
            return Ok(Route {
                record,
                target: &record.local_id,
            });
        }

        let suffix = format!("_{}", name);
        let candidates: Vec<&CapabilityRecord> = self
            .catalog
            .tools
            .iter()
            .filter(|r| r.public_id.ends_with(&suffix))
            .collect();

        match candidates.as_slice() {
            [record] => {
                let record = *record;
                tracing::debug!(
                    requested = %name,
                    resolved = %record.public_id,
                    "Resolved tool by suffix"
                );
                Ok(Route {
                    record,
                    target: &record.local_id,
                })
            }
            [] => Err(McpError::ToolNotFound {
                name: name.to_string(),
            }),
            many => {
                let names: Vec<&str> = many.iter().map(|r| r.public_id.as_str()).collect();
                tracing::warn!(requested = %name, candidates = ?names, "Ambiguous tool name");
                Err(McpError::ToolNotFound {
                    name: name.to_string(),
                })
            }
        }
    }

    /// Resolve a resource URI.
    ///
    /// Exact match first. Otherwise, if the URI has a `scheme://` prefix, the
    /// first registered resource with the same scheme serves the requested URI.
    pub fn resolve_resource<'a>(&'a self, uri: &'a str) -> Result<Route<'a>, McpError> {
        if let Some(record) = self.catalog.resources.get(uri) {
            return Ok(Route {
                record,
                target: &record.local_id,
            });
        }

        let prefix = uri
            .split_once("://")
            .map(|(scheme, _)| format!("{}://", scheme))
            .filter(|p| p.len() > 3);

        prefix
            .and_then(|prefix| {
                self.catalog
                    .resources
                    .iter()
                    .find(|r| r.public_id.starts_with(&prefix))
            })
            .map(|record| {
                tracing::debug!(
                    requested = %uri,
                    server = %record.server,
                    "Resolved resource by scheme"
                );
                Route { record, target: uri }
            })
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))
    }

    /// Resolve a prompt name. Exact match only.
    pub fn resolve_prompt<'a>(&'a self, name: &str) -> Result<Route<'a>, McpError> {
        self.catalog
            .prompts
            .get(name)
            .map(|record| Route {
                record,
                target: &record.local_id,
            })
            .ok_or_else(|| McpError::PromptNotFound(name.to_string()))
    }

    /// Call a resolved tool.
    pub async fn invoke(
        &self,
        route: Route<'_>,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        let handle = route.handle()?;
        handle
            .call_tool(route.target, arguments)
            .await
            .map_err(|e| route.failed(e))
    }

    /// Resolve and call a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        let route = self.resolve_tool(name)?;
        self.invoke(route, arguments).await
    }

    /// Resolve and read a resource.
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents, McpError> {
        let route = self.resolve_resource(uri)?;
        let handle = route.handle()?;
        handle
            .read_resource(route.target)
            .await
            .map_err(|e| route.failed(e))
    }

    /// Resolve and render a prompt; returns the first message as text.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<String, McpError> {
        let route = self.resolve_prompt(name)?;
        let handle = route.handle()?;
        let messages = handle
            .get_prompt(route.target, arguments)
            .await
            .map_err(|e| route.failed(e))?;

        messages
            .first()
            .map(|m| m.content.as_text())
            .ok_or_else(|| {
                route.failed(McpError::InvalidResponse(
                    "prompt returned no messages".into(),
                ))
            })
    }
}
