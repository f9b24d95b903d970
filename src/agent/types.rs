// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent types and configuration.

use std::sync::Arc;

use crate::config::{ResolvedConfig, DEFAULT_MAX_ITERATIONS};
use crate::mcp::Router;
use crate::types::{Message, SharedProvider};

/// Statistics for a single turn (user message -> final response).
#[derive(Debug, Clone, Default)]
pub struct TurnStats {
    /// Number of model calls made.
    pub iterations: usize,
    /// Number of tool calls executed.
    pub tool_call_count: usize,
    /// Input tokens used.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Total tokens (input + output).
    pub total_tokens: u64,
    /// Duration of the turn in milliseconds.
    pub duration_ms: u64,
    /// Individual tool call stats.
    pub tool_calls: Vec<TurnToolCall>,
}

/// Statistics for a single tool call.
#[derive(Debug, Clone)]
pub struct TurnToolCall {
    /// Tool name as requested by the model.
    pub name: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the tool call resulted in an error.
    pub is_error: bool,
}

/// Callbacks for agent events.
///
/// Uses `Arc` instead of `Box` so the front-end can share one closure between
/// several agents and tasks.
#[derive(Clone, Default)]
pub struct AgentCallbacks {
    /// Called for each text segment the model emits, in order.
    pub on_text: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    /// Called when a tool is about to be executed (tool_id, tool_name, input).
    pub on_tool_call: Option<Arc<dyn Fn(&str, &str, &serde_json::Value) + Send + Sync>>,
    /// Called when a tool execution completes (tool_id, tool_name, result, is_error).
    pub on_tool_result: Option<Arc<dyn Fn(&str, &str, &str, bool) + Send + Sync>>,
    /// Called when a turn completes with stats.
    pub on_turn_complete: Option<Arc<dyn Fn(&TurnStats) + Send + Sync>>,
}

impl std::fmt::Debug for AgentCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCallbacks")
            .field("on_text", &self.on_text.is_some())
            .field("on_tool_call", &self.on_tool_call.is_some())
            .field("on_tool_result", &self.on_tool_result.is_some())
            .field("on_turn_complete", &self.on_turn_complete.is_some())
            .finish()
    }
}

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of model calls per query.
    pub max_iterations: usize,
    /// Optional system prompt sent with every model call.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: None,
        }
    }
}

impl From<&ResolvedConfig> for AgentConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            system_prompt: None,
        }
    }
}

/// Options for creating an agent.
pub struct AgentOptions {
    /// Model provider.
    pub provider: SharedProvider,
    /// Router over the discovered catalog.
    pub router: Router,
    /// Agent configuration.
    pub config: AgentConfig,
    /// Event callbacks.
    pub callbacks: AgentCallbacks,
}

/// What a finished query produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text of the final model response.
    pub response: String,
    /// Turn statistics.
    pub stats: TurnStats,
    /// The full conversation, for inspection. Not reused by the agent.
    pub conversation: Vec<Message>,
}
