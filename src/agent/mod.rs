// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent module - the turn engine.
//!
//! The agent orchestrates the conversation between the user, the model and the
//! MCP servers behind the [`Router`]. It implements the agentic loop:
//! send message -> receive response -> execute tools -> repeat.
//!
//! Every query starts from a fresh conversation; nothing carries over between
//! queries.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_chatbot::agent::{Agent, AgentCallbacks, AgentConfig, AgentOptions};
//!
//! let agent = Agent::new(AgentOptions {
//!     provider: Arc::from(create_provider_from_env()?),
//!     router,
//!     config: AgentConfig::default(),
//!     callbacks: AgentCallbacks::default(),
//! });
//!
//! let outcome = agent.chat("Find recent papers on diffusion models").await?;
//! println!("{}", outcome.response);
//! ```

mod types;

pub use types::{AgentCallbacks, AgentConfig, AgentOptions, TurnOutcome, TurnStats, TurnToolCall};

use std::collections::HashMap;
use std::time::Instant;

use crate::error::AgentError;
use crate::mcp::Router;
use crate::types::{Message, Role, SharedProvider, ToolCall, ToolResult};

/// Drives one query at a time through model calls and tool invocations.
pub struct Agent {
    /// Model provider.
    provider: SharedProvider,
    /// Routes tool calls to their servers.
    router: Router,
    /// Configuration.
    config: AgentConfig,
    /// Event callbacks.
    callbacks: AgentCallbacks,
}

impl Agent {
    /// Create a new agent with the given options.
    pub fn new(options: AgentOptions) -> Self {
        Self {
            provider: options.provider,
            router: options.router,
            config: options.config,
            callbacks: options.callbacks,
        }
    }

    /// The router this agent dispatches through.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The main agentic loop.
    ///
    /// Sends `query` with the full tool catalog, executes every tool the model
    /// asks for in order, and repeats until a response carries no tool calls.
    /// Tool failures are reported back to the model as error results and do
    /// not end the turn. A model call failure does.
    pub async fn chat(&self, query: &str) -> Result<TurnOutcome, AgentError> {
        let start_time = Instant::now();
        let mut stats = TurnStats::default();
        let mut conversation = vec![Message::user(query)];

        let tools = self.router.catalog().tool_definitions();
        let tools = (!tools.is_empty()).then_some(tools.as_slice());
        let system_prompt = self.config.system_prompt.as_deref();

        let response_text = loop {
            stats.iterations += 1;
            tracing::debug!(
                iteration = stats.iterations,
                messages = conversation.len(),
                "Calling model"
            );

            let response = self.provider.chat(&conversation, tools, system_prompt).await?;

            if let Some(ref usage) = response.usage {
                stats.input_tokens += u64::from(usage.input_tokens);
                stats.output_tokens += u64::from(usage.output_tokens);
                stats.total_tokens = stats.input_tokens + stats.output_tokens;
            }

            let segments: Vec<String> = response.text_segments().map(str::to_string).collect();
            if let Some(ref on_text) = self.callbacks.on_text {
                for segment in &segments {
                    on_text(segment);
                }
            }

            let tool_calls = response.tool_calls();
            if !response.content.is_empty() {
                conversation.push(Message::with_blocks(Role::Assistant, response.content));
            }

            if tool_calls.is_empty() {
                break segments.join("\n");
            }

            if stats.iterations >= self.config.max_iterations {
                tracing::warn!(
                    max_iterations = self.config.max_iterations,
                    pending_tools = tool_calls.len(),
                    "Turn limit reached with tool calls outstanding"
                );
                return Err(AgentError::TurnLimitExceeded(self.config.max_iterations));
            }

            for call in &tool_calls {
                let result = self.execute_tool(call, &mut stats).await;
                conversation.push(Message::with_blocks(Role::User, vec![result.into_block()]));
            }
        };

        stats.duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            iterations = stats.iterations,
            tool_calls = stats.tool_call_count,
            total_tokens = stats.total_tokens,
            duration_ms = stats.duration_ms,
            "Turn complete"
        );

        if let Some(ref on_turn_complete) = self.callbacks.on_turn_complete {
            on_turn_complete(&stats);
        }

        Ok(TurnOutcome {
            response: response_text,
            stats,
            conversation,
        })
    }

    /// Render a server prompt and run it as a query.
    pub async fn run_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<TurnOutcome, AgentError> {
        let text = self.router.get_prompt(name, arguments).await?;
        tracing::debug!(prompt = %name, chars = text.len(), "Rendered prompt");
        self.chat(&text).await
    }

    /// Resolve and invoke one tool call; failures become error results.
    async fn execute_tool(&self, call: &ToolCall, stats: &mut TurnStats) -> ToolResult {
        if let Some(ref on_tool_call) = self.callbacks.on_tool_call {
            on_tool_call(&call.id, &call.name, &call.input);
        }

        let started = Instant::now();
        let result = match self.router.call_tool(&call.name, call.input.clone()).await {
            Ok(output) if output.is_error => ToolResult::error(&call.id, output.as_text()),
            Ok(output) => ToolResult::success(&call.id, output.as_text()),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::error(&call.id, format!("Error: {}", e))
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        stats.tool_call_count += 1;
        stats.tool_calls.push(TurnToolCall {
            name: call.name.clone(),
            duration_ms,
            is_error: result.is_error(),
        });

        if let Some(ref on_tool_result) = self.callbacks.on_tool_result {
            on_tool_result(&call.id, &call.name, &result.content, result.is_error());
        }

        result
    }
}
