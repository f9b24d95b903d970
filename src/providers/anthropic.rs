// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Anthropic Claude provider implementation.
//!
//! A [`Provider`] for Anthropic's Messages API. Each call is a single
//! non-streaming request.
//!
//! # API Reference
//!
//! See [Anthropic Messages API](https://docs.anthropic.com/en/api/messages) for details.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::ProviderError;
use crate::types::{
    ContentBlock, ContentBlockType, Message, MessageContent, Provider, ProviderConfig,
    ProviderResponse, Role, StopReason, TokenUsage, ToolDefinition,
};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default max tokens if not specified.
pub const DEFAULT_MAX_TOKENS: u32 = 2024;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `model` - Model identifier (e.g., "claude-3-7-sonnet-20250219")
    /// * `base_url` - API base URL
    /// * `config` - Additional configuration options
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        config: ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let timeout = config
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    /// Build the request body for the Messages API.
    fn build_request(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        system_prompt: Option<&str>,
    ) -> AnthropicRequest {
        let api_tools: Option<Vec<ApiTool>> = tools
            .filter(|t| !t.is_empty())
            .map(|t| t.iter().map(|t| t.into()).collect());

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: merge_consecutive_roles(messages),
            system: system_prompt.map(String::from),
            tools: api_tools,
        }
    }

    /// Handle an error response from the API.
    fn handle_error_response(&self, status_code: u16, body: &str) -> ProviderError {
        if let Ok(error) = serde_json::from_str::<ApiError>(body) {
            match error.error.error_type.as_str() {
                "authentication_error" => ProviderError::AuthError(error.error.message),
                "rate_limit_error" => ProviderError::RateLimited(error.error.message),
                "invalid_request_error" => {
                    if error.error.message.contains("model") {
                        ProviderError::ModelNotFound(error.error.message)
                    } else {
                        ProviderError::api(error.error.message, status_code)
                    }
                }
                "overloaded_error" => ProviderError::RateLimited("API overloaded".to_string()),
                _ => ProviderError::api(error.error.message, status_code),
            }
        } else {
            ProviderError::api(body.to_string(), status_code)
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        system_prompt: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = self.build_request(messages, tools, system_prompt);
        let start = Instant::now();

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(start.elapsed().as_millis() as u64)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Anthropic request failed");
            return Err(self.handle_error_response(status.as_u16(), &error_text));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let provider_response: ProviderResponse = api_response.into();

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            blocks = provider_response.content.len(),
            stop_reason = ?provider_response.stop_reason,
            "Chat response received"
        );

        Ok(provider_response)
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Convert history to API messages, folding consecutive same-role messages
/// into one. Each tool result is its own user message in the conversation,
/// but the API wants all results for one assistant turn in a single message.
fn merge_consecutive_roles(messages: &[Message]) -> Vec<ApiMessage> {
    let mut merged: Vec<ApiMessage> = Vec::with_capacity(messages.len());

    for msg in messages {
        let next: ApiMessage = msg.into();
        match merged.last_mut() {
            Some(last) if last.role == next.role => {
                let previous = std::mem::replace(&mut last.content, ApiContent::Blocks(Vec::new()));
                let mut blocks = previous.into_blocks();
                blocks.extend(next.content.into_blocks());
                last.content = ApiContent::Blocks(blocks);
            }
            _ => merged.push(next),
        }
    }

    merged
}

// ============================================================================
// API Types
// ============================================================================

/// Request body for the Messages API.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
}

/// API message format.
#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: ApiContent,
}

/// Content can be a string or array of blocks.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

impl ApiContent {
    fn into_blocks(self) -> Vec<ApiContentBlock> {
        match self {
            Self::Text(text) => vec![ApiContentBlock::text(text)],
            Self::Blocks(blocks) => blocks,
        }
    }
}

/// A content block in the API format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_use_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_error: Option<bool>,
}

impl ApiContentBlock {
    fn text(text: String) -> Self {
        Self {
            block_type: "text".to_string(),
            text: Some(text),
            ..Default::default()
        }
    }
}

/// Tool definition in API format.
#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

/// API response format.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: ApiUsage,
}

/// Token usage in API format.
#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

// ============================================================================
// Type Conversions
// ============================================================================

impl From<&Message> for ApiMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let content = match &msg.content {
            MessageContent::Text(s) => ApiContent::Text(s.clone()),
            MessageContent::Blocks(blocks) => {
                ApiContent::Blocks(blocks.iter().map(|b| b.into()).collect())
            }
        };

        Self {
            role: role.to_string(),
            content,
        }
    }
}

impl From<&ContentBlock> for ApiContentBlock {
    fn from(block: &ContentBlock) -> Self {
        match block.block_type {
            ContentBlockType::Text => Self {
                block_type: "text".to_string(),
                text: block.text.clone(),
                ..Default::default()
            },
            ContentBlockType::ToolUse => Self {
                block_type: "tool_use".to_string(),
                id: block.id.clone(),
                name: block.name.clone(),
                input: block.input.clone(),
                ..Default::default()
            },
            ContentBlockType::ToolResult => Self {
                block_type: "tool_result".to_string(),
                tool_use_id: block.tool_use_id.clone(),
                content: block.content.clone(),
                is_error: block.is_error,
                ..Default::default()
            },
        }
    }
}

impl From<&ToolDefinition> for ApiTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
        }
    }
}

impl From<ApiResponse> for ProviderResponse {
    fn from(response: ApiResponse) -> Self {
        let content: Vec<ContentBlock> = response
            .content
            .into_iter()
            .filter_map(|block| match block.block_type.as_str() {
                "text" => block.text.map(ContentBlock::text),
                "tool_use" => match (block.id, block.name) {
                    (Some(id), Some(name)) => Some(ContentBlock::tool_use(
                        id,
                        name,
                        block.input.unwrap_or_else(|| serde_json::json!({})),
                    )),
                    _ => None,
                },
                _ => None,
            })
            .collect();

        let stop_reason = match response.stop_reason.as_deref() {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        };

        Self {
            content,
            stop_reason,
            usage: Some(TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolResult;
    use serde_json::json;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(
            "test-key",
            "claude-3-7-sonnet-20250219",
            "https://api.anthropic.com/",
            ProviderConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_provider_creation() {
        let provider = provider();
        assert_eq!(provider.name(), "Anthropic");
        assert_eq!(provider.model(), "claude-3-7-sonnet-20250219");
        assert_eq!(provider.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(provider.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_message_conversion() {
        let msg = Message::user("Hello, Claude!");
        let api_msg: ApiMessage = (&msg).into();

        assert_eq!(api_msg.role, "user");
        match api_msg.content {
            ApiContent::Text(s) => assert_eq!(s, "Hello, Claude!"),
            _ => panic!("Expected text content"),
        }
    }

    #[test]
    fn test_tool_conversion() {
        let tool = ToolDefinition::new("research_search_papers", "[research] Search arXiv")
            .with_schema(json!({"type": "object", "properties": {"topic": {"type": "string"}}}));
        let api_tool: ApiTool = (&tool).into();

        assert_eq!(api_tool.name, "research_search_papers");
        assert_eq!(api_tool.input_schema["properties"]["topic"]["type"], "string");
    }

    #[test]
    fn test_tool_results_are_merged_into_one_user_message() {
        let history = vec![
            Message::user("compare"),
            Message::with_blocks(
                Role::Assistant,
                vec![
                    ContentBlock::tool_use("t1", "a_fetch", json!({})),
                    ContentBlock::tool_use("t2", "b_fetch", json!({})),
                ],
            ),
            Message::with_blocks(Role::User, vec![ToolResult::success("t1", "one").into_block()]),
            Message::with_blocks(Role::User, vec![ToolResult::error("t2", "two").into_block()]),
        ];

        let request = provider().build_request(&history, None, None);
        assert_eq!(request.messages.len(), 3);
        assert!(request.tools.is_none());

        let body = serde_json::to_value(&request).unwrap();
        let last = &body["messages"][2];
        assert_eq!(last["role"], "user");
        assert_eq!(last["content"][0]["tool_use_id"], "t1");
        assert_eq!(last["content"][1]["tool_use_id"], "t2");
        assert_eq!(last["content"][1]["is_error"], true);
    }

    #[test]
    fn test_response_conversion_keeps_order() {
        let api: ApiResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "research_search_papers", "input": {"topic": "llm"}},
                {"type": "text", "text": "And also."}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 34}
        }))
        .unwrap();

        let response: ProviderResponse = api.into();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.content.len(), 3);
        assert_eq!(response.text_segments().collect::<Vec<_>>(), vec!["Let me look.", "And also."]);
        assert_eq!(response.tool_calls()[0].input, json!({"topic": "llm"}));
        assert_eq!(response.usage.map(|u| u.total()), Some(46));
    }

    #[test]
    fn test_error_mapping() {
        let provider = provider();
        let auth = provider.handle_error_response(
            401,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        );
        assert!(matches!(auth, ProviderError::AuthError(_)));

        let overloaded = provider.handle_error_response(
            529,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        assert!(overloaded.is_retryable());

        let raw = provider.handle_error_response(502, "bad gateway");
        assert!(matches!(raw, ProviderError::ApiError { status_code: Some(502), .. }));
    }
}
