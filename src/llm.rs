//! Tool-calling chat model client.
//!
//! Defines the message/content-block types exchanged with the model, the
//! [`ChatModel`] trait the answer generator drives, and the Anthropic
//! Messages API backend.
//!
//! # Wire Format
//!
//! ```text
//! POST {url}/v1/messages
//! x-api-key: $ANTHROPIC_API_KEY
//! anthropic-version: 2023-06-01
//!
//! { model, max_tokens, temperature, system, messages,
//!   tools: [{ name, description, input_schema }], tool_choice: { type: "auto" } }
//! ```
//!
//! The response carries a list of content blocks (`text` / `tool_use`)
//! and a `stop_reason`. A `tool_use` stop means the model wants the
//! listed tools executed before it answers.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::LlmConfig;
use crate::embedding::{http_client, post_json_with_retry};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";

/// Faults raised by chat model backends.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider is disabled; set [llm] provider = \"anthropic\"")]
    Disabled,
    #[error("{0} environment variable not set")]
    MissingApiKey(&'static str),
    #[error("LLM request failed: {0}")]
    Request(String),
    #[error("malformed LLM response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "is_false")]
        is_error: bool,
    },
    /// Block types this client does not handle (e.g. `thinking`).
    #[serde(other)]
    Unsupported,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user turn carrying tool results.
    pub fn tool_results(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// Tool advertisement sent with a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// A single model invocation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    /// `None` forbids tool use for this call.
    pub tools: Option<Vec<ToolDefinition>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl ChatResponse {
    /// First text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// `(id, name, input)` of every tool-use block, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

/// A chat model that can be asked to complete a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

// ============ Disabled ============

/// Rejects every request; used when `llm.provider = "disabled"`.
pub struct DisabledChatModel;

#[async_trait]
impl ChatModel for DisabledChatModel {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse> {
        Err(LlmError::Disabled.into())
    }
}

// ============ Anthropic ============

/// Anthropic Messages API client.
///
/// Requires `ANTHROPIC_API_KEY`. Transient failures (429, 5xx, network)
/// are retried with exponential backoff.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<StopReason>,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::MissingApiKey("ANTHROPIC_API_KEY"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_URL.to_string()),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

fn request_body(request: &ChatRequest) -> Value {
    let tools = request.tools.as_deref().filter(|t| !t.is_empty());
    let body = MessagesBody {
        model: &request.model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system: &request.system,
        messages: &request.messages,
        tools,
        tool_choice: tools.map(|_| json!({ "type": "auto" })),
    };
    json!(body)
}

fn parse_response(json: Value) -> std::result::Result<ChatResponse, LlmError> {
    let parsed: MessagesResponse =
        serde_json::from_value(json).map_err(|e| LlmError::Malformed(e.to_string()))?;
    Ok(ChatResponse {
        content: parsed.content,
        stop_reason: parsed.stop_reason.unwrap_or(StopReason::Other),
    })
}

#[async_trait]
impl ChatModel for AnthropicClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = request_body(request);
        let endpoint = format!("{}/v1/messages", self.url.trim_end_matches('/'));

        let json = post_json_with_retry("Anthropic", self.max_retries, || {
            self.client
                .post(&endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        })
        .await
        .map_err(|e| LlmError::Request(format!("{:#}", e)))?;

        Ok(parse_response(json)?)
    }
}

/// Create the [`ChatModel`] named by the configuration.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChatModel)),
        "anthropic" => Ok(Arc::new(AnthropicClient::new(config)?)),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}
