use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

use crate::config::BackendType;
use crate::error::Result;

pub mod anthropic;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod stream;

/// Default sampling temperature when the caller does not pick one
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Chat message structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Tool definition for function calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the arguments
    pub parameters: serde_json::Value,
}

/// A backend's request to invoke one of the offered tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Always a JSON object; undecodable arguments collapse to `{}`
    pub arguments: serde_json::Value,
}

/// How the model may use the offered tools
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    /// Force a call to the named tool
    Tool(String),
}

impl ToolChoice {
    pub fn parse(value: &str) -> Self {
        match value {
            "auto" => Self::Auto,
            "none" => Self::None,
            name => Self::Tool(name.to_string()),
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// Overrides the client's default model
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            tools: None,
            tool_choice: None,
        }
    }
}

impl ChatOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        self.tools = Some(tools);
        self.tool_choice = Some(choice);
        self
    }

    /// Tools to send on the wire. Empty when none were offered or the
    /// caller disabled them with `ToolChoice::None`.
    pub(crate) fn offered_tools(&self) -> &[ToolDefinition] {
        match (&self.tools, &self.tool_choice) {
            (_, Some(ToolChoice::None)) => &[],
            (Some(tools), _) => tools,
            (None, _) => &[],
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// The total is always derived from its parts
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Length => f.write_str("length"),
            Self::ToolCalls => f.write_str("tool_calls"),
            Self::ContentFilter => f.write_str("content_filter"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Normalized response of a single `chat` round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.as_ref().and_then(|calls| calls.first())
    }
}

/// One element of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub content: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatChunk {
    pub fn delta(content: impl Into<String>) -> Self {
        Self { content: content.into(), done: false, usage: None }
    }

    pub fn finished(content: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        Self { content: content.into(), done: true, usage }
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// Lazily decoded streaming response.
///
/// Yields chunks in arrival order and ends after the single `done` chunk.
/// `cancel()` stops reading at the next suspension point and releases the
/// underlying HTTP body; dropping the stream does the same.
pub struct ChatStream {
    inner: ChunkStream,
    cancel: CancellationToken,
}

impl ChatStream {
    pub fn new(inner: ChunkStream, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this stream, for handing to another task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the stream, concatenating content and keeping the final usage
    pub async fn collect_text(mut self) -> Result<(String, Option<TokenUsage>)> {
        use futures_util::StreamExt;

        let mut text = String::new();
        let mut usage = None;
        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            text.push_str(&chunk.content);
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
        }
        Ok((text, usage))
    }
}

impl Stream for ChatStream {
    type Item = Result<ChatChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Decode tool-call arguments delivered as a JSON-encoded string.
///
/// Never fails: anything that is not a JSON object becomes `{}` and a
/// warning is logged.
pub fn decode_tool_arguments(raw: &str) -> serde_json::Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return serde_json::json!({});
    }

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(other) => {
            log::warn!("tool arguments are not a JSON object, ignoring: {}", other);
            serde_json::json!({})
        }
        Err(e) => {
            log::warn!(
                "failed to decode tool arguments ({}): {}",
                e,
                larder_logging::safe_truncate(raw, 200)
            );
            serde_json::json!({})
        }
    }
}

/// Tool arguments that may arrive already decoded, as a JSON string, or
/// missing. Anything but an object becomes `{}`.
pub fn tool_arguments_from_value(raw: &serde_json::Value) -> serde_json::Value {
    match raw {
        serde_json::Value::Object(_) => raw.clone(),
        serde_json::Value::String(encoded) => decode_tool_arguments(encoded),
        serde_json::Value::Null => serde_json::json!({}),
        other => {
            log::warn!("ignoring non-object tool arguments: {}", other);
            serde_json::json!({})
        }
    }
}

/// Token counter from a usage field, saturating at `u32::MAX`
pub(crate) fn token_count(value: &serde_json::Value) -> Option<u32> {
    value.as_u64().map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// LLM client trait - unified interface for all LLM providers
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Which wire protocol this client speaks
    fn backend(&self) -> BackendType;

    /// Model used when `ChatOptions::model` is unset
    fn default_model(&self) -> &str;

    /// One network round trip
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse>;

    /// Streaming chat completion - returns a lazily decoded stream of chunks
    async fn chat_stream(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatStream>;

    /// Cheap liveness probe; never fails, errors collapse to `false`
    async fn is_available(&self) -> bool;
}
