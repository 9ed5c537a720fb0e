use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::http::{execute_json, open_stream, probe, trace_request};
use crate::client::stream::{decode_body, sse_data, Frame, FrameDecoder};
use crate::client::{
    token_count, ChatMessage, ChatOptions, ChatResponse, ChatStream, FinishReason, LlmClient, Role, TokenUsage,
    ToolCall, ToolChoice,
};
use crate::config::{BackendType, ClientConfig, ANTHROPIC_VERSION, DEFAULT_ANTHROPIC_MAX_TOKENS, ENV_ANTHROPIC_API_KEY};
use crate::error::{LlmError, Result};

const ERROR_POINTER: &str = "/error/message";

/// Anthropic LLM client implementation using native Anthropic API
pub struct AnthropicClient {
    config: ClientConfig,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_key = config.require_api_key(ENV_ANTHROPIC_API_KEY)?;
        let base_url = config.require_base_url("ANTHROPIC_BASE_URL")?;
        Ok(Self {
            config,
            api_key,
            base_url,
            client: reqwest::Client::new(),
        })
    }

    fn get_messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(self.get_messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
    }

    fn build_chat_request(&self, messages: &[ChatMessage], options: &ChatOptions, stream: bool) -> Value {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let max_tokens = options
            .max_tokens
            .or(self.config.max_tokens)
            .unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS);

        let mut request = json!({
            "model": model,
            "messages": convert_messages(messages),
            "max_tokens": max_tokens,
            "temperature": options.temperature,
        });

        if let Some(system) = combined_system(messages) {
            request["system"] = Value::String(system);
        }

        // No "none" choice exists here; leaving the tools out has the same effect
        let tools = options.offered_tools();
        if !tools.is_empty() {
            let anthropic_tools: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect();
            request["tools"] = Value::Array(anthropic_tools);

            match &options.tool_choice {
                Some(ToolChoice::Tool(name)) => request["tool_choice"] = json!({"type": "tool", "name": name}),
                Some(ToolChoice::Auto) => request["tool_choice"] = json!({"type": "auto"}),
                _ => {}
            }
        }

        if stream {
            request["stream"] = json!(true);
        }

        request
    }
}

/// Join all system messages; they travel in the top-level `system` field
fn combined_system(messages: &[ChatMessage]) -> Option<String> {
    let system_messages: Vec<&str> = messages
        .iter()
        .filter(|msg| msg.role == Role::System)
        .map(|msg| msg.content.as_str())
        .collect();

    if system_messages.is_empty() {
        None
    } else {
        Some(system_messages.join("\n\n"))
    }
}

/// Conversation turns without the system messages
fn convert_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter(|msg| msg.role != Role::System)
        .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content }))
        .collect()
}

pub(crate) fn finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        Some("refusal") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Other(other.to_string()),
        None => FinishReason::Other("unknown".to_string()),
    }
}

/// Convert a Messages API response body into a [`ChatResponse`]
pub fn parse_response(response: &Value) -> Result<ChatResponse> {
    let blocks = response["content"].as_array().ok_or_else(|| LlmError::InvalidResponse {
        backend: BackendType::Anthropic,
        message: "response has no content array".to_string(),
    })?;

    let mut text_content = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str() {
                    text_content.push_str(text);
                }
            }
            Some("tool_use") => {
                let (Some(id), Some(name)) = (block["id"].as_str(), block["name"].as_str()) else {
                    log::warn!("skipping tool_use block without id or name");
                    continue;
                };
                // input arrives already decoded
                let arguments = match &block["input"] {
                    input @ Value::Object(_) => input.clone(),
                    _ => json!({}),
                };
                tool_calls.push(ToolCall { id: id.to_string(), name: name.to_string(), arguments });
            }
            _ => {}
        }
    }

    let usage = &response["usage"];
    let usage = TokenUsage::new(
        token_count(&usage["input_tokens"]).unwrap_or(0),
        token_count(&usage["output_tokens"]).unwrap_or(0),
    );

    Ok(ChatResponse {
        content: text_content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        usage,
        finish_reason: finish_reason(response["stop_reason"].as_str()),
    })
}

/// Decoder for the typed-event SSE dialect (`content_block_delta` ...
/// `message_stop`). Token counts arrive on `message_start` and
/// `message_delta` and are reported on the terminal chunk.
#[derive(Debug, Default)]
pub struct AnthropicFrameDecoder {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl AnthropicFrameDecoder {
    fn usage(&self) -> Option<TokenUsage> {
        if self.input_tokens.is_none() && self.output_tokens.is_none() {
            return None;
        }
        Some(TokenUsage::new(self.input_tokens.unwrap_or(0), self.output_tokens.unwrap_or(0)))
    }
}

impl FrameDecoder for AnthropicFrameDecoder {
    fn decode_line(&mut self, line: &str) -> Option<Frame> {
        // `event:` lines repeat the type carried in the data payload
        let data = sse_data(line)?;
        let json: Value = serde_json::from_str(data).ok()?;

        match json["type"].as_str()? {
            "message_start" => {
                let usage = &json["message"]["usage"];
                if let Some(input) = token_count(&usage["input_tokens"]) {
                    self.input_tokens = Some(input);
                }
                if let Some(output) = token_count(&usage["output_tokens"]) {
                    self.output_tokens = Some(output);
                }
                None
            }
            "content_block_delta" => json["delta"]["text"]
                .as_str()
                .filter(|text| !text.is_empty())
                .map(|text| Frame::Delta(text.to_string())),
            "message_delta" => {
                if let Some(output) = token_count(&json["usage"]["output_tokens"]) {
                    self.output_tokens = Some(output);
                }
                None
            }
            "message_stop" => Some(Frame::Done { content: String::new(), usage: self.usage() }),
            "error" => {
                let message = json["error"]["message"].as_str().unwrap_or("Unknown error");
                Some(Frame::Failed(message.to_string()))
            }
            // ping, content_block_start, content_block_stop
            _ => None,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn backend(&self) -> BackendType {
        BackendType::Anthropic
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse> {
        let url = self.get_messages_url();
        let request = self.build_chat_request(messages, options, false);
        trace_request(BackendType::Anthropic, &self.config, &url, &request);

        let body = execute_json(
            BackendType::Anthropic,
            self.post(&request),
            &url,
            self.config.timeout,
            ERROR_POINTER,
            self.config.verbose,
        )
        .await?;

        parse_response(&body)
    }

    async fn chat_stream(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatStream> {
        let url = self.get_messages_url();
        let request = self.build_chat_request(messages, options, true);
        trace_request(BackendType::Anthropic, &self.config, &url, &request);

        let response = open_stream(
            BackendType::Anthropic,
            self.post(&request).header("Accept", "text/event-stream"),
            &url,
            self.config.timeout,
            ERROR_POINTER,
        )
        .await?;

        Ok(decode_body(
            response.bytes_stream(),
            AnthropicFrameDecoder::default(),
            BackendType::Anthropic,
            self.config.stream_idle_timeout,
            self.config.verbose,
        ))
    }

    /// There is no free endpoint that checks the key, so this spends a
    /// one-token completion.
    async fn is_available(&self) -> bool {
        let request = json!({
            "model": self.config.model,
            "max_tokens": 1,
            "messages": [{ "role": "user", "content": "ping" }],
        });
        probe(self.post(&request), self.config.probe_timeout).await
    }
}
