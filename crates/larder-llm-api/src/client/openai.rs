use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::http::{execute_json, open_stream, probe, trace_request};
use crate::client::stream::{decode_body, sse_data, Frame, FrameDecoder};
use crate::client::{
    token_count, tool_arguments_from_value, ChatMessage, ChatOptions, ChatResponse, ChatStream,
    FinishReason, LlmClient, TokenUsage, ToolCall, ToolChoice,
};
use crate::config::{BackendType, ClientConfig, ENV_OPENAI_API_KEY};
use crate::error::{LlmError, Result};

const ERROR_POINTER: &str = "/error/message";

/// OpenAI chat-completions client (also works for compatible gateways)
pub struct OpenAiClient {
    config: ClientConfig,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_key = config.require_api_key(ENV_OPENAI_API_KEY)?;
        let base_url = config.require_base_url("OPENAI_BASE_URL")?;
        Ok(Self {
            config,
            api_key,
            base_url,
            client: reqwest::Client::new(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    fn build_chat_request(&self, messages: &[ChatMessage], options: &ChatOptions, stream: bool) -> Value {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content }))
            .collect();

        let mut request = json!({
            "model": model,
            "messages": wire_messages,
            "temperature": options.temperature,
        });

        if let Some(max_tokens) = options.max_tokens.or(self.config.max_tokens) {
            request["max_tokens"] = json!(max_tokens);
        }

        // OpenAI has a real "none" choice, so tools are sent as given
        if let Some(tools) = options.tools.as_ref().filter(|tools| !tools.is_empty()) {
            let tool_definitions: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            request["tools"] = Value::Array(tool_definitions);
            if let Some(choice) = &options.tool_choice {
                request["tool_choice"] = tool_choice_value(choice);
            }
        }

        if stream {
            request["stream"] = json!(true);
            request["stream_options"] = json!({ "include_usage": true });
        }

        request
    }

    fn post(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
    }
}

fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Tool(name) => json!({ "type": "function", "function": { "name": name } }),
    }
}

pub(crate) fn finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Other(other.to_string()),
        None => FinishReason::Other("unknown".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// Normally a JSON-encoded string; some compatible servers send an object
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Convert a chat-completions response body into a [`ChatResponse`]
pub fn parse_response(body: Value) -> Result<ChatResponse> {
    let response: WireResponse = serde_json::from_value(body).map_err(|e| LlmError::InvalidResponse {
        backend: BackendType::OpenAI,
        message: e.to_string(),
    })?;

    let choice = response.choices.into_iter().next().ok_or_else(|| LlmError::InvalidResponse {
        backend: BackendType::OpenAI,
        message: "response contained no choices".to_string(),
    })?;

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: tool_arguments_from_value(&call.function.arguments),
        })
        .collect();

    let usage = response
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        usage,
        finish_reason: finish_reason(choice.finish_reason.as_deref()),
    })
}

/// Decoder for `data: {...}` SSE lines terminated by `data: [DONE]`
#[derive(Debug, Default)]
pub struct OpenAiFrameDecoder {
    usage: Option<TokenUsage>,
}

impl FrameDecoder for OpenAiFrameDecoder {
    fn decode_line(&mut self, line: &str) -> Option<Frame> {
        let data = sse_data(line)?;

        if data.trim() == "[DONE]" {
            return Some(Frame::Done { content: String::new(), usage: self.usage.take() });
        }

        let json: Value = serde_json::from_str(data).ok()?;

        if let Some(message) = json.pointer("/error/message").and_then(Value::as_str) {
            return Some(Frame::Failed(message.to_string()));
        }

        // usage arrives on its own chunk (with empty choices) right before [DONE]
        if let Some(usage) = json.get("usage").filter(|u| u.is_object()) {
            let input = token_count(&usage["prompt_tokens"]).unwrap_or(0);
            let output = token_count(&usage["completion_tokens"]).unwrap_or(0);
            self.usage = Some(TokenUsage::new(input, output));
        }

        json.pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| Frame::Delta(text.to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn backend(&self) -> BackendType {
        BackendType::OpenAI
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse> {
        let url = self.chat_url();
        let request = self.build_chat_request(messages, options, false);
        trace_request(BackendType::OpenAI, &self.config, &url, &request);

        let body = execute_json(
            BackendType::OpenAI,
            self.post(&url, &request),
            &url,
            self.config.timeout,
            ERROR_POINTER,
            self.config.verbose,
        )
        .await?;

        parse_response(body)
    }

    async fn chat_stream(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatStream> {
        let url = self.chat_url();
        let request = self.build_chat_request(messages, options, true);
        trace_request(BackendType::OpenAI, &self.config, &url, &request);

        let response = open_stream(
            BackendType::OpenAI,
            self.post(&url, &request).header("Accept", "text/event-stream"),
            &url,
            self.config.timeout,
            ERROR_POINTER,
        )
        .await?;

        Ok(decode_body(
            response.bytes_stream(),
            OpenAiFrameDecoder::default(),
            BackendType::OpenAI,
            self.config.stream_idle_timeout,
            self.config.verbose,
        ))
    }

    async fn is_available(&self) -> bool {
        let request = self.client.get(self.models_url()).bearer_auth(&self.api_key);
        probe(request, self.config.probe_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stream::FrameReader;
    use crate::client::ToolDefinition;
    use pretty_assertions::assert_eq;

    fn client() -> OpenAiClient {
        OpenAiClient::new(ClientConfig::for_backend(BackendType::OpenAI).with_api_key("sk-test")).unwrap()
    }

    fn add_tool() -> ToolDefinition {
        ToolDefinition {
            name: "add_items".to_string(),
            description: "Add items".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = OpenAiClient::new(ClientConfig::for_backend(BackendType::OpenAI)).err().unwrap();
        assert!(matches!(err, LlmError::Configuration(ref msg) if msg.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_request_keeps_system_message_inline() {
        let messages = vec![ChatMessage::system("You track groceries."), ChatMessage::user("I bought milk")];
        let request = client().build_chat_request(&messages, &ChatOptions::default(), false);

        assert_eq!(request["model"], "gpt-4o-mini");
        assert_eq!(request["messages"][0], json!({"role": "system", "content": "You track groceries."}));
        assert_eq!(request["messages"][1]["role"], "user");
        assert!(request.get("tools").is_none());
        assert!(request.get("stream").is_none());
    }

    #[test]
    fn test_request_tool_wrapping_and_choice() {
        let options = ChatOptions::default().with_tools(vec![add_tool()], ToolChoice::Tool("add_items".into()));
        let request = client().build_chat_request(&[ChatMessage::user("hi")], &options, false);

        assert_eq!(request["tools"][0]["type"], "function");
        assert_eq!(request["tools"][0]["function"]["name"], "add_items");
        assert_eq!(request["tool_choice"], json!({"type": "function", "function": {"name": "add_items"}}));

        let options = ChatOptions::default().with_tools(vec![add_tool()], ToolChoice::None);
        let request = client().build_chat_request(&[ChatMessage::user("hi")], &options, false);
        assert_eq!(request["tool_choice"], "none");
        assert_eq!(request["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_stream_request_asks_for_usage() {
        let request = client().build_chat_request(&[ChatMessage::user("hi")], &ChatOptions::default(), true);
        assert_eq!(request["stream"], true);
        assert_eq!(request["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_parse_text_response() {
        let response = parse_response(json!({
            "choices": [{"message": {"role": "assistant", "content": "You have 2 eggs."}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        assert_eq!(response.content, "You have 2 eggs.");
        assert_eq!(response.tool_calls, None);
        assert_eq!(response.usage, TokenUsage::new(10, 5));
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response = parse_response(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "add_items", "arguments": "{\"items\":[{\"name\":\"Milk\"}]}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 7, "completion_tokens": 3}
        }))
        .unwrap();

        let call = response.first_tool_call().unwrap();
        assert_eq!(call.id, "call_1");
        assert_eq!(call.arguments, json!({"items": [{"name": "Milk"}]}));
        assert_eq!(response.content, "");
        assert_eq!(response.usage.total_tokens, 10);
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
    }

    #[test]
    fn test_parse_malformed_arguments_become_empty_object() {
        let response = parse_response(json!({
            "choices": [{
                "message": {"tool_calls": [{"id": "c", "function": {"name": "add_items", "arguments": "{not json"}}]},
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        assert_eq!(response.first_tool_call().unwrap().arguments, json!({}));
        assert_eq!(response.usage, TokenUsage::default());
    }

    #[test]
    fn test_parse_null_or_object_arguments() {
        let with_arguments = |arguments: Value| {
            json!({"choices": [{"message": {"tool_calls": [{"id": "c", "function": {"name": "add_items", "arguments": arguments}}]}}]})
        };

        let response = parse_response(with_arguments(Value::Null)).unwrap();
        assert_eq!(response.first_tool_call().unwrap().name, "add_items");
        assert_eq!(response.first_tool_call().unwrap().arguments, json!({}));

        let items = json!({"items": [{"name": "Milk"}]});
        let response = parse_response(with_arguments(items.clone())).unwrap();
        assert_eq!(response.first_tool_call().unwrap().arguments, items);

        let missing = json!({"choices": [{"message": {"tool_calls": [{"id": "c", "function": {"name": "add_items"}}]}}]});
        assert_eq!(parse_response(missing).unwrap().first_tool_call().unwrap().arguments, json!({}));
    }

    #[test]
    fn test_parse_without_choices_is_invalid() {
        let err = parse_response(json!({"choices": []})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"You have \"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {not json}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"3 apples\"}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":6,\"total_tokens\":10}}\n\n",
        "data: [DONE]\n\n",
    );

    fn decode_in_pieces(piece_len: usize) -> Vec<Frame> {
        let mut reader = FrameReader::new(OpenAiFrameDecoder::default());
        let mut frames = Vec::new();
        for piece in SSE_BODY.as_bytes().chunks(piece_len) {
            frames.extend(reader.push(piece));
        }
        frames.extend(reader.finish());
        frames
    }

    #[test]
    fn test_stream_decoding() {
        assert_eq!(decode_in_pieces(SSE_BODY.len()), vec![
            Frame::Delta("You have ".into()),
            Frame::Delta("3 apples".into()),
            Frame::Done { content: String::new(), usage: Some(TokenUsage::new(4, 6)) },
        ]);
    }

    #[test]
    fn test_stream_decoding_is_split_invariant() {
        let whole = decode_in_pieces(SSE_BODY.len());
        for piece_len in [1, 2, 3, 7, 16, 50] {
            assert_eq!(decode_in_pieces(piece_len), whole, "piece length {}", piece_len);
        }
    }
}
