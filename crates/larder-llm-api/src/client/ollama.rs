use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::http::{execute_json, open_stream, probe, trace_request};
use crate::client::stream::{decode_body, Frame, FrameDecoder};
use crate::client::{
    token_count, tool_arguments_from_value, ChatMessage, ChatOptions, ChatResponse, ChatStream,
    FinishReason, LlmClient, TokenUsage, ToolCall, ToolChoice, ToolDefinition,
};
use crate::config::{BackendType, ClientConfig, ENV_OLLAMA_BASE_URL};
use crate::error::{LlmError, Result};

const ERROR_POINTER: &str = "/error";

/// Ollama client for a self-hosted server (`/api/chat`, NDJSON streaming)
pub struct OllamaClient {
    config: ClientConfig,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.require_base_url(ENV_OLLAMA_BASE_URL)?;
        Ok(Self {
            config,
            base_url,
            client: reqwest::Client::new(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    fn build_chat_request(&self, messages: &[ChatMessage], options: &ChatOptions, stream: bool) -> Value {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content }))
            .collect();

        let mut model_options = json!({ "temperature": options.temperature });
        if let Some(max_tokens) = options.max_tokens.or(self.config.max_tokens) {
            model_options["num_predict"] = json!(max_tokens);
        }

        let mut request = json!({
            "model": model,
            "messages": wire_messages,
            "stream": stream,
            "options": model_options,
        });

        let tools = forced_tools(options);
        if !tools.is_empty() {
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
        }

        request
    }
}

/// The server has no tool_choice field; forcing a tool narrows the list to it
fn forced_tools(options: &ChatOptions) -> Vec<&ToolDefinition> {
    let offered = options.offered_tools();
    match &options.tool_choice {
        Some(ToolChoice::Tool(name)) => offered.iter().filter(|tool| &tool.name == name).collect(),
        _ => offered.iter().collect(),
    }
}

fn token_usage(body: &Value) -> TokenUsage {
    TokenUsage::new(
        token_count(&body["prompt_eval_count"]).unwrap_or(0),
        token_count(&body["eval_count"]).unwrap_or(0),
    )
}

/// Convert an `/api/chat` response body into a [`ChatResponse`]
pub fn parse_response(body: &Value) -> Result<ChatResponse> {
    let message = body.get("message").filter(|m| m.is_object()).ok_or_else(|| LlmError::InvalidResponse {
        backend: BackendType::Ollama,
        message: "response has no message".to_string(),
    })?;

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = &call["function"];
                    let name = function["name"].as_str()?;
                    // Ollama does not assign ids
                    let id = call["id"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
                    Some(ToolCall {
                        id,
                        name: name.to_string(),
                        arguments: tool_arguments_from_value(&function["arguments"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = if !tool_calls.is_empty() {
        FinishReason::ToolCalls
    } else {
        match body["done_reason"].as_str() {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    };

    Ok(ChatResponse {
        content: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        usage: token_usage(body),
        finish_reason,
    })
}

/// Decoder for newline-delimited JSON objects ending with `"done": true`
#[derive(Debug, Default)]
pub struct OllamaFrameDecoder;

impl FrameDecoder for OllamaFrameDecoder {
    fn decode_line(&mut self, line: &str) -> Option<Frame> {
        let json: Value = serde_json::from_str(line.trim()).ok()?;

        if let Some(error) = json["error"].as_str() {
            return Some(Frame::Failed(error.to_string()));
        }

        let content = json["message"]["content"].as_str().unwrap_or_default();
        if json["done"].as_bool() == Some(true) {
            return Some(Frame::Done { content: content.to_string(), usage: Some(token_usage(&json)) });
        }

        if content.is_empty() {
            None
        } else {
            Some(Frame::Delta(content.to_string()))
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn backend(&self) -> BackendType {
        BackendType::Ollama
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse> {
        let url = self.chat_url();
        let request = self.build_chat_request(messages, options, false);
        trace_request(BackendType::Ollama, &self.config, &url, &request);

        let body = execute_json(
            BackendType::Ollama,
            self.client.post(&url).json(&request),
            &url,
            self.config.timeout,
            ERROR_POINTER,
            self.config.verbose,
        )
        .await?;

        parse_response(&body)
    }

    async fn chat_stream(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatStream> {
        let url = self.chat_url();
        let request = self.build_chat_request(messages, options, true);
        trace_request(BackendType::Ollama, &self.config, &url, &request);

        let response = open_stream(
            BackendType::Ollama,
            self.client.post(&url).json(&request),
            &url,
            self.config.timeout,
            ERROR_POINTER,
        )
        .await?;

        Ok(decode_body(
            response.bytes_stream(),
            OllamaFrameDecoder,
            BackendType::Ollama,
            self.config.stream_idle_timeout,
            self.config.verbose,
        ))
    }

    async fn is_available(&self) -> bool {
        probe(self.client.get(self.tags_url()), self.config.probe_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stream::FrameReader;
    use pretty_assertions::assert_eq;

    fn client() -> OllamaClient {
        OllamaClient::new(ClientConfig::for_backend(BackendType::Ollama).with_base_url("http://localhost:11434/")).unwrap()
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: format!("{} tool", name),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_new_requires_base_url() {
        let err = OllamaClient::new(ClientConfig::for_backend(BackendType::Ollama)).err().unwrap();
        assert!(matches!(err, LlmError::Configuration(ref msg) if msg.contains("OLLAMA_BASE_URL")));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        assert_eq!(client().chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_request_shape() {
        let options = ChatOptions::default().with_temperature(0.2).with_max_tokens(256);
        let request = client().build_chat_request(&[ChatMessage::user("bought eggs")], &options, false);

        assert_eq!(request["model"], "llama3.2");
        assert_eq!(request["stream"], false);
        assert_eq!(request["options"]["num_predict"], 256);
        assert!((request["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(request.get("tools").is_none());
    }

    #[test]
    fn test_forced_tool_narrows_list() {
        let options = ChatOptions::default()
            .with_tools(vec![tool("add_items"), tool("waste_items")], ToolChoice::Tool("waste_items".into()));
        let request = client().build_chat_request(&[ChatMessage::user("hi")], &options, false);

        let tools = request["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["function"]["name"], "waste_items");
    }

    #[test]
    fn test_tool_choice_none_sends_no_tools() {
        let options = ChatOptions::default().with_tools(vec![tool("add_items")], ToolChoice::None);
        let request = client().build_chat_request(&[ChatMessage::user("hi")], &options, false);
        assert!(request.get("tools").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response = parse_response(&json!({
            "model": "llama3.2",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "add_items", "arguments": {"items": [{"name": "Eggs"}]}}}]
            },
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 40,
            "eval_count": 12
        }))
        .unwrap();

        let call = response.first_tool_call().unwrap();
        assert!(call.id.starts_with("call_"));
        assert_eq!(call.name, "add_items");
        assert_eq!(call.arguments["items"][0]["name"], "Eggs");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage, TokenUsage::new(40, 12));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let body = json!({
            "message": {
                "content": "",
                "tool_calls": [
                    {"function": {"name": "add_items", "arguments": {}}},
                    {"function": {"name": "add_items", "arguments": {}}}
                ]
            },
            "done": true
        });
        let calls = parse_response(&body).unwrap().tool_calls.unwrap();
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn test_parse_text_response() {
        let response = parse_response(&json!({
            "message": {"role": "assistant", "content": "You have 3 items."},
            "done": true,
            "done_reason": "length"
        }))
        .unwrap();
        assert_eq!(response.content, "You have 3 items.");
        assert!(response.tool_calls.is_none());
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.usage, TokenUsage::default());
    }

    #[test]
    fn test_parse_without_message_is_invalid() {
        assert!(matches!(parse_response(&json!({"done": true})), Err(LlmError::InvalidResponse { .. })));
    }

    const NDJSON_BODY: &str = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Crème \"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"fraîche\"},\"done\":false}\n",
        "\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"prompt_eval_count\":5,\"eval_count\":2}\n",
    );

    fn decode_in_pieces(piece_len: usize) -> Vec<Frame> {
        let mut reader = FrameReader::new(OllamaFrameDecoder);
        let mut frames = Vec::new();
        for piece in NDJSON_BODY.as_bytes().chunks(piece_len) {
            frames.extend(reader.push(piece));
        }
        frames.extend(reader.finish());
        frames
    }

    #[test]
    fn test_stream_decoding() {
        assert_eq!(decode_in_pieces(NDJSON_BODY.len()), vec![
            Frame::Delta("Crème ".into()),
            Frame::Delta("fraîche".into()),
            Frame::Done { content: String::new(), usage: Some(TokenUsage::new(5, 2)) },
        ]);
    }

    #[test]
    fn test_stream_decoding_is_split_invariant() {
        let whole = decode_in_pieces(NDJSON_BODY.len());
        for piece_len in [1, 2, 3, 9, 40] {
            assert_eq!(decode_in_pieces(piece_len), whole, "piece length {}", piece_len);
        }
    }

    #[test]
    fn test_stream_error_line() {
        let mut decoder = OllamaFrameDecoder;
        assert_eq!(
            decoder.decode_line(r#"{"error":"model 'llama9' not found"}"#),
            Some(Frame::Failed("model 'llama9' not found".into()))
        );
    }
}
