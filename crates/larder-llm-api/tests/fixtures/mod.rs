#![allow(dead_code)]

use std::time::Duration;

use larder_llm_api::{BackendType, ClientConfig};
use serde_json::{json, Value};
use wiremock::matchers::*;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test-api-key";

/// Mock server utilities for testing the chat clients
pub struct LlmMockServer {
    server: MockServer,
}

impl LlmMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Client configuration pointing `backend` at this server
    pub fn config(&self, backend: BackendType) -> ClientConfig {
        let base_url = match backend {
            BackendType::OpenAI => format!("{}/v1", self.uri()),
            _ => self.uri(),
        };
        let config = ClientConfig::for_backend(backend).with_base_url(base_url);
        match backend {
            BackendType::Ollama => config,
            _ => config.with_api_key(TEST_API_KEY),
        }
    }

    /// Mock successful OpenAI chat completion
    pub async fn mock_openai_success(&self, request_content: &str, response_content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [{ "role": "user", "content": request_content }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl_test123",
                "object": "chat.completion",
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": response_content },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock an OpenAI response carrying one tool call with string-encoded arguments
    pub async fn mock_openai_tool_call(&self, tool_name: &str, arguments: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_abc",
                            "type": "function",
                            "function": { "name": tool_name, "arguments": arguments }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": { "prompt_tokens": 50, "completion_tokens": 15, "total_tokens": 65 }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock successful Anthropic API response
    pub async fn mock_anthropic_success(&self, request_content: &str, response_content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", TEST_API_KEY))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-3-5-haiku-20241022",
                "messages": [{ "role": "user", "content": request_content }],
                "max_tokens": 4096
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_test123",
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "text", "text": response_content }],
                "model": "claude-3-5-haiku-20241022",
                "stop_reason": "end_turn",
                "stop_sequence": null,
                "usage": { "input_tokens": 10, "output_tokens": 20 }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_anthropic_tool_use(&self, tool_name: &str, input: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "tool_use", "id": "toolu_01", "name": tool_name, "input": input }],
                "stop_reason": "tool_use",
                "usage": { "input_tokens": 80, "output_tokens": 25 }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock successful Ollama chat response
    pub async fn mock_ollama_success(&self, request_content: &str, response_content: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.2",
                "stream": false,
                "messages": [{ "role": "user", "content": request_content }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": { "role": "assistant", "content": response_content },
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 10,
                "eval_count": 20
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_ollama_tool_call(&self, tool_name: &str, arguments: Value) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{ "function": { "name": tool_name, "arguments": arguments } }]
                },
                "done": true,
                "done_reason": "stop"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock the one-token Anthropic availability check
    pub async fn mock_anthropic_probe(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", TEST_API_KEY))
            .and(body_partial_json(json!({ "max_tokens": 1 })))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "type": "message",
                "content": [{ "type": "text", "text": "pong" }],
                "stop_reason": "max_tokens",
                "usage": { "input_tokens": 8, "output_tokens": 1 }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock an error status with a JSON body on `route`
    pub async fn mock_error(&self, route: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mock an error status whose body is not JSON
    pub async fn mock_plain_error(&self, route: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream unavailable"))
            .mount(&self.server)
            .await;
    }

    /// Mock a response that only arrives after `delay`
    pub async fn mock_slow(&self, route: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Mock a streamed body, delivered in one piece
    pub async fn mock_stream(&self, route: &str, content_type: &str, body: &str) {
        Mock::given(method("POST"))
            .and(path(route))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), content_type))
            .mount(&self.server)
            .await;
    }

    /// Mock a GET liveness endpoint
    pub async fn mock_get(&self, route: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "data": [] })))
            .mount(&self.server)
            .await;
    }

    /// Requests the server received so far
    pub async fn received_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}

/// Test data generators for client testing
pub mod test_data {
    use larder_llm_api::ToolDefinition;
    use serde_json::json;

    pub fn add_items_tool() -> ToolDefinition {
        ToolDefinition {
            name: "add_items".to_string(),
            description: "Add purchased groceries to the inventory".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": { "name": { "type": "string" }, "quantity": { "type": "number" } },
                            "required": ["name"]
                        }
                    }
                },
                "required": ["items"]
            }),
        }
    }

    /// Error scenarios for testing
    pub mod error_scenarios {
        use serde_json::json;

        pub fn authentication_error() -> serde_json::Value {
            json!({
                "type": "error",
                "error": { "type": "authentication_error", "message": "Invalid API key" }
            })
        }

        pub fn rate_limit_error() -> serde_json::Value {
            json!({
                "error": { "type": "rate_limit_error", "message": "Rate limit exceeded. Try again later." }
            })
        }

        pub fn ollama_model_missing() -> serde_json::Value {
            json!({ "error": "model 'llama3.2' not found, try pulling it first" })
        }
    }
}
