#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use larder_llm_api::{
    BackendType, ChatMessage, ChatOptions, ChatResponse, ChatStream, FinishReason, LlmClient, LlmError,
    Result, TokenUsage, ToolCall,
};
use serde_json::Value;

/// What the fake backend does on the next `chat` call
#[derive(Debug, Clone)]
pub enum Script {
    Text(String),
    ToolCall { name: String, arguments: Value },
    NetworkError,
    Timeout,
}

/// In-memory `LlmClient` that replays a script and records what it was sent
pub struct ScriptedClient {
    script: Script,
    seen: Mutex<Vec<(Vec<ChatMessage>, ChatOptions)>>,
}

impl ScriptedClient {
    pub fn new(script: Script) -> Self {
        Self { script, seen: Mutex::new(Vec::new()) }
    }

    pub fn tool_call(name: &str, arguments: Value) -> Self {
        Self::new(Script::ToolCall { name: name.to_string(), arguments })
    }

    pub fn text(content: &str) -> Self {
        Self::new(Script::Text(content.to_string()))
    }

    /// Messages and options of every call so far
    pub fn calls(&self) -> Vec<(Vec<ChatMessage>, ChatOptions)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn backend(&self) -> BackendType {
        BackendType::Ollama
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse> {
        self.seen.lock().unwrap().push((messages.to_vec(), options.clone()));

        match &self.script {
            Script::Text(content) => Ok(ChatResponse {
                content: content.clone(),
                tool_calls: None,
                usage: TokenUsage::new(30, 8),
                finish_reason: FinishReason::Stop,
            }),
            Script::ToolCall { name, arguments } => Ok(ChatResponse {
                content: String::new(),
                tool_calls: Some(vec![ToolCall {
                    id: "call_1".to_string(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }]),
                usage: TokenUsage::new(60, 20),
                finish_reason: FinishReason::ToolCalls,
            }),
            Script::NetworkError => Err(LlmError::ServiceUnreachable { url: "http://127.0.0.1:11434/api/chat".to_string() }),
            Script::Timeout => Err(LlmError::Timeout { backend: BackendType::Ollama, millis: 60000 }),
        }
    }

    async fn chat_stream(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatStream> {
        Err(LlmError::configuration("streaming is not scripted"))
    }

    async fn is_available(&self) -> bool {
        true
    }
}
