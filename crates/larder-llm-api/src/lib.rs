//! # larder-llm-api
//!
//! One chat interface over three LLM wire protocols:
//! - OpenAI chat completions (and compatible hosts)
//! - Anthropic messages
//! - Ollama (self-hosted)
//!
//! ## Features
//!
//! - **Unified Interface**: Single `LlmClient` trait for all providers
//! - **Tool Calling**: Tool definitions and calls translated per backend
//! - **Streaming Support**: Cancellable chunk streams with an idle timeout
//! - **Provider Selection**: Explicit choice or auto-detection from the environment
//!
//! ## Example
//!
//! ```rust,no_run
//! use larder_llm_api::{ChatMessage, ChatOptions, ProviderSelector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), larder_llm_api::LlmError> {
//!     let selector = ProviderSelector::from_env();
//!     let client = selector.get()?;
//!
//!     let messages = vec![
//!         ChatMessage::system("You are a kitchen assistant."),
//!         ChatMessage::user("What goes well with spinach?"),
//!     ];
//!
//!     let response = client.chat(&messages, &ChatOptions::default()).await?;
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;


// Re-export commonly used types
pub use client::{
    decode_tool_arguments,
    tool_arguments_from_value,
    ChatChunk,
    ChatMessage,
    ChatOptions,
    ChatResponse,
    ChatStream,
    FinishReason,
    LlmClient,
    Role,
    TokenUsage,
    ToolCall,
    ToolChoice,
    ToolDefinition,
};

pub use config::{
    get_default_url_for_backend,
    resolve_backend,
    BackendType,
    ClientConfig,
    ClientFactory,
    LlmSettings,
    ProviderSelector,
    ANTHROPIC_API_URL,
    OPENAI_API_URL,
};

pub use error::{LlmError, Result};
