use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::LlmError;

pub mod factory;
pub mod selector;

pub use factory::ClientFactory;
pub use selector::{resolve_backend, ProviderSelector};

/// Backend family, one per wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    OpenAI,
    Anthropic,
    /// Self-hosted Ollama server
    Ollama,
}

impl BackendType {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "ollama" | "local" => Ok(Self::Ollama),
            other => Err(LlmError::configuration(format!(
                "unknown LLM provider '{}'; expected one of: openai, anthropic, ollama",
                other
            ))),
        }
    }
}

/// Default OpenAI API base URL
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic API base URL
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Anthropic requires `max_tokens` on every request
pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 4096;

pub const HOSTED_TIMEOUT: Duration = Duration::from_secs(30);
pub const SELF_HOSTED_TIMEOUT: Duration = Duration::from_secs(60);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Get the default URL for a given backend type
pub fn get_default_url_for_backend(backend: BackendType) -> Option<&'static str> {
    match backend {
        BackendType::OpenAI => Some(OPENAI_API_URL),
        BackendType::Anthropic => Some(ANTHROPIC_API_URL),
        BackendType::Ollama => None, // must be configured explicitly
    }
}

pub fn get_default_model_for_backend(backend: BackendType) -> &'static str {
    match backend {
        BackendType::OpenAI => DEFAULT_OPENAI_MODEL,
        BackendType::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        BackendType::Ollama => DEFAULT_OLLAMA_MODEL,
    }
}

/// Immutable construction-time configuration of one client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Bounds a whole `chat` round trip
    pub timeout: Duration,
    /// Bounds each read of a streamed body
    pub stream_idle_timeout: Duration,
    pub probe_timeout: Duration,
    pub max_tokens: Option<u32>,
    /// Dump requests and responses to the console
    pub verbose: bool,
    /// Write every request to a file in this directory
    pub log_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Defaults for `backend`; the base URL is empty for Ollama
    pub fn for_backend(backend: BackendType) -> Self {
        Self {
            api_key: None,
            base_url: get_default_url_for_backend(backend).unwrap_or_default().to_string(),
            model: get_default_model_for_backend(backend).to_string(),
            timeout: match backend {
                BackendType::Ollama => SELF_HOSTED_TIMEOUT,
                _ => HOSTED_TIMEOUT,
            },
            stream_idle_timeout: STREAM_IDLE_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
            max_tokens: None,
            verbose: false,
            log_dir: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    /// Base URL without trailing slash, or a configuration error naming
    /// `env_name` when it is blank or not an absolute URL
    pub(crate) fn require_base_url(&self, env_name: &str) -> Result<String, LlmError> {
        let url = self.base_url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(LlmError::configuration(format!("{} is required", env_name)));
        }
        reqwest::Url::parse(url).map_err(|e| {
            LlmError::configuration(format!("{} is not a valid URL ({}): {}", env_name, url, e))
        })?;
        Ok(url.to_string())
    }

    /// Credential, or a configuration error naming `env_name`
    pub(crate) fn require_api_key(&self, env_name: &str) -> Result<String, LlmError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(LlmError::configuration(format!("{} is required", env_name))),
        }
    }
}

pub const ENV_PROVIDER: &str = "LLM_PROVIDER";
pub const ENV_OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_ANTHROPIC_AUTH_TOKEN: &str = "ANTHROPIC_AUTH_TOKEN";

/// Every selection signal and per-backend override.
///
/// Loaded from the environment with [`LlmSettings::from_env`] or deserialised
/// from a TOML/JSON document; [`LlmSettings::merge`] layers one over another.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Explicit backend name; disables auto-detection
    pub provider: Option<String>,
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub anthropic_model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
    pub max_tokens: Option<u32>,
    pub verbose: bool,
    pub log_dir: Option<PathBuf>,
}

/// Read an environment variable, treating blank values as unset
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = non_empty_var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}={}: not a valid number", name, raw);
            None
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl LlmSettings {
    pub fn from_env() -> Self {
        Self {
            provider: non_empty_var(ENV_PROVIDER),
            ollama_base_url: non_empty_var(ENV_OLLAMA_BASE_URL),
            ollama_model: non_empty_var("OLLAMA_MODEL"),
            openai_api_key: non_empty_var(ENV_OPENAI_API_KEY),
            openai_base_url: non_empty_var("OPENAI_BASE_URL"),
            openai_model: non_empty_var("OPENAI_MODEL"),
            anthropic_api_key: non_empty_var(ENV_ANTHROPIC_API_KEY)
                .or_else(|| non_empty_var(ENV_ANTHROPIC_AUTH_TOKEN)),
            anthropic_base_url: non_empty_var("ANTHROPIC_BASE_URL"),
            anthropic_model: non_empty_var("ANTHROPIC_MODEL"),
            timeout_secs: parsed_var("LLM_TIMEOUT_SECS"),
            stream_idle_timeout_secs: parsed_var("LLM_STREAM_IDLE_TIMEOUT_SECS"),
            max_tokens: parsed_var("LLM_MAX_TOKENS"),
            verbose: false,
            log_dir: non_empty_var("LARDER_LOG_DIR").map(PathBuf::from),
        }
    }

    /// Values present in `overrides` win
    pub fn merge(self, overrides: LlmSettings) -> Self {
        Self {
            provider: overrides.provider.or(self.provider),
            ollama_base_url: overrides.ollama_base_url.or(self.ollama_base_url),
            ollama_model: overrides.ollama_model.or(self.ollama_model),
            openai_api_key: overrides.openai_api_key.or(self.openai_api_key),
            openai_base_url: overrides.openai_base_url.or(self.openai_base_url),
            openai_model: overrides.openai_model.or(self.openai_model),
            anthropic_api_key: overrides.anthropic_api_key.or(self.anthropic_api_key),
            anthropic_base_url: overrides.anthropic_base_url.or(self.anthropic_base_url),
            anthropic_model: overrides.anthropic_model.or(self.anthropic_model),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            stream_idle_timeout_secs: overrides.stream_idle_timeout_secs.or(self.stream_idle_timeout_secs),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            verbose: overrides.verbose || self.verbose,
            log_dir: overrides.log_dir.or(self.log_dir),
        }
    }

    pub fn explicit_provider(&self) -> Option<&str> {
        non_empty(&self.provider)
    }

    /// Whether the signal that auto-selects `backend` is present
    pub fn has_signal(&self, backend: BackendType) -> bool {
        match backend {
            BackendType::Ollama => non_empty(&self.ollama_base_url).is_some(),
            BackendType::OpenAI => non_empty(&self.openai_api_key).is_some(),
            BackendType::Anthropic => non_empty(&self.anthropic_api_key).is_some(),
        }
    }

    /// Build the client configuration for `backend`, failing when its
    /// credential (or base URL, for Ollama) is missing.
    pub fn client_config(&self, backend: BackendType) -> Result<ClientConfig, LlmError> {
        let mut config = ClientConfig::for_backend(backend);

        match backend {
            BackendType::OpenAI => {
                let key = non_empty(&self.openai_api_key).ok_or_else(|| {
                    LlmError::configuration(format!("{} is required for the openai provider", ENV_OPENAI_API_KEY))
                })?;
                config.api_key = Some(key.to_string());
                if let Some(url) = non_empty(&self.openai_base_url) {
                    config.base_url = url.to_string();
                }
                if let Some(model) = non_empty(&self.openai_model) {
                    config.model = model.to_string();
                }
            }
            BackendType::Anthropic => {
                let key = non_empty(&self.anthropic_api_key).ok_or_else(|| {
                    LlmError::configuration(format!("{} is required for the anthropic provider", ENV_ANTHROPIC_API_KEY))
                })?;
                config.api_key = Some(key.to_string());
                if let Some(url) = non_empty(&self.anthropic_base_url) {
                    config.base_url = url.to_string();
                }
                if let Some(model) = non_empty(&self.anthropic_model) {
                    config.model = model.to_string();
                }
            }
            BackendType::Ollama => {
                let url = non_empty(&self.ollama_base_url).ok_or_else(|| {
                    LlmError::configuration(format!("{} is required for the ollama provider", ENV_OLLAMA_BASE_URL))
                })?;
                config.base_url = url.to_string();
                if let Some(model) = non_empty(&self.ollama_model) {
                    config.model = model.to_string();
                }
            }
        }

        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.stream_idle_timeout_secs {
            config.stream_idle_timeout = Duration::from_secs(secs);
        }
        config.max_tokens = self.max_tokens;
        config.verbose = self.verbose;
        config.log_dir = self.log_dir.clone();

        Ok(config)
    }
}
