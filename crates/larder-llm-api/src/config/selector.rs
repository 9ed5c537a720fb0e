use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::client::LlmClient;
use crate::config::{
    BackendType, ClientFactory, LlmSettings, ENV_ANTHROPIC_API_KEY, ENV_ANTHROPIC_AUTH_TOKEN,
    ENV_OLLAMA_BASE_URL, ENV_OPENAI_API_KEY, ENV_PROVIDER,
};
use crate::error::{LlmError, Result};

/// Auto-detection order when no backend is named explicitly
const DETECTION_ORDER: [BackendType; 3] = [BackendType::Ollama, BackendType::OpenAI, BackendType::Anthropic];

/// Decide which backend to use.
///
/// An explicit name (argument first, then `settings.provider`) wins and never
/// falls back: an unknown name or a missing credential for it is an error.
/// Otherwise the first present signal in Ollama, OpenAI, Anthropic order wins.
pub fn resolve_backend(settings: &LlmSettings, explicit: Option<&str>) -> Result<BackendType> {
    let named = explicit
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| settings.explicit_provider());

    if let Some(name) = named {
        let backend: BackendType = name.parse()?;
        // surfaces the missing-credential error for the named backend
        settings.client_config(backend)?;
        return Ok(backend);
    }

    DETECTION_ORDER
        .into_iter()
        .find(|backend| settings.has_signal(*backend))
        .ok_or_else(|| {
            LlmError::configuration(format!(
                "no LLM provider configured; set {}, {}, {}, {} or {}",
                ENV_PROVIDER,
                ENV_OLLAMA_BASE_URL,
                ENV_OPENAI_API_KEY,
                ENV_ANTHROPIC_API_KEY,
                ENV_ANTHROPIC_AUTH_TOKEN
            ))
        })
}

/// Where a selector's settings come from when it is reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsSource {
    Fixed,
    Environment,
}

struct SelectorState {
    settings: LlmSettings,
    client: Option<Arc<dyn LlmClient>>,
}

/// Single-slot cache of the authoritative client.
///
/// Holds at most one client. `get` resolves and constructs on first use and
/// then hands out the same instance until `reset` or `reconfigure` is called.
/// A client picked with an explicit name through `get_with` stays cached, so
/// later `get` calls keep using it instead of switching back to the
/// auto-detected backend.
pub struct ProviderSelector {
    source: SettingsSource,
    state: RwLock<SelectorState>,
}

impl ProviderSelector {
    pub fn new(settings: LlmSettings) -> Self {
        Self::with_source(settings, SettingsSource::Fixed)
    }

    /// Selector that re-reads the environment on every `reset`
    pub fn from_env() -> Self {
        Self::with_source(LlmSettings::from_env(), SettingsSource::Environment)
    }

    fn with_source(settings: LlmSettings, source: SettingsSource) -> Self {
        Self { source, state: RwLock::new(SelectorState { settings, client: None }) }
    }

    fn read(&self) -> RwLockReadGuard<'_, SelectorState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SelectorState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> LlmSettings {
        self.read().settings.clone()
    }

    /// Cached client, resolving the full priority chain on a miss
    pub fn get(&self) -> Result<Arc<dyn LlmClient>> {
        if let Some(client) = self.cached() {
            return Ok(client);
        }
        self.get_with(None)
    }

    /// Like [`get`](Self::get) but with a caller-named backend.
    ///
    /// A cached client of a different backend is replaced.
    pub fn get_with(&self, explicit: Option<&str>) -> Result<Arc<dyn LlmClient>> {
        let mut state = self.write();
        let backend = resolve_backend(&state.settings, explicit)?;

        if let Some(client) = state.client.as_ref() {
            if client.backend() == backend {
                return Ok(Arc::clone(client));
            }
            log::info!("replacing cached {} client with {}", client.backend(), backend);
        }

        let client = ClientFactory::from_settings(backend, &state.settings)?;
        state.client = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the cached client so the next `get` re-runs resolution.
    /// Selectors built with [`from_env`](Self::from_env) also reload the
    /// environment.
    pub fn reset(&self) {
        let mut state = self.write();
        if state.client.take().is_some() {
            log::debug!("provider cache cleared");
        }
        if self.source == SettingsSource::Environment {
            state.settings = LlmSettings::from_env();
        }
    }

    /// Replace the settings and drop the cached client
    pub fn reconfigure(&self, settings: LlmSettings) {
        let mut state = self.write();
        state.settings = settings;
        state.client = None;
        log::debug!("provider settings replaced");
    }

    pub fn cached(&self) -> Option<Arc<dyn LlmClient>> {
        self.read().client.clone()
    }
}
