//! HTTP plumbing shared by the protocol adapters.

use serde_json::Value;
use std::time::Duration;

use crate::config::{BackendType, ClientConfig};
use crate::error::{LlmError, Result};

/// Map a reqwest failure onto the error taxonomy
pub(crate) fn transport_error(backend: BackendType, url: &str, err: &reqwest::Error) -> LlmError {
    if err.is_connect() && backend == BackendType::Ollama {
        return LlmError::ServiceUnreachable { url: url.to_string() };
    }
    LlmError::Transport { backend, message: err.to_string() }
}

/// Pull the backend's own error message out of an error body.
///
/// `pointer` is a JSON pointer such as `/error/message`.
pub(crate) fn error_message(body: &str, pointer: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn provider_error(
    backend: BackendType,
    status: reqwest::StatusCode,
    body: &str,
    pointer: &str,
) -> LlmError {
    let message = error_message(body, pointer)
        .unwrap_or_else(|| format!("{} request failed with status {}", backend, status.as_u16()));
    LlmError::Provider { backend, status: status.as_u16(), message }
}

/// Console dump and optional file log of an outgoing request
pub(crate) fn trace_request(backend: BackendType, config: &ClientConfig, url: &str, body: &Value) {
    log::debug!("{} POST {}", backend, url);
    larder_logging::log_request(backend.as_str(), url, body, config.api_key.as_deref(), config.verbose);

    if let Some(dir) = &config.log_dir {
        if let Err(e) = larder_logging::log_request_to_file(dir, backend.as_str(), &config.model, url, body) {
            log::warn!("could not write request log: {:#}", e);
        }
    }
}

/// Send a request and decode the JSON body, all under `timeout`.
pub(crate) async fn execute_json(
    backend: BackendType,
    request: reqwest::RequestBuilder,
    url: &str,
    timeout: Duration,
    error_pointer: &str,
    verbose: bool,
) -> Result<Value> {
    let call = async {
        let response = request.send().await.map_err(|e| transport_error(backend, url, &e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport_error(backend, url, &e))?;

        larder_logging::log_response(status, &text, verbose);

        if !status.is_success() {
            return Err(provider_error(backend, status, &text, error_pointer));
        }

        serde_json::from_str::<Value>(&text).map_err(|e| LlmError::InvalidResponse {
            backend,
            message: format!("body is not JSON: {}", e),
        })
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout { backend, millis: timeout.as_millis() as u64 }),
    }
}

/// Send a streaming request; only the wait for response headers is bounded
/// by `timeout`. The body is left unread for the caller.
pub(crate) async fn open_stream(
    backend: BackendType,
    request: reqwest::RequestBuilder,
    url: &str,
    timeout: Duration,
    error_pointer: &str,
) -> Result<reqwest::Response> {
    let response = match tokio::time::timeout(timeout, request.send()).await {
        Ok(sent) => sent.map_err(|e| transport_error(backend, url, &e))?,
        Err(_) => return Err(LlmError::Timeout { backend, millis: timeout.as_millis() as u64 }),
    };

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(provider_error(backend, status, &text, error_pointer));
    }

    Ok(response)
}

/// Liveness probe: true only for a success status within `timeout`
pub(crate) async fn probe(request: reqwest::RequestBuilder, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, request.send()).await {
        Ok(Ok(response)) => response.status().is_success(),
        Ok(Err(e)) => {
            log::debug!("availability probe failed: {}", e);
            false
        }
        Err(_) => {
            log::debug!("availability probe timed out after {:?}", timeout);
            false
        }
    }
}
