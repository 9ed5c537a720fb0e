use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ensure_dir, safe_truncate};

const MAX_CONSOLE_BODY_CHARS: usize = 5000;

/// Show only the first few characters of a credential
pub fn mask_secret(secret: &str) -> String {
    format!("{}***", secret.chars().take(6).collect::<String>())
}

fn describe_url(url: &str) -> Vec<(&'static str, String)> {
    let mut fields = vec![("URL", url.to_string())];
    if let Ok(parsed_url) = reqwest::Url::parse(url) {
        fields.push(("Host", parsed_url.host_str().unwrap_or("unknown").to_string()));
        fields.push(("Port", parsed_url.port().map(|p| p.to_string()).unwrap_or_else(||
            if parsed_url.scheme() == "https" { "443 (default)".to_string() } else { "80 (default)".to_string() }
        )));
        fields.push(("Scheme", parsed_url.scheme().to_string()));
    }
    fields
}

fn pretty_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| body.to_string())
}

fn print_truncated(text: &str) {
    if text.chars().count() > MAX_CONSOLE_BODY_CHARS {
        println!("{}", safe_truncate(text, MAX_CONSOLE_BODY_CHARS));
        println!("\n{}", format!("... (truncated, total {} bytes)", text.len()).bright_black());
    } else {
        println!("{}", text);
    }
}

/// Log HTTP request details for debugging (console output)
pub fn log_request(
    backend: &str,
    url: &str,
    body: &serde_json::Value,
    credential: Option<&str>,
    verbose: bool,
) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_cyan());
    println!("{}", format!("🔍 HTTP REQUEST DEBUG ({})", backend).bright_cyan().bold());
    println!("{}", "═".repeat(80).bright_cyan());

    for (name, value) in describe_url(url) {
        println!("{}: {}", name.bright_yellow(), value);
    }

    println!("\n{}", "Headers:".bright_yellow());
    println!("  Content-Type: application/json");
    if let Some(secret) = credential {
        println!("  Credential: {}", mask_secret(secret));
    }

    println!("\n{}", "Request Body:".bright_yellow());
    match serde_json::to_string_pretty(body) {
        Ok(json) => print_truncated(&json),
        Err(e) => println!("{}", format!("Error serializing request: {}", e).red()),
    }

    println!("{}", "═".repeat(80).bright_cyan());
    println!();
}

/// Log HTTP response details for debugging (console output)
pub fn log_response(status: reqwest::StatusCode, body: &str, verbose: bool) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_green());
    println!("{}", "📥 HTTP RESPONSE DEBUG".bright_green().bold());
    println!("{}", "═".repeat(80).bright_green());

    println!("{}: {} {}",
        "Status".bright_yellow(),
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );

    println!("\n{}", "Response Body:".bright_yellow());
    print_truncated(&pretty_body(body));

    println!("{}", "═".repeat(80).bright_green());
    println!();
}

/// Log streaming frame for debugging (console output)
pub fn log_stream_chunk(chunk_num: usize, data: &str, verbose: bool) {
    if !verbose {
        return;
    }

    println!("{}", format!("📦 Stream Chunk #{}: {}", chunk_num,
        if data.chars().count() > 200 {
            format!("{}... ({} bytes)", safe_truncate(data, 200), data.len())
        } else {
            data.to_string()
        }
    ).bright_black());
}

/// Log HTTP request to a file under `logs_dir` for persistent debugging.
///
/// Returns the path of the written file.
pub fn log_request_to_file(
    logs_dir: &Path,
    backend: &str,
    model: &str,
    url: &str,
    body: &serde_json::Value,
) -> Result<PathBuf> {
    let logs_dir = ensure_dir(logs_dir.to_path_buf())?;

    let now = chrono::Local::now();
    let model_name = model.replace(['/', ':'], "-");
    let filename = format!("req-{}-{}-{}.txt", now.format("%Y%m%d-%H%M%S%.3f"), backend, model_name);
    let file_path = logs_dir.join(&filename);

    let mut log_content = String::new();
    log_content.push_str(&format!("HTTP REQUEST LOG ({})\n", backend.to_uppercase()));
    log_content.push_str("================\n\n");
    log_content.push_str(&format!("Timestamp: {}\n", now.to_rfc3339()));
    log_content.push_str(&format!("Model: {}\n\n", model));

    for (name, value) in describe_url(url) {
        log_content.push_str(&format!("{}: {}\n", name, value));
    }

    log_content.push_str("\nRequest Body:\n");
    match serde_json::to_string_pretty(body) {
        Ok(json) => {
            log_content.push_str(&json);
            log_content.push('\n');
        }
        Err(e) => {
            log_content.push_str(&format!("Error serializing request: {}\n", e));
        }
    }

    fs::write(&file_path, log_content)
        .with_context(|| format!("Failed to write request log to {}", file_path.display()))?;

    log::debug!("request logged to {}", file_path.display());

    Ok(file_path)
}
