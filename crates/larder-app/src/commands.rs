use anyhow::{Context, Result};
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;
use std::path::Path;

use larder_intent::{summarize_inventory, HouseholdContext, IntentExtractor, InventoryIntent};
use larder_llm_api::{ChatMessage, ChatOptions, ProviderSelector, TokenUsage};

use crate::config::load_inventory;

/// Run the intent engine on `message` and write the intent to `out` as JSON
pub async fn run_parse<W: Write>(
    selector: &ProviderSelector,
    message: &str,
    inventory: Option<&Path>,
    recent: Vec<String>,
    pretty: bool,
    out: &mut W,
) -> Result<InventoryIntent> {
    let client = selector.get()?;

    let inventory_summary = match inventory {
        Some(path) => {
            let items = load_inventory(path)?;
            let today = chrono::Local::now().date_naive();
            Some(summarize_inventory(&items, today))
        }
        None => None,
    };

    let context = HouseholdContext { inventory_summary, recent_items: recent };
    let intent = IntentExtractor::new(client).process(message, &context).await;

    let json = if pretty {
        serde_json::to_string_pretty(&intent)
    } else {
        serde_json::to_string(&intent)
    }
    .context("failed to serialize intent")?;
    writeln!(out, "{}", json).context("failed to write intent")?;
    Ok(intent)
}

pub struct ChatArgs {
    pub prompt: String,
    pub system: Option<String>,
    pub stream: bool,
    pub temperature: Option<f32>,
    pub model: Option<String>,
}

fn print_usage(usage: &TokenUsage) {
    eprintln!(
        "{}",
        format!(
            "tokens: {} in, {} out, {} total",
            usage.input_tokens, usage.output_tokens, usage.total_tokens
        )
        .bright_black()
    );
}

/// One chat call, or a stream printed as it arrives
pub async fn run_chat(selector: &ProviderSelector, args: ChatArgs) -> Result<()> {
    let client = selector.get()?;

    let mut messages = Vec::new();
    if let Some(system) = args.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(args.prompt));

    let mut options = ChatOptions::default();
    if let Some(temperature) = args.temperature {
        options = options.with_temperature(temperature);
    }
    if let Some(model) = args.model {
        options = options.with_model(model);
    }

    if !args.stream {
        let response = client.chat(&messages, &options).await?;
        println!("{}", response.content);
        print_usage(&response.usage);
        return Ok(());
    }

    let mut stream = client.chat_stream(&messages, &options).await?;

    // Ctrl-C stops reading instead of killing the process mid-line
    let token = stream.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut usage = None;
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        print!("{}", chunk.content);
        stdout.flush().context("failed to write to stdout")?;
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
    }
    println!();
    interrupt.abort();

    if stream.is_cancelled() {
        eprintln!("{}", "(cancelled)".yellow());
    }
    if let Some(usage) = usage {
        print_usage(&usage);
    }
    Ok(())
}

/// Print the resolved backend and whether it responds
pub async fn run_probe(selector: &ProviderSelector) -> Result<()> {
    let client = selector.get()?;
    let available = client.is_available().await;

    println!("{} {}", "backend:".bold(), client.backend());
    println!("{} {}", "model:".bold(), client.default_model());
    println!(
        "{} {}",
        "available:".bold(),
        if available { "yes".green() } else { "no".red() }
    );
    Ok(())
}
