use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for larder
#[derive(Parser, Debug)]
#[command(name = "larder")]
#[command(about = "Larder - natural-language kitchen inventory over any LLM backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Force a backend: openai, anthropic or ollama (skips auto-detection)
    #[arg(long, global = true, env = "LLM_PROVIDER", value_name = "NAME")]
    pub provider: Option<String>,

    /// TOML file whose keys override the environment
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dump requests and responses, and log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn a message into an inventory intent and print it as JSON
    Parse {
        /// The household member's message
        message: String,

        /// JSON file with the current inventory (name, location, expiration_date)
        #[arg(long, value_name = "FILE")]
        inventory: Option<PathBuf>,

        /// Recently active item names
        #[arg(long = "recent", value_name = "ITEM")]
        recent: Vec<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Send one prompt to the selected backend
    Chat {
        prompt: String,

        /// Optional system message
        #[arg(long, value_name = "TEXT")]
        system: Option<String>,

        /// Print fragments as they arrive
        #[arg(long)]
        stream: bool,

        #[arg(long, value_name = "FLOAT")]
        temperature: Option<f32>,

        /// Override the backend's default model
        #[arg(long, value_name = "ID")]
        model: Option<String>,
    },

    /// Show which backend would be used and whether it answers
    Probe,
}
