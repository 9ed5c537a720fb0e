use anyhow::Result;
use clap::Parser;

use larder::commands::{run_chat, run_parse, run_probe, ChatArgs};
use larder::config::resolve_settings;
use larder::{Cli, Commands};
use larder_llm_api::ProviderSelector;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    larder_logging::init_logger(cli.verbose);

    let settings = resolve_settings(&cli)?;
    let selector = ProviderSelector::new(settings);

    match cli.command {
        Commands::Parse { message, inventory, recent, pretty } => {
            let mut stdout = std::io::stdout();
            run_parse(&selector, &message, inventory.as_deref(), recent, pretty, &mut stdout).await?;
            Ok(())
        }
        Commands::Chat { prompt, system, stream, temperature, model } => {
            run_chat(&selector, ChatArgs { prompt, system, stream, temperature, model }).await
        }
        Commands::Probe => run_probe(&selector).await,
    }
}
