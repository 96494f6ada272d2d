//! Haggle CLI binary

use anyhow::Context;
use clap::Parser;
use haggle::cli::{fetch_price_history, load_history, Cli, Commands, HaggleApp};
use haggle::HubConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = HubConfig::from(args);
            tracing::info!("Starting Haggle hub on {}", config.listen_addr);

            let app = HaggleApp::new(config)
                .await
                .context("failed to start hub")?;

            tracing::info!("Hub running. Press Ctrl+C to stop.");
            app.run().await;
        }

        Commands::History { store, limit } => {
            let messages = load_history(&store, limit)
                .await
                .with_context(|| format!("failed to read {}", store.display()))?;

            if messages.is_empty() {
                println!("No messages yet");
            }
            for stored in messages {
                let message = &stored.message;
                println!(
                    "#{} {} [{}] {}",
                    stored.id,
                    message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    message.sender_role,
                    message.content
                );
            }
        }

        Commands::PriceHistory { advisory_url } => {
            let prices = fetch_price_history(&advisory_url)
                .await
                .context("failed to fetch price history")?;

            println!("History:");
            for point in &prices.history {
                println!("  {}  {:.2}", point.day, point.price);
            }
            if !prices.predictions.is_empty() {
                println!("Forecast:");
                for point in &prices.predictions {
                    println!("  {}  {:.2}", point.day, point.price);
                }
            }
        }
    }

    Ok(())
}
