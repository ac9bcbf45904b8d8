//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use runway_cli::{Cli, Commands, GatewayClient, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before clap reads env-backed arguments
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve(args) => handlers::serve::execute(args).await?,
        Commands::Status { gateway } => {
            handlers::status::status(&GatewayClient::new(&gateway.url)).await?;
        }
        Commands::Runners { gateway } => {
            handlers::status::runners(&GatewayClient::new(&gateway.url)).await?;
        }
        Commands::Chat {
            gateway,
            model,
            system,
            message,
        } => {
            handlers::chat::execute(&GatewayClient::new(&gateway.url), &message, model, system)
                .await?;
        }
    }
    Ok(())
}
