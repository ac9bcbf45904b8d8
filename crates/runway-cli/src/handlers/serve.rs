//! Serve command handler.

use anyhow::Result;
use runway_axum::{CorsConfig, GatewayConfig, start_server};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commands::ServeArgs;

impl From<ServeArgs> for GatewayConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            config_file: args.config,
            cors: if args.cors_origins.is_empty() {
                CorsConfig::AllowAll
            } else {
                CorsConfig::AllowOrigins(args.cors_origins)
            },
        }
    }
}

/// Run the gateway until Ctrl-C.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
            }
            shutdown.cancel();
        }
    });

    start_server(GatewayConfig::from(args), shutdown).await
}
