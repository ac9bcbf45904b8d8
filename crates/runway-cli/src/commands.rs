//! Subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use runway_axum::bootstrap::DEFAULT_PORT;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve(ServeArgs),

    /// Show the active runner and its health
    Status {
        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// List configured runners
    Runners {
        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// Send one chat message through the gateway
    Chat {
        #[command(flatten)]
        gateway: GatewayArgs,
        /// Model to request
        #[arg(short, long)]
        model: Option<String>,
        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,
        /// Message text
        #[arg(required = true)]
        message: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "RUNWAY_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// Port to bind
    #[arg(short, long, env = "RUNWAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Runner config file (defaults to <config dir>/runway/runners.json)
    #[arg(short, long, env = "RUNWAY_CONFIG")]
    pub config: Option<PathBuf>,
    /// Allowed CORS origins; all origins when empty
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Args)]
pub struct GatewayArgs {
    /// Gateway base URL
    #[arg(long, env = "RUNWAY_URL", default_value_t = format!("http://127.0.0.1:{DEFAULT_PORT}"))]
    pub url: String,
}
