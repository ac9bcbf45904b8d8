//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Default filter when `RUNWAY_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Route chat requests across local and remote inference backends.
#[derive(Debug, Parser)]
#[command(name = "runway")]
#[command(version)]
pub struct Cli {
    /// Log filter (tracing `EnvFilter` syntax)
    #[arg(long = "log", env = "RUNWAY_LOG", global = true, default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}
