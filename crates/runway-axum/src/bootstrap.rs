//! Gateway bootstrap - the composition root.
//!
//! The only place where configuration is resolved, the registry is built
//! and the HTTP server is bound.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use runway_core::config::ConfigurationResolver;
use runway_core::paths::config_file_path;
use runway_runtime::{InitReport, RunnerRegistry};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Default gateway port.
pub const DEFAULT_PORT: u16 = 8787;

/// CORS configuration for the gateway.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Runner config file. `None` uses the default location.
    pub config_file: Option<PathBuf>,
    pub cors: CorsConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            config_file: None,
            cors: CorsConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// The file the resolver reads: the explicit path, else the default.
    pub fn resolved_config_file(&self) -> Option<PathBuf> {
        if self.config_file.is_some() {
            return self.config_file.clone();
        }
        match config_file_path() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Cannot resolve default config file path");
                None
            }
        }
    }
}

/// Everything the handlers need.
#[derive(Debug)]
pub struct GatewayContext {
    pub registry: Arc<RunnerRegistry>,
    /// Answer with a canned reply instead of 503 when degraded.
    pub allow_fallback: bool,
}

impl GatewayContext {
    pub const fn new(registry: Arc<RunnerRegistry>, allow_fallback: bool) -> Self {
        Self {
            registry,
            allow_fallback,
        }
    }
}

/// Resolve configuration and bring the registry up.
pub async fn bootstrap(config: &GatewayConfig) -> (GatewayContext, InitReport) {
    let resolver = ConfigurationResolver::standard(config.resolved_config_file());
    let resolved = resolver.resolve();
    let allow_fallback = resolved.allow_fallback;

    let (registry, report) = RunnerRegistry::from_config(&resolved).await;
    for warning in &report.config_warnings {
        warn!(target: "runway.config", "{warning}");
    }
    info!(
        target: "runway.config",
        runners = resolved.runners.len(),
        default_runner = ?resolved.default_runner,
        allow_fallback,
        "Configuration resolved"
    );

    (GatewayContext::new(registry, allow_fallback), report)
}

/// Run the gateway until `shutdown` is cancelled, then stop the registry.
pub async fn start_server(config: GatewayConfig, shutdown: CancellationToken) -> Result<()> {
    let (ctx, _report) = bootstrap(&config).await;
    serve_gateway(ctx, &config, shutdown).await
}

/// Serve an already bootstrapped gateway.
///
/// The registry is shut down on every exit, including a failed bind.
pub async fn serve_gateway(
    ctx: GatewayContext,
    config: &GatewayConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let registry = Arc::clone(&ctx.registry);
    let app = crate::routes::create_router(Arc::new(ctx), &config.cors);

    let served = serve(app, config, shutdown).await;
    if let Err(e) = &served {
        error!(error = %e, "runway gateway stopped with an error");
    }
    registry.shutdown().await;
    info!("runway gateway shut down");
    served
}

async fn serve(app: Router, config: &GatewayConfig, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    info!("runway gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
