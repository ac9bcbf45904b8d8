//! Backend adapter implementations.
//!
//! [`build_adapter`] is the only place that turns a [`BackendDefinition`]
//! into a live adapter; it matches exhaustively on [`BackendKind`].

mod http;
mod local;
mod remote;

use std::sync::Arc;
use std::time::Duration;

use runway_core::config::{DEFAULT_LOCAL_BASE_PORT, DEFAULT_READY_TIMEOUT, ResolvedConfig};
use runway_core::domain::{BackendDefinition, BackendKind, LOCAL_HOST};
use runway_core::ports::{AdapterBuildError, BackendAdapter};

pub use http::{CHAT_COMPLETIONS_PATH, HttpBackend, normalize_base_url};
pub use local::LocalAdapter;
pub use remote::RemoteAdapter;

use crate::health::DEFAULT_PROBE_TIMEOUT;
use crate::process::{ProcessSupervisor, StopPolicy, allocate_port};

/// Default timeout for a forwarded chat request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Settings shared by every adapter a registry builds.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub ready_timeout: Duration,
    pub local_base_port: u16,
    pub stop_policy: StopPolicy,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            local_base_port: DEFAULT_LOCAL_BASE_PORT,
            stop_policy: StopPolicy::default(),
        }
    }
}

impl From<&ResolvedConfig> for AdapterOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            ready_timeout: config.ready_timeout,
            local_base_port: config.local_base_port,
            ..Self::default()
        }
    }
}

/// Build the adapter for `definition`.
///
/// `used_ports` are ports already claimed by other local runners.
pub fn build_adapter(
    definition: &BackendDefinition,
    options: &AdapterOptions,
    used_ports: &[u16],
) -> Result<Arc<dyn BackendAdapter>, AdapterBuildError> {
    let client = reqwest::Client::builder()
        .timeout(options.request_timeout)
        .build()
        .map_err(|e| AdapterBuildError::Client(e.to_string()))?;
    let name = definition.name().to_string();

    match definition.kind() {
        BackendKind::RemoteHttp => {
            let raw = definition
                .base_url()
                .ok_or_else(|| AdapterBuildError::MissingBaseUrl(name.clone()))?;
            let base_url =
                normalize_base_url(raw).map_err(|reason| AdapterBuildError::InvalidBaseUrl {
                    name: name.clone(),
                    url: raw.to_string(),
                    reason,
                })?;
            let http = HttpBackend::new(client, base_url, options.probe_timeout);
            Ok(Arc::new(RemoteAdapter::new(
                name,
                http,
                definition.default_model().map(str::to_string),
            )))
        }
        BackendKind::LocalProcess => {
            let launch = definition
                .launch()
                .ok_or_else(|| AdapterBuildError::MissingLaunchSpec(name.clone()))?;
            let port = match launch.port {
                Some(port) => port,
                None => allocate_port(options.local_base_port, used_ports).map_err(|e| {
                    AdapterBuildError::PortAllocation {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?,
            };
            let http = HttpBackend::new(
                client,
                format!("http://{LOCAL_HOST}:{port}"),
                options.probe_timeout,
            );
            let supervisor = ProcessSupervisor::with_policy(name.clone(), options.stop_policy);
            Ok(Arc::new(LocalAdapter::new(
                name,
                launch.clone(),
                port,
                definition.default_model().map(str::to_string),
                http,
                supervisor,
                options.ready_timeout,
            )))
        }
    }
}

/// Port of a local adapter, read back from its base URL.
pub fn adapter_port(adapter: &dyn BackendAdapter) -> Option<u16> {
    url::Url::parse(adapter.base_url()).ok()?.port()
}
