//! The runner registry: which backend serves chat requests right now.
//!
//! # Locking
//!
//! - `state` (std `RwLock`) holds the adapters and the active runner's
//!   name. It is never held across an `.await`.
//! - `selection` (tokio `Mutex`) serializes everything that may change the
//!   active runner: selection, switch, load/unload, register/remove and
//!   health ticks. `chat` never takes it.
//!
//! `chat` clones the active adapter's `Arc` and calls it with no lock held,
//! so a failover during a request leaves that request on the old adapter.

mod health_loop;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use indexmap::IndexMap;
use runway_core::config::{ConfigurationResolver, DEFAULT_HEALTH_INTERVAL, ResolvedConfig};
use runway_core::domain::{
    BackendDefinition, BackendKind, ChatRequest, ChatResponse, RegistryEvent, RegistryStatus,
    RunnerDescriptor,
};
use runway_core::ports::{BackendAdapter, OutputLine, ProcessState, RegistryError};
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{AdapterOptions, adapter_port, build_adapter, normalize_base_url};
use crate::discovery;

/// Settings for a [`RunnerRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub default_runner: Option<String>,
    pub health_interval: Duration,
    pub adapter: AdapterOptions,
    pub auto_discover_local: bool,
    pub models_dir: Option<PathBuf>,
    pub llama_server_path: Option<PathBuf>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            default_runner: None,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            adapter: AdapterOptions::default(),
            auto_discover_local: false,
            models_dir: None,
            llama_server_path: None,
        }
    }
}

impl From<&ResolvedConfig> for RegistryOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            default_runner: config.default_runner.clone(),
            health_interval: config.health_interval,
            adapter: AdapterOptions::from(config),
            auto_discover_local: config.auto_discover_local,
            models_dir: config.models_dir.clone(),
            llama_server_path: config.llama_server_path.clone(),
        }
    }
}

/// Outcome of [`RunnerRegistry::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Configuration sources that were skipped.
    pub config_warnings: Vec<String>,
    /// Runners whose adapter could not be built: `(name, reason)`.
    pub dropped: Vec<(String, String)>,
    /// Local runners that failed to start: `(name, reason)`.
    pub failed_starts: Vec<(String, String)>,
    /// Runners registered by local model discovery.
    pub discovered: Vec<String>,
    pub active: Option<String>,
}

impl InitReport {
    pub const fn is_degraded(&self) -> bool {
        self.active.is_none()
    }
}

#[derive(Default)]
struct RegistryState {
    adapters: IndexMap<String, Arc<dyn BackendAdapter>>,
    /// Name of the active adapter; always a key of `adapters` when set.
    active: Option<String>,
    healthy: bool,
    last_health_check: Option<DateTime<Utc>>,
}

/// Single source of truth for the active runner.
///
/// Built by the composition root and shared as `Arc<RunnerRegistry>`.
pub struct RunnerRegistry {
    state: RwLock<RegistryState>,
    selection: Mutex<()>,
    options: RegistryOptions,
    events: broadcast::Sender<RegistryEvent>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    health_task: StdMutex<Option<JoinHandle<()>>>,
    exit_watchers: StdMutex<HashMap<String, JoinHandle<()>>>,
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("RunnerRegistry")
            .field("runners", &state.adapters.keys().collect::<Vec<_>>())
            .field("active", &state.active)
            .finish_non_exhaustive()
    }
}

impl RunnerRegistry {
    /// An empty registry. No health loop runs until [`Self::start_health_loop`].
    pub fn new(options: RegistryOptions) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: RwLock::new(RegistryState::default()),
            selection: Mutex::new(()),
            options,
            events,
            wake: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            health_task: StdMutex::new(None),
            exit_watchers: StdMutex::new(HashMap::new()),
        }
    }

    /// Resolve `resolver` and bring the registry up.
    ///
    /// Never fails: zero usable runners is a degraded registry, reported in
    /// the [`InitReport`].
    pub async fn initialize(resolver: &ConfigurationResolver) -> (Arc<Self>, InitReport) {
        Self::from_config(&resolver.resolve()).await
    }

    /// Build adapters for `config`, start local runners, select a default
    /// and start the health loop.
    pub async fn from_config(config: &ResolvedConfig) -> (Arc<Self>, InitReport) {
        let registry = Arc::new(Self::new(RegistryOptions::from(config)));
        let mut report = InitReport {
            config_warnings: config.warnings.clone(),
            ..InitReport::default()
        };

        {
            let _selection = registry.selection.lock().await;
            for definition in &config.runners {
                if let Err(e) = registry.insert(definition) {
                    warn!(runner = %definition.name(), error = %e, "Dropping runner");
                    report
                        .dropped
                        .push((definition.name().to_string(), e.to_string()));
                }
            }
        }

        let locals: Vec<Arc<dyn BackendAdapter>> = registry
            .adapters()
            .into_iter()
            .filter(|a| a.kind() == BackendKind::LocalProcess)
            .collect();
        let results = join_all(locals.iter().map(|adapter| adapter.start())).await;
        for (adapter, result) in locals.iter().zip(results) {
            if let Err(e) = result {
                warn!(runner = %adapter.name(), error = %e, "Local runner failed to start");
                report
                    .failed_starts
                    .push((adapter.name().to_string(), e.to_string()));
            }
        }

        {
            let _selection = registry.selection.lock().await;
            if registry.select_default_locked().await.is_err()
                && registry.options.auto_discover_local
            {
                report.discovered = registry.discover_local_locked().await;
            }
        }

        report.active = registry.read().active.clone();
        match &report.active {
            Some(name) => info!(runner = %name, "Registry initialized"),
            None => warn!("Registry initialized without a healthy runner (degraded)"),
        }

        registry.start_health_loop();
        (registry, report)
    }

    /// Spawn the background health loop. A second call is a no-op.
    pub fn start_health_loop(self: &Arc<Self>) {
        let mut slot = self
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() || self.cancel.is_cancelled() {
            return;
        }
        *slot = Some(health_loop::spawn(
            Arc::downgrade(self),
            self.options.health_interval,
            Arc::clone(&self.wake),
            self.cancel.clone(),
        ));
    }

    pub const fn options(&self) -> &RegistryOptions {
        &self.options
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RegistryEvent) {
        debug!(event = ?event, "Registry event");
        let _ = self.events.send(event);
    }

    fn adapters(&self) -> Vec<Arc<dyn BackendAdapter>> {
        self.read().adapters.values().cloned().collect()
    }

    fn adapter(&self, name: &str) -> Option<Arc<dyn BackendAdapter>> {
        self.read().adapters.get(name).cloned()
    }

    fn active_adapter(&self) -> Option<Arc<dyn BackendAdapter>> {
        let state = self.read();
        state
            .active
            .as_ref()
            .and_then(|name| state.adapters.get(name))
            .cloned()
    }

    /// Build and insert an adapter. Caller must hold `selection`.
    ///
    /// Returns the adapter it replaced, which the caller must shut down.
    fn insert(
        &self,
        definition: &BackendDefinition,
    ) -> Result<Option<Arc<dyn BackendAdapter>>, RegistryError> {
        let used_ports: Vec<u16> = self
            .read()
            .adapters
            .values()
            .filter(|a| a.kind() == BackendKind::LocalProcess && a.name() != definition.name())
            .filter_map(|a| adapter_port(a.as_ref()))
            .collect();
        let adapter = build_adapter(definition, &self.options.adapter, &used_ports)?;
        Ok(self.insert_adapter(adapter))
    }

    fn insert_adapter(&self, adapter: Arc<dyn BackendAdapter>) -> Option<Arc<dyn BackendAdapter>> {
        let name = adapter.name().to_string();
        let kind = adapter.kind();

        self.watch_exit(&name, adapter.as_ref());
        let replaced = {
            let mut state = self.write();
            let replaced = state.adapters.insert(name.clone(), adapter);
            if replaced.is_some() && state.active.as_deref() == Some(name.as_str()) {
                state.active = None;
                state.healthy = false;
            }
            replaced
        };

        info!(runner = %name, kind = %kind, "Registered runner");
        self.emit(RegistryEvent::Registered { name });
        replaced
    }

    /// Wake the health loop whenever a local runner's process exits.
    fn watch_exit(&self, name: &str, adapter: &dyn BackendAdapter) {
        let mut watchers = self
            .exit_watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = watchers.remove(name) {
            old.abort();
        }
        let Some(mut state) = adapter.process_state() else {
            return;
        };

        let wake = Arc::clone(&self.wake);
        let cancel = self.cancel.clone();
        let runner = name.to_string();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    changed = state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = *state.borrow_and_update();
                        if let ProcessState::Exited { code } = current {
                            debug!(runner = %runner, code = ?code, "Process exit observed");
                            wake.notify_one();
                        }
                    }
                }
            }
        });
        watchers.insert(name.to_string(), handle);
    }

    fn unwatch_exit(&self, name: &str) {
        if let Some(handle) = self
            .exit_watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
        {
            handle.abort();
        }
    }

    /// Make `name` active after a passing probe. Caller must hold `selection`.
    ///
    /// `failover` marks automatic replacement of a previously active runner.
    fn activate(&self, name: &str, failover: bool) {
        let previous = {
            let mut state = self.write();
            if !state.adapters.contains_key(name) {
                return;
            }
            let previous = state.active.replace(name.to_string());
            state.healthy = true;
            state.last_health_check = Some(Utc::now());
            previous
        };

        match previous {
            Some(prev) if prev == name => {}
            Some(prev) if failover => {
                warn!(from = %prev, to = %name, "Failed over to another runner");
                self.emit(RegistryEvent::Failover {
                    from: prev,
                    to: name.to_string(),
                });
            }
            _ => {
                info!(runner = %name, "Runner activated");
                self.emit(RegistryEvent::Activated {
                    name: name.to_string(),
                });
            }
        }
    }

    /// Select the preferred default, or the first healthy runner.
    pub async fn select_default(&self) -> Result<String, RegistryError> {
        let _selection = self.selection.lock().await;
        self.select_default_locked().await
    }

    async fn select_default_locked(&self) -> Result<String, RegistryError> {
        let (candidates, previous) = {
            let state = self.read();
            let mut candidates: Vec<Arc<dyn BackendAdapter>> =
                Vec::with_capacity(state.adapters.len());
            if let Some(default) = self
                .options
                .default_runner
                .as_ref()
                .and_then(|name| state.adapters.get(name))
            {
                candidates.push(Arc::clone(default));
            }
            for adapter in state.adapters.values() {
                if !candidates.iter().any(|c| c.name() == adapter.name()) {
                    candidates.push(Arc::clone(adapter));
                }
            }
            (candidates, state.active.clone())
        };

        for adapter in candidates {
            if adapter.health().await {
                self.activate(adapter.name(), previous.is_some());
                return Ok(adapter.name().to_string());
            }
            debug!(runner = %adapter.name(), "Runner failed probe during selection");
        }

        {
            let mut state = self.write();
            state.active = None;
            state.healthy = false;
            state.last_health_check = Some(Utc::now());
        }
        if previous.is_some() {
            warn!(previous = ?previous, "No healthy runner, registry degraded");
            self.emit(RegistryEvent::Degraded { previous });
        }
        Err(RegistryError::NoBackendAvailable)
    }

    /// Start discovered local models in order until one becomes healthy.
    async fn discover_local_locked(&self) -> Vec<String> {
        let Some(server) = self.options.llama_server_path.clone() else {
            warn!("Local discovery enabled but no llama server path configured");
            return Vec::new();
        };
        let models_dir = match self.options.models_dir.clone() {
            Some(dir) => dir,
            None => match runway_core::paths::default_models_dir() {
                Ok(dir) => dir,
                Err(e) => {
                    warn!(error = %e, "Cannot resolve models directory");
                    return Vec::new();
                }
            },
        };

        for definition in discovery::discovered_definitions(&models_dir, &server) {
            let name = definition.name().to_string();
            if self.read().adapters.contains_key(&name) {
                continue;
            }
            let adapter = match self.insert(&definition) {
                Ok(_) => self.adapter(&name),
                Err(e) => {
                    warn!(runner = %name, error = %e, "Skipping discovered model");
                    continue;
                }
            };
            let Some(adapter) = adapter else { continue };

            match adapter.start().await {
                Ok(()) if adapter.health().await => {
                    self.activate(&name, false);
                    return vec![name];
                }
                Ok(()) => warn!(runner = %name, "Discovered runner started but failed probe"),
                Err(e) => warn!(runner = %name, error = %e, "Discovered runner failed to start"),
            }
            self.remove_locked(&name).await;
        }
        Vec::new()
    }

    /// Forward `request` to the active runner.
    ///
    /// Never retries and never fails over mid-request.
    pub async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, RegistryError> {
        let adapter = self
            .active_adapter()
            .ok_or(RegistryError::NoBackendAvailable)?;
        Ok(adapter.chat(request, cancel).await?)
    }

    /// Make `name` active if it passes a probe.
    ///
    /// On failure the active runner is unchanged. A local runner whose
    /// process is not running is started first.
    pub async fn switch_to(&self, name: &str) -> Result<(), RegistryError> {
        let _selection = self.selection.lock().await;
        self.switch_to_locked(name).await
    }

    /// Make `name` active and load `model` into it, under one selection hold.
    ///
    /// A failover cannot land between the switch and the load. If the load
    /// fails, `name` stays active with whatever the adapter kept.
    pub async fn switch_to_with_model(
        &self,
        name: &str,
        model: Option<&str>,
    ) -> Result<(), RegistryError> {
        let _selection = self.selection.lock().await;
        self.switch_to_locked(name).await?;
        if let Some(model) = model {
            self.load_model_locked(model).await?;
        }
        Ok(())
    }

    async fn switch_to_locked(&self, name: &str) -> Result<(), RegistryError> {
        let adapter = self
            .adapter(name)
            .ok_or_else(|| RegistryError::UnknownRunner(name.to_string()))?;

        if let Some(state) = adapter.process_state() {
            if !state.borrow().is_running() {
                adapter.start().await?;
            }
        }

        if !adapter.health().await {
            warn!(runner = %name, "Switch rejected, runner failed probe");
            return Err(RegistryError::Unhealthy(name.to_string()));
        }
        self.activate(name, false);
        Ok(())
    }

    /// Switch to the runner at `base_url`, registering it if needed.
    ///
    /// A runner registered here whose switch fails is removed again. On
    /// success a given `model` becomes the runner's current model.
    pub async fn switch_to_endpoint(
        &self,
        kind: BackendKind,
        base_url: &str,
        model: Option<&str>,
    ) -> Result<String, RegistryError> {
        let normalized = normalize_base_url(base_url).map_err(|reason| {
            runway_core::ports::AdapterBuildError::InvalidBaseUrl {
                name: endpoint_name(kind, base_url),
                url: base_url.to_string(),
                reason,
            }
        })?;

        let _selection = self.selection.lock().await;
        let existing = self
            .read()
            .adapters
            .values()
            .find(|a| a.kind() == kind && a.base_url() == normalized)
            .map(|a| a.name().to_string());

        let (name, added) = match existing {
            Some(name) => (name, false),
            None => match kind {
                BackendKind::RemoteHttp => {
                    let name = endpoint_name(kind, &normalized);
                    let mut definition = BackendDefinition::remote(&name, &normalized);
                    if let Some(model) = model {
                        definition = definition.with_default_model(model);
                    }
                    if let Some(old) = self.insert(&definition)? {
                        old.shutdown().await;
                    }
                    (name, true)
                }
                // A local runner needs a launch spec, so it must be configured
                BackendKind::LocalProcess => {
                    return Err(RegistryError::UnknownRunner(normalized));
                }
            },
        };

        if let Err(e) = self.switch_to_locked(&name).await {
            if added {
                self.remove_locked(&name).await;
            }
            return Err(e);
        }

        if let Some(model) = model {
            let adapter = self
                .adapter(&name)
                .ok_or_else(|| RegistryError::UnknownRunner(name.clone()))?;
            if adapter.current_model().as_deref() != Some(model) {
                adapter.load_model(model).await?;
            }
        }
        Ok(name)
    }

    /// Make `model` the active runner's current model.
    ///
    /// Local runners restart their process and wait for readiness.
    pub async fn load_model(&self, model: &str) -> Result<(), RegistryError> {
        let _selection = self.selection.lock().await;
        self.load_model_locked(model).await
    }

    async fn load_model_locked(&self, model: &str) -> Result<(), RegistryError> {
        let adapter = self
            .active_adapter()
            .ok_or(RegistryError::NoBackendAvailable)?;
        info!(runner = %adapter.name(), model = %model, "Loading model");
        adapter.load_model(model).await?;

        {
            let mut state = self.write();
            state.healthy = true;
            state.last_health_check = Some(Utc::now());
        }
        Ok(())
    }

    /// Drop the active runner's model. Returns `false` if none was loaded.
    pub async fn unload_model(&self) -> Result<bool, RegistryError> {
        let _selection = self.selection.lock().await;
        let adapter = self
            .active_adapter()
            .ok_or(RegistryError::NoBackendAvailable)?;
        info!(runner = %adapter.name(), "Unloading model");
        Ok(adapter.unload().await?)
    }

    /// Read-only snapshot.
    pub fn status(&self) -> RegistryStatus {
        let state = self.read();
        let active = state
            .active
            .as_ref()
            .and_then(|name| state.adapters.get(name));
        RegistryStatus {
            active: active.map(|a| a.name().to_string()),
            base_url: active.map(|a| a.base_url().to_string()),
            current_model: active.and_then(|a| a.current_model()),
            healthy: active.is_some() && state.healthy,
            runners: state.adapters.keys().cloned().collect(),
            last_health_check: state.last_health_check,
        }
    }

    /// Descriptors of every configured runner, in registration order.
    pub fn runners(&self) -> Vec<RunnerDescriptor> {
        let state = self.read();
        state
            .adapters
            .values()
            .map(|a| RunnerDescriptor {
                name: a.name().to_string(),
                kind: a.kind(),
                base_url: a.base_url().to_string(),
                current_model: a.current_model(),
                active: state.active.as_deref() == Some(a.name()),
            })
            .collect()
    }

    /// Add or replace a runner. A replaced local runner is stopped.
    pub async fn register(&self, definition: &BackendDefinition) -> Result<(), RegistryError> {
        let _selection = self.selection.lock().await;
        if let Some(old) = self.insert(definition)? {
            debug!(runner = %definition.name(), "Replaced existing runner");
            old.shutdown().await;
        }
        if self.read().active.is_none() {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Add or replace a runner with an already built adapter.
    pub async fn register_adapter(&self, adapter: Arc<dyn BackendAdapter>) {
        let _selection = self.selection.lock().await;
        if let Some(old) = self.insert_adapter(adapter) {
            old.shutdown().await;
        }
        if self.read().active.is_none() {
            self.wake.notify_one();
        }
    }

    /// Remove a runner, stopping its process. Removing the active runner
    /// leaves the registry without one until the next selection.
    pub async fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let _selection = self.selection.lock().await;
        if self.remove_locked(name).await {
            Ok(())
        } else {
            Err(RegistryError::UnknownRunner(name.to_string()))
        }
    }

    async fn remove_locked(&self, name: &str) -> bool {
        let (removed, was_active) = {
            let mut state = self.write();
            let removed = state.adapters.shift_remove(name);
            let was_active = removed.is_some() && state.active.as_deref() == Some(name);
            if was_active {
                state.active = None;
                state.healthy = false;
            }
            (removed, was_active)
        };
        let Some(adapter) = removed else {
            return false;
        };

        self.unwatch_exit(name);
        adapter.shutdown().await;
        info!(runner = %name, "Removed runner");
        self.emit(RegistryEvent::Removed {
            name: name.to_string(),
        });
        if was_active {
            self.wake.notify_one();
        }
        true
    }

    /// Captured process output of a runner (empty for remote runners).
    pub fn logs(&self, name: &str) -> Result<Vec<OutputLine>, RegistryError> {
        self.adapter(name)
            .map(|a| a.logs())
            .ok_or_else(|| RegistryError::UnknownRunner(name.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// One health loop iteration: probe the active runner and fail over
    /// if it is unhealthy; re-select when degraded.
    pub async fn run_health_check(&self) {
        let _selection = self.selection.lock().await;
        let Some(adapter) = self.active_adapter() else {
            debug!("No active runner, re-running selection");
            let _ = self.select_default_locked().await;
            return;
        };

        let healthy = adapter.health().await;
        {
            let mut state = self.write();
            state.healthy = healthy;
            state.last_health_check = Some(Utc::now());
        }
        if !healthy {
            warn!(runner = %adapter.name(), "Active runner failed health check, failing over");
            let _ = self.select_default_locked().await;
        }
    }

    /// Stop the health loop and every local process. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let watchers: Vec<JoinHandle<()>> = self
            .exit_watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in watchers {
            handle.abort();
        }

        let adapters = self.adapters();
        join_all(adapters.iter().map(|a| a.shutdown())).await;

        let task = self
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Health loop task failed");
            }
        }
        info!("Registry shut down");
    }
}

/// Name given to a runner registered from an endpoint switch.
fn endpoint_name(kind: BackendKind, base_url: &str) -> String {
    let address = url::Url::parse(base_url)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(match u.port_or_known_default() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .unwrap_or_else(|| base_url.to_string());
    format!("{kind}@{address}")
}
