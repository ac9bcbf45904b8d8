//! Adapter for a backend spawned and supervised by runway.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use runway_core::domain::{BackendKind, ChatRequest, ChatResponse, LaunchSpec};
use runway_core::ports::{BackendAdapter, BackendError, OutputLine, ProcessError, ProcessState};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::http::HttpBackend;
use crate::health::{READY_POLL_INTERVAL, Readiness, wait_until_ready};
use crate::process::ProcessSupervisor;

/// A llama-server style process fronted by the shared HTTP logic.
///
/// `current_model` is the model file the process serves.
#[derive(Debug)]
pub struct LocalAdapter {
    name: String,
    launch: LaunchSpec,
    port: u16,
    default_model: Option<String>,
    http: HttpBackend,
    supervisor: ProcessSupervisor,
    ready_timeout: Duration,
    model_path: RwLock<Option<PathBuf>>,
    /// Serializes start, restart and unload.
    lifecycle: Mutex<()>,
}

impl LocalAdapter {
    pub fn new(
        name: String,
        launch: LaunchSpec,
        port: u16,
        default_model: Option<String>,
        http: HttpBackend,
        supervisor: ProcessSupervisor,
        ready_timeout: Duration,
    ) -> Self {
        let model_path = Some(launch.model_path.clone());
        Self {
            name,
            launch,
            port,
            default_model,
            http,
            supervisor,
            ready_timeout,
            model_path: RwLock::new(model_path),
            lifecycle: Mutex::new(()),
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    fn model_path(&self) -> Option<PathBuf> {
        self.model_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_model_path(&self, path: Option<PathBuf>) {
        *self
            .model_path
            .write()
            .unwrap_or_else(PoisonError::into_inner) = path;
    }

    /// Spawn the process serving `model_path` and wait for its first
    /// successful probe.
    ///
    /// Caller must hold `lifecycle`.
    async fn start_locked(&self, model_path: &Path) -> Result<(), BackendError> {
        if self.supervisor.is_running() {
            return Ok(());
        }

        let executable = resolve_executable(&self.launch.executable)
            .ok_or_else(|| ProcessError::ExecutableNotFound(self.launch.executable.clone()))?;
        if !model_path.is_file() {
            return Err(ProcessError::ModelFileNotFound(model_path.to_path_buf()).into());
        }

        let args = self.launch.command_args(model_path, self.port);
        info!(runner = %self.name, port = %self.port, model = %model_path.display(), "Starting local backend");
        self.supervisor.start(&executable, &args).await?;

        let ready = wait_until_ready(&self.name, self.ready_timeout, READY_POLL_INTERVAL, || async move {
            match self.supervisor.state() {
                ProcessState::Running { .. } if self.http.probe().await => Readiness::Ready,
                ProcessState::Running { .. } => Readiness::Pending,
                ProcessState::Exited { code } => {
                    Readiness::Failed(format!("process exited during startup (code {code:?})"))
                }
                ProcessState::Idle => Readiness::Failed("process is not running".to_string()),
            }
        })
        .await;

        if let Err(e) = ready {
            warn!(runner = %self.name, error = %e, "Local backend failed to become ready");
            self.supervisor.stop().await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Locate an executable: paths are checked directly, bare names on `PATH`.
fn resolve_executable(executable: &Path) -> Option<PathBuf> {
    if executable.as_os_str().is_empty() {
        return None;
    }
    which::which(executable).ok()
}

#[async_trait]
impl BackendAdapter for LocalAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LocalProcess
    }

    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn current_model(&self) -> Option<String> {
        self.model_path()
            .map(|p| p.to_string_lossy().into_owned())
    }

    /// An exited process is unhealthy without a network round trip.
    async fn health(&self) -> bool {
        if !self.supervisor.is_running() {
            return false;
        }
        self.http.probe().await
    }

    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, BackendError> {
        if !self.supervisor.is_running() {
            return Err(BackendError::NotRunning);
        }
        let fallback = self.current_model().or_else(|| self.default_model.clone());
        self.http.chat(request, fallback, cancel).await
    }

    /// Restart the process serving `model`.
    ///
    /// If the new model fails to come up, the previous one is started again.
    /// The current model only changes once a process is serving it.
    async fn load_model(&self, model: &str) -> Result<(), BackendError> {
        let _guard = self.lifecycle.lock().await;
        let path = PathBuf::from(model);
        if !path.is_file() {
            return Err(ProcessError::ModelFileNotFound(path).into());
        }

        let previous = self.model_path();
        self.supervisor.stop().await;
        let err = match self.start_locked(&path).await {
            Ok(()) => {
                self.set_model_path(Some(path));
                return Ok(());
            }
            Err(e) => e,
        };

        let restored = match previous {
            Some(prev) => match self.start_locked(&prev).await {
                Ok(()) => Some(prev),
                Err(e) => {
                    warn!(runner = %self.name, error = %e, "Previous model failed to restart");
                    None
                }
            },
            None => None,
        };
        self.set_model_path(restored);
        Err(err)
    }

    async fn unload(&self) -> Result<bool, BackendError> {
        let _guard = self.lifecycle.lock().await;
        let was_loaded = self.supervisor.is_running();
        self.supervisor.stop().await;
        self.set_model_path(None);
        Ok(was_loaded)
    }

    async fn start(&self) -> Result<(), BackendError> {
        let _guard = self.lifecycle.lock().await;
        let model_path = self.model_path().ok_or(BackendError::NotRunning)?;
        self.start_locked(&model_path).await
    }

    async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        self.supervisor.stop().await;
    }

    fn process_state(&self) -> Option<watch::Receiver<ProcessState>> {
        Some(self.supervisor.subscribe_state())
    }

    fn logs(&self) -> Vec<OutputLine> {
        self.supervisor.logs()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use axum::routing::{get, post};
    use axum::{Json, Router};
    use runway_core::domain::ChatMessage;
    use serde_json::{Value, json};

    use super::*;
    use crate::process::StopPolicy;

    struct Fixture {
        _dir: tempfile::TempDir,
        script: PathBuf,
        model: PathBuf,
    }

    /// A "server" script that ignores its arguments and stays up.
    fn fixture(body: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-server");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let model = dir.path().join("model.gguf");
        std::fs::write(&model, b"GGUF").unwrap();
        Fixture {
            _dir: dir,
            script,
            model,
        }
    }

    fn adapter(launch: LaunchSpec, port: u16, ready_timeout: Duration) -> LocalAdapter {
        adapter_with_default(launch, port, ready_timeout, None)
    }

    fn adapter_with_default(
        launch: LaunchSpec,
        port: u16,
        ready_timeout: Duration,
        default_model: Option<String>,
    ) -> LocalAdapter {
        LocalAdapter::new(
            "local".to_string(),
            launch,
            port,
            default_model,
            HttpBackend::new(
                reqwest::Client::new(),
                format!("http://127.0.0.1:{port}"),
                Duration::from_secs(1),
            ),
            ProcessSupervisor::with_policy(
                "local",
                StopPolicy {
                    grace: Duration::from_secs(2),
                    kill_wait: Duration::from_secs(2),
                },
            ),
            ready_timeout,
        )
    }

    /// Something answering probes on `port` while the fake process runs.
    async fn health_endpoint() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/v1/chat/completions",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "id": "x",
                        "model": body["model"],
                        "choices": [{"message": {"role": "assistant", "content": "ok"}}]
                    }))
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn missing_executable_fails_start() {
        let fx = fixture("exec sleep 30");
        let launch = LaunchSpec::new("/nonexistent/llama-server", &fx.model);
        let err = adapter(launch, 1, Duration::from_secs(1)).start().await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Process(ProcessError::ExecutableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_model_fails_start() {
        let fx = fixture("exec sleep 30");
        let launch = LaunchSpec::new(&fx.script, "/nonexistent/model.gguf");
        let err = adapter(launch, 1, Duration::from_secs(1)).start().await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Process(ProcessError::ModelFileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn early_exit_fails_fast() {
        let fx = fixture("exit 3");
        let port = crate::process::allocate_port(40000, &[]).unwrap();
        let adapter = adapter(LaunchSpec::new(&fx.script, &fx.model), port, Duration::from_secs(30));

        let started = tokio::time::Instant::now();
        let err = adapter.start().await.unwrap_err();
        assert!(matches!(err, BackendError::Process(ProcessError::StartFailed(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!adapter.health().await);
    }

    #[tokio::test]
    async fn readiness_timeout_stops_process() {
        let fx = fixture("exec sleep 30");
        let port = crate::process::allocate_port(41000, &[]).unwrap();
        let adapter = adapter(LaunchSpec::new(&fx.script, &fx.model), port, Duration::from_secs(2));

        let err = adapter.start().await.unwrap_err();
        assert!(matches!(err, BackendError::Process(ProcessError::NotReady(_))));
        assert!(!adapter.supervisor().is_running());
    }

    #[tokio::test]
    async fn start_load_and_unload() {
        let fx = fixture("echo starting; exec sleep 30");
        let port = health_endpoint().await;
        let adapter = adapter(LaunchSpec::new(&fx.script, &fx.model), port, Duration::from_secs(10));

        adapter.start().await.unwrap();
        assert!(adapter.health().await);
        for _ in 0..20 {
            if adapter.logs().iter().any(|l| l.line == "starting") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(adapter.logs().iter().any(|l| l.line == "starting"));
        let first_pid = adapter.supervisor().state();

        let other = fx.model.with_file_name("other.gguf");
        std::fs::write(&other, b"GGUF").unwrap();
        adapter.load_model(other.to_str().unwrap()).await.unwrap();
        assert_eq!(adapter.current_model().as_deref(), other.to_str());
        assert_ne!(adapter.supervisor().state(), first_pid);

        assert!(adapter.unload().await.unwrap());
        assert!(!adapter.health().await);
        assert_eq!(adapter.current_model(), None);
        assert!(!adapter.unload().await.unwrap());
    }

    #[tokio::test]
    async fn failed_load_restarts_previous_model() {
        let fx = fixture("case \"$*\" in *bad.gguf*) exit 1;; esac\nexec sleep 30");
        let port = health_endpoint().await;
        let adapter = adapter(LaunchSpec::new(&fx.script, &fx.model), port, Duration::from_secs(10));
        adapter.start().await.unwrap();

        let bad = fx.model.with_file_name("bad.gguf");
        std::fs::write(&bad, b"GGUF").unwrap();
        let err = adapter.load_model(bad.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, BackendError::Process(ProcessError::StartFailed(_))));

        assert_eq!(adapter.current_model().as_deref(), fx.model.to_str());
        assert!(adapter.supervisor().is_running());
        assert!(adapter.health().await);
    }

    #[tokio::test]
    async fn chat_defaults_to_loaded_model_over_configured_default() {
        let fx = fixture("exec sleep 30");
        let port = health_endpoint().await;
        let adapter = adapter_with_default(
            LaunchSpec::new(&fx.script, &fx.model),
            port,
            Duration::from_secs(10),
            Some("configured-default".to_string()),
        );
        adapter.start().await.unwrap();

        let other = fx.model.with_file_name("other.gguf");
        std::fs::write(&other, b"GGUF").unwrap();
        adapter.load_model(other.to_str().unwrap()).await.unwrap();

        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        let response = adapter.chat(request, CancellationToken::new()).await.unwrap();
        assert_eq!(Some(response.model.as_str()), other.to_str());

        adapter.shutdown().await;
    }

    #[test]
    fn bare_names_resolve_on_path() {
        assert!(resolve_executable(Path::new("sh")).is_some());
        assert!(resolve_executable(Path::new("definitely-not-a-real-binary-xyz")).is_none());
        assert!(resolve_executable(Path::new("")).is_none());
    }
}
