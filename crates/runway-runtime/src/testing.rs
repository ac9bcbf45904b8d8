//! In-memory adapter for registry and gateway tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use runway_core::domain::{BackendKind, ChatRequest, ChatResponse, Usage};
use runway_core::ports::{BackendAdapter, BackendError, OutputLine, OutputStream, ProcessState};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A scriptable [`BackendAdapter`].
///
/// Replies with `"<name>: <last user message>"` unless a failure is set.
#[derive(Debug)]
pub struct StubAdapter {
    name: String,
    kind: BackendKind,
    base_url: String,
    healthy: AtomicBool,
    failure: Mutex<Option<(u16, String)>>,
    chat_delay: Duration,
    current_model: Mutex<Option<String>>,
    process: Option<watch::Sender<ProcessState>>,
    chat_calls: AtomicUsize,
    health_calls: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl StubAdapter {
    pub fn new(name: &str, healthy: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: BackendKind::RemoteHttp,
            base_url: format!("http://{name}.invalid"),
            healthy: AtomicBool::new(healthy),
            failure: Mutex::new(None),
            chat_delay: Duration::ZERO,
            current_model: Mutex::new(None),
            process: None,
            chat_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn healthy(name: &str) -> Self {
        Self::new(name, true)
    }

    pub fn unhealthy(name: &str) -> Self {
        Self::new(name, false)
    }

    /// Pretend to be a local runner with a running process.
    #[must_use]
    pub fn with_process(mut self) -> Self {
        let (tx, _) = watch::channel(ProcessState::Running { pid: 4242 });
        self.kind = BackendKind::LocalProcess;
        self.process = Some(tx);
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    #[must_use]
    pub const fn with_chat_delay(mut self, delay: Duration) -> Self {
        self.chat_delay = delay;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make every chat call fail with `status` and `body`.
    pub fn fail_with(&self, status: u16, body: &str) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((status, body.to_string()));
    }

    /// Simulate the process exiting; the stub also turns unhealthy.
    pub fn exit_process(&self, code: i32) {
        self.set_healthy(false);
        if let Some(tx) = &self.process {
            tx.send_replace(ProcessState::Exited { code: Some(code) });
        }
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current_model(&self) -> Option<String> {
        self.current_model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn health(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }

    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, BackendError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if !self.chat_delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => return Err(BackendError::Cancelled),
                () = tokio::time::sleep(self.chat_delay) => {}
            }
        }
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some((status, body)) = failure {
            return Err(BackendError::Status { status, body });
        }

        let text = request.last_user_text().unwrap_or_default();
        let model = request
            .model
            .or_else(|| self.current_model())
            .unwrap_or_else(|| "stub".to_string());
        Ok(ChatResponse::single(
            format!("stub-{}", self.chat_calls()),
            model,
            format!("{}: {text}", self.name),
            Usage::new(1, 1),
        ))
    }

    async fn load_model(&self, model: &str) -> Result<(), BackendError> {
        *self
            .current_model
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(model.to_string());
        Ok(())
    }

    async fn unload(&self) -> Result<bool, BackendError> {
        Ok(self
            .current_model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn process_state(&self) -> Option<watch::Receiver<ProcessState>> {
        self.process.as_ref().map(watch::Sender::subscribe)
    }

    fn logs(&self) -> Vec<OutputLine> {
        if self.process.is_some() {
            vec![OutputLine::now(OutputStream::Stderr, format!("{} ready", self.name))]
        } else {
            Vec::new()
        }
    }
}
