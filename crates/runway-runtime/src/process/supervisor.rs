//! Supervisor for one locally spawned backend process.
//!
//! The supervisor owns the child through a watcher task: the watcher waits
//! for the process to exit on its own or for a stop request, reaps it, and
//! publishes the exit. Callers never hold the `Child` themselves.
//!
//! Key design decisions:
//! - **One process per supervisor**: `start` on a running supervisor is a no-op
//! - **Exit is pushed, not polled**: state goes out on a `watch` channel and
//!   an [`ProcessEvent::Exited`] broadcast
//! - **Readiness is the caller's job**: the supervisor never parses output

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use runway_core::ports::{OutputLine, OutputStream, ProcessError, ProcessState};
use tokio::process::Command;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::logs::{LogBuffer, OutputSink};
use super::shutdown::{StopPolicy, terminate};
use super::stream::spawn_stream_reader;

/// Upper bound on waiting for output readers after exit.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Event published by a supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One line of stdout or stderr.
    Line(OutputLine),
    /// The process exited, on its own or after a stop request.
    Exited { code: Option<i32> },
}

/// Handle to a running child, owned by the supervisor.
struct RunningChild {
    pid: u32,
    /// Dropping or firing this makes the watcher terminate the child.
    stop_tx: oneshot::Sender<()>,
    watcher: JoinHandle<()>,
}

/// Owns the lifecycle of exactly one OS process.
///
/// # Example
///
/// ```ignore
/// let supervisor = ProcessSupervisor::new("local-qwen");
/// supervisor.start(Path::new("llama-server"), &args).await?;
/// let mut state = supervisor.subscribe_state();
/// supervisor.stop().await;
/// ```
pub struct ProcessSupervisor {
    name: String,
    policy: StopPolicy,
    state_tx: Arc<watch::Sender<ProcessState>>,
    events: broadcast::Sender<ProcessEvent>,
    logs: Arc<LogBuffer>,
    running: Mutex<Option<RunningChild>>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("name", &self.name)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_policy(name, StopPolicy::default())
    }

    pub fn with_policy(name: impl Into<String>, policy: StopPolicy) -> Self {
        let (state_tx, _) = watch::channel(ProcessState::Idle);
        let (events, _) = broadcast::channel(1024);
        Self {
            name: name.into(),
            policy,
            state_tx: Arc::new(state_tx),
            events,
            logs: Arc::new(LogBuffer::new()),
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current process state.
    pub fn state(&self) -> ProcessState {
        *self.state_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ProcessState> {
        self.state_tx.subscribe()
    }

    /// Line and exit events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.events.subscribe()
    }

    /// Captured output lines, oldest first.
    pub fn logs(&self) -> Vec<OutputLine> {
        self.logs.snapshot()
    }

    /// Spawn `executable` with `args`.
    ///
    /// Returns `Ok` without restarting if a process is already running.
    pub async fn start(&self, executable: &Path, args: &[String]) -> Result<(), ProcessError> {
        let mut guard = self.running.lock().await;

        if let Some(old) = guard.take() {
            if !old.watcher.is_finished() {
                debug!(runner = %self.name, pid = old.pid, "Process already running");
                *guard = Some(old);
                return Ok(());
            }
            if let Err(e) = old.watcher.await {
                warn!(runner = %self.name, error = %e, "Previous process watcher panicked");
            }
        }

        let mut command = Command::new(executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::ExecutableNotFound(executable.to_path_buf())
            } else {
                ProcessError::StartFailed(format!("{}: {e}", executable.display()))
            }
        })?;

        let pid = child
            .id()
            .ok_or_else(|| ProcessError::StartFailed("process exited during spawn".to_string()))?;

        info!(runner = %self.name, pid = pid, executable = %executable.display(), "Process started");

        let sink = OutputSink {
            buffer: Arc::clone(&self.logs),
            events: self.events.clone(),
        };
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_stream_reader(
                stdout,
                self.name.clone(),
                OutputStream::Stdout,
                sink.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_stream_reader(
                stderr,
                self.name.clone(),
                OutputStream::Stderr,
                sink,
            ));
        }

        self.state_tx.send_replace(ProcessState::Running { pid });

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let state_tx = Arc::clone(&self.state_tx);
        let events = self.events.clone();
        let name = self.name.clone();
        let policy = self.policy;

        let watcher = tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = &mut stop_rx => terminate(&mut child, &name, policy).await,
            };

            let code = match status {
                Ok(status) => {
                    info!(runner = %name, pid = pid, status = %status, "Process exited");
                    status.code()
                }
                Err(e) => {
                    warn!(runner = %name, pid = pid, error = %e, "Failed to reap process");
                    None
                }
            };

            // Drain output so the final lines land before the exit event
            for reader in readers {
                let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, reader).await;
            }

            state_tx.send_replace(ProcessState::Exited { code });
            let _ = events.send(ProcessEvent::Exited { code });
        });

        *guard = Some(RunningChild {
            pid,
            stop_tx,
            watcher,
        });
        Ok(())
    }

    /// Stop the process using the supervisor's [`StopPolicy`].
    ///
    /// Idempotent: stopping an idle or exited supervisor is a no-op.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        debug!(runner = %self.name, pid = running.pid, "Stopping process");
        // The watcher may already have finished
        let _ = running.stop_tx.send(());
        if let Err(e) = running.watcher.await {
            warn!(runner = %self.name, error = %e, "Process watcher panicked");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use tokio::time::timeout;

    use super::*;

    fn sh(script: &str) -> (std::path::PathBuf, Vec<String>) {
        (
            std::path::PathBuf::from("sh"),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    async fn wait_for_exit(rx: &mut watch::Receiver<ProcessState>) -> ProcessState {
        timeout(
            Duration::from_secs(10),
            rx.wait_for(|s| matches!(s, ProcessState::Exited { .. })),
        )
        .await
        .expect("process did not exit")
        .map(|s| *s)
        .unwrap()
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let supervisor = ProcessSupervisor::new("t");
        let mut state = supervisor.subscribe_state();
        let (exe, args) = sh("echo out; echo err >&2; exit 7");

        supervisor.start(&exe, &args).await.unwrap();
        let exited = wait_for_exit(&mut state).await;

        assert_eq!(exited, ProcessState::Exited { code: Some(7) });
        let logs = supervisor.logs();
        assert!(logs.iter().any(|l| l.line == "out" && l.stream == OutputStream::Stdout));
        assert!(logs.iter().any(|l| l.line == "err" && l.stream == OutputStream::Stderr));
    }

    #[tokio::test]
    async fn start_is_noop_while_running() {
        let supervisor = ProcessSupervisor::new("t");
        let (exe, args) = sh("exec sleep 30");

        supervisor.start(&exe, &args).await.unwrap();
        let first = supervisor.state();
        supervisor.start(&exe, &args).await.unwrap();

        assert!(first.is_running());
        assert_eq!(supervisor.state(), first);
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let supervisor = ProcessSupervisor::new("t");
        supervisor.stop().await;
        assert_eq!(supervisor.state(), ProcessState::Idle);

        let (exe, args) = sh("exec sleep 30");
        supervisor.start(&exe, &args).await.unwrap();
        supervisor.stop().await;
        supervisor.stop().await;

        assert!(matches!(supervisor.state(), ProcessState::Exited { .. }));
    }

    #[tokio::test]
    async fn exit_is_broadcast() {
        let supervisor = ProcessSupervisor::new("t");
        let mut events = supervisor.subscribe();
        let (exe, args) = sh("exit 0");

        supervisor.start(&exe, &args).await.unwrap();

        let exit = timeout(Duration::from_secs(10), async {
            loop {
                if let Ok(ProcessEvent::Exited { code }) = events.recv().await {
                    return code;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(exit, Some(0));
    }

    #[tokio::test]
    async fn restart_after_exit() {
        let supervisor = ProcessSupervisor::new("t");
        let mut state = supervisor.subscribe_state();
        let (exe, args) = sh("exit 1");
        supervisor.start(&exe, &args).await.unwrap();
        wait_for_exit(&mut state).await;

        let (exe, args) = sh("exec sleep 30");
        supervisor.start(&exe, &args).await.unwrap();
        assert!(supervisor.is_running());
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn missing_executable_is_reported() {
        let supervisor = ProcessSupervisor::new("t");
        let err = supervisor
            .start(Path::new("/nonexistent/llama-server"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::ExecutableNotFound(_)));
        assert_eq!(supervisor.state(), ProcessState::Idle);
    }
}
