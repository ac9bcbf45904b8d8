//! Graceful shutdown of a supervised child with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
#[cfg(unix)]
use tokio::time::timeout;
#[cfg(unix)]
use tracing::{error, warn};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Timeouts used when stopping a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// How long the process gets to exit after SIGTERM.
    pub grace: Duration,
    /// How long to wait for reaping after SIGKILL.
    pub kill_wait: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            kill_wait: Duration::from_secs(5),
        }
    }
}

/// Terminate `child` and its process group, then reap it.
///
/// # Strategy
/// 1. SIGTERM to the process group, wait up to `policy.grace`
/// 2. SIGKILL to the process group
/// 3. Wait up to `policy.kill_wait`; log an error if it is still alive
///
/// Non-Unix platforms kill the child directly.
pub(crate) async fn terminate(
    child: &mut Child,
    runner: &str,
    policy: StopPolicy,
) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        terminate_unix(child, runner, policy).await
    }

    #[cfg(not(unix))]
    {
        let _ = (runner, policy);
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(unix)]
async fn terminate_unix(
    child: &mut Child,
    runner: &str,
    policy: StopPolicy,
) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped
        return child.wait().await;
    };
    let group = Pid::from_raw(i32::try_from(pid).map_err(io::Error::other)?);

    if let Err(e) = signal::killpg(group, Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(policy.grace, child.wait()).await {
        return result;
    }

    warn!(runner = %runner, pid = pid, "Process ignored SIGTERM, sending SIGKILL");
    if let Err(e) = signal::killpg(group, Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            warn!(runner = %runner, pid = pid, error = %e, "SIGKILL to process group failed");
            child.start_kill()?;
        }
    }

    match timeout(policy.kill_wait, child.wait()).await {
        Ok(result) => result,
        Err(_) => {
            error!(runner = %runner, pid = pid, "Process still running after SIGKILL");
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("process {pid} did not exit after SIGKILL"),
            ))
        }
    }
}
