//! HTTP health probes for backends.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use runway_core::ports::ProcessError;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Paths tried in order; the first 2xx wins.
pub const PROBE_PATHS: [&str; 2] = ["/health", "/v1/models"];

/// Default per-request timeout for a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval between readiness polls of a freshly started backend.
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Probe `base_url`. Never errors; any failure is `false`.
pub async fn probe(client: &Client, base_url: &str, timeout: Duration) -> bool {
    for path in PROBE_PATHS {
        let url = format!("{base_url}{path}");
        match client.get(&url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => return true,
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "Probe returned non-success status");
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Probe failed");
            }
        }
    }
    false
}

/// Outcome of one readiness poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Pending,
    /// Polling cannot succeed any more (e.g. the process exited).
    Failed(String),
}

/// Poll `check` every `interval` until it reports ready or `timeout` passes.
pub async fn wait_until_ready<F, Fut>(
    runner: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), ProcessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Readiness>,
{
    info!(runner = %runner, timeout = ?timeout, "Waiting for backend to become ready");
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match check().await {
            Readiness::Ready => {
                info!(runner = %runner, attempt = attempt, "Backend is ready");
                return Ok(());
            }
            Readiness::Failed(reason) => return Err(ProcessError::StartFailed(reason)),
            Readiness::Pending => {
                debug!(runner = %runner, attempt = attempt, "Backend not ready yet");
            }
        }

        if Instant::now() + interval > deadline {
            return Err(ProcessError::NotReady(timeout));
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn unreachable_backend_is_unhealthy() {
        let client = Client::new();
        // Port 9 (discard) is not an HTTP server
        assert!(!probe(&client, "http://127.0.0.1:9", Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn ready_after_a_few_polls() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = wait_until_ready("t", Duration::from_secs(5), Duration::from_millis(10), || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                    Readiness::Ready
                } else {
                    Readiness::Pending
                }
            }
        })
        .await;

        tokio_test::assert_ok!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_when_never_ready() {
        let result = wait_until_ready(
            "t",
            Duration::from_millis(50),
            Duration::from_millis(10),
            || async { Readiness::Pending },
        )
        .await;
        assert!(matches!(result, Err(ProcessError::NotReady(_))));
    }

    #[tokio::test]
    async fn failure_stops_polling() {
        let result = wait_until_ready("t", Duration::from_secs(5), Duration::from_millis(10), || async {
            Readiness::Failed("exited".to_string())
        })
        .await;
        assert!(matches!(result, Err(ProcessError::StartFailed(reason)) if reason == "exited"));
    }
}
