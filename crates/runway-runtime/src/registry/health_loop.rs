//! Background health check and failover loop.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RunnerRegistry;

/// Spawn the loop. It holds only a weak reference, so dropping the last
/// registry handle also ends it.
pub(super) fn spawn(
    registry: Weak<RunnerRegistry>,
    period: Duration,
    wake: Arc<Notify>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Selection just ran; skip the immediate first tick
        ticker.tick().await;

        debug!(interval = ?period, "Health loop started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                () = wake.notified() => {
                    debug!("Health loop woken by process exit");
                    ticker.reset();
                }
            }

            let Some(registry) = registry.upgrade() else {
                break;
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = registry.run_health_check() => {}
            }
        }
        debug!("Health loop stopped");
    })
}
