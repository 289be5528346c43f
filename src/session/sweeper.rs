//! Background sweeper that reclaims expired sessions.
//!
//! Lazy expiration already hides expired sessions from every operation; the
//! sweeper is what actually unlinks them so the registry does not grow with
//! dead entries. Each tick takes the registry write lock once and never
//! touches a session lock.

use super::manager::SessionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest period the sweeper ticks at
pub const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running sweeper task
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Token that stops the sweeper when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the sweeper and wait for the task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            debug!("Sweeper task ended abnormally: {}", e);
        }
    }
}

/// Spawn the sweeper on the current runtime.
///
/// The task stops when `shutdown` is cancelled, either directly or through a
/// parent token. A zero period is raised to [`MIN_SWEEP_PERIOD`].
pub fn spawn_sweeper(
    manager: Arc<SessionManager>,
    period: Duration,
    shutdown: CancellationToken,
) -> SweeperHandle {
    if period.is_zero() {
        warn!(
            "Sweep interval of zero requested, using {}ms",
            MIN_SWEEP_PERIOD.as_millis()
        );
    }
    let period = period.max(MIN_SWEEP_PERIOD);

    let cancel = shutdown.clone();
    let task = tokio::spawn(run_sweeper_loop(manager, period, shutdown));

    SweeperHandle { cancel, task }
}

async fn run_sweeper_loop(
    manager: Arc<SessionManager>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_ms = period.as_millis() as u64, "Session sweeper started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Session sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                let removed = manager.sweep().await;
                if removed > 0 {
                    debug!(removed, "Sweep pass completed");
                }
            }
        }
    }
}
