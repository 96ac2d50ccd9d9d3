//! Periodic renewal timer owned by the orchestrator.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs a tick callback every `interval` until stopped.
///
/// The first tick fires one full interval after start. A tick in progress is
/// dropped when the scheduler stops.
pub struct RenewalScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RenewalScheduler {
    /// Spawn the timer task.
    pub fn start<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tick() => {}
                }
            }
            debug!("renewal scheduler stopped");
        });
        debug!(?interval, "renewal scheduler started");
        Self { cancel, handle }
    }

    /// Whether the timer task is still alive.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the timer and wait for its task to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
