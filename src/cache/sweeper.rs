//! Background expiry sweep
//!
//! Reads already drop expired entries lazily; the sweeper bounds how long
//! unread expired entries and leaked pending fetches can linger.

use crate::cache::TtlCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Anything the sweeper can clean
pub trait Sweepable: Send + Sync + 'static {
    /// Remove expired state and return how many items were dropped
    fn sweep(&self) -> usize;

    fn sweep_name(&self) -> &str;
}

impl<T, E> Sweepable for TtlCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn sweep(&self) -> usize {
        self.cleanup()
    }

    fn sweep_name(&self) -> &str {
        self.name()
    }
}

/// Periodic cleanup task with an explicit lifecycle
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct CacheSweeper {
    interval: Duration,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Spawn the sweep loop on the current tokio runtime
    pub fn start<S: Sweepable>(target: S, interval: Duration) -> Self {
        let target = Arc::new(target);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        info!(
            cache = %target.sweep_name(),
            interval_ms = interval.as_millis() as u64,
            "Starting cache sweeper"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let removed = target.sweep();
                        if removed > 0 {
                            debug!(cache = %target.sweep_name(), removed = removed, "Cache sweep removed items");
                        }
                    }
                }
            }

            debug!(cache = %target.sweep_name(), "Cache sweeper stopped");
        });

        Self {
            interval,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the loop and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
