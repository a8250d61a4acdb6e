use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use super::store::CacheStore;

/// Restartable background task running idle eviction on a fixed period
///
/// Sweeps run sequentially inside one task, so a slow sweep delays the next
/// tick instead of overlapping it.
pub struct IdleSweeper {
    store: Arc<CacheStore>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IdleSweeper {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            handle: Mutex::new(None),
        }
    }

    /// (Re)start the sweep; any previous task is aborted first
    ///
    /// Returns `false` and leaves the sweeper stopped when either duration is zero.
    pub fn start(&self, period: Duration, max_idle: Duration) -> bool {
        self.stop();

        if period.is_zero() || max_idle.is_zero() {
            return false;
        }

        let store = self.store.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                store.evict_idle(max_idle);
            }
        });

        info!(?period, ?max_idle, "Idle eviction started");
        *self.handle.lock() = Some(task);
        true
    }

    pub fn stop(&self) {
        if let Some(task) = self.handle.lock().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for IdleSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
