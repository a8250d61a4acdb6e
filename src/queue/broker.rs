use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::fingerprint::Fingerprint;

/// FIFO of pending downloads, deduplicated on (id, format)
///
/// The worker peeks the head, downloads it, then pops it. Because the head
/// stays queued while its download runs, a request for the same asset made
/// during that window is deduplicated as well.
#[derive(Debug, Default)]
pub struct DownloadQueue {
    tasks: Mutex<VecDeque<Fingerprint>>,
    notify: Notify,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless the same asset is already queued; never blocks
    ///
    /// Returns `true` when the task was added.
    pub fn enqueue(&self, fingerprint: Fingerprint) -> bool {
        {
            let mut tasks = self.tasks.lock();
            if tasks.iter().any(|queued| queued.same_asset(&fingerprint)) {
                debug!(id = %fingerprint.id, format = %fingerprint.format, "Download already queued");
                return false;
            }
            debug!(
                id = %fingerprint.id,
                format = %fingerprint.format,
                family = %fingerprint.family,
                depth = tasks.len() + 1,
                "Download queued"
            );
            tasks.push_back(fingerprint);
        }

        self.notify.notify_one();
        true
    }

    pub fn peek(&self) -> Option<Fingerprint> {
        self.tasks.lock().front().cloned()
    }

    pub fn pop_front(&self) -> Option<Fingerprint> {
        self.tasks.lock().pop_front()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.tasks.lock().iter().any(|queued| queued.same_asset(fingerprint))
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Wait until the queue is non-empty and return (without removing) its head
    ///
    /// Meant for a single consumer: a notification sent while nobody waits is
    /// kept as a permit, so an enqueue racing the emptiness check is not lost.
    pub async fn next(&self) -> Fingerprint {
        loop {
            if let Some(head) = self.peek() {
                return head;
            }
            self.notify.notified().await;
        }
    }
}
