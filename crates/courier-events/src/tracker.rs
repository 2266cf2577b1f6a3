//! Completion tracking for asynchronous dispatches.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Counts outstanding asynchronous dispatches and lets callers wait for the
/// count to reach zero, either blocking or from async code.
#[derive(Debug, Default)]
pub(crate) struct CompletionTracker {
    pending: Mutex<usize>,
    idle: Condvar,
    drained: Notify,
}

impl CompletionTracker {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register one dispatch. Must be called before the task is scheduled.
    pub(crate) fn begin(self: &Arc<Self>) -> PendingGuard {
        let mut pending = self.lock();
        *pending = pending.saturating_add(1);
        PendingGuard {
            tracker: Arc::clone(self),
        }
    }

    fn finish(&self) {
        let mut pending = self.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
            self.drained.notify_waiters();
        }
    }

    pub(crate) fn pending(&self) -> usize {
        *self.lock()
    }

    /// Block the calling thread until no dispatch is outstanding.
    pub(crate) fn wait(&self) {
        let mut pending = self.lock();
        while *pending > 0 {
            pending = self
                .idle
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait without blocking the executor.
    pub(crate) async fn wait_async(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register interest before reading the count so a concurrent
            // `finish` cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one outstanding dispatch; dropping it completes the dispatch.
///
/// Dropping happens on every exit path of the task, including a handler
/// panic that escapes or a task that is never started.
#[must_use = "dropping the guard completes the dispatch immediately"]
pub(crate) struct PendingGuard {
    tracker: Arc<CompletionTracker>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_immediately_when_idle() {
        let tracker = Arc::new(CompletionTracker::default());
        tracker.wait();
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn test_guard_drop_releases_waiter() {
        let tracker = Arc::new(CompletionTracker::default());
        let guard = tracker.begin();
        assert_eq!(tracker.pending(), 1);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(guard);
        });

        tracker.wait();
        assert_eq!(tracker.pending(), 0);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_wait_async_wakes_on_drain() {
        let tracker = Arc::new(CompletionTracker::default());
        let first = tracker.begin();
        let second = tracker.begin();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(first);
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(second);
        });

        tracker.wait_async().await;
        assert_eq!(tracker.pending(), 0);
        handle.await.unwrap();
    }
}
