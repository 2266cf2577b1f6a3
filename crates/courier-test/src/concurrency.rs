//! Concurrency measurement helpers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Measures how many sections run at the same time.
///
/// Each handler under test calls [`OverlapGauge::enter`] and holds the
/// returned guard for the duration of its work.
#[derive(Debug, Clone, Default)]
pub struct OverlapGauge {
    inner: Arc<GaugeState>,
}

#[derive(Debug, Default)]
struct GaugeState {
    current: AtomicUsize,
    max: AtomicUsize,
    entries: AtomicUsize,
    overlapped: AtomicBool,
}

impl OverlapGauge {
    /// New gauge with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the measured section.
    #[must_use = "the section ends when the guard is dropped"]
    pub fn enter(&self) -> GaugeGuard {
        let now = self
            .inner
            .current
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        self.inner.max.fetch_max(now, Ordering::SeqCst);
        self.inner.entries.fetch_add(1, Ordering::SeqCst);
        if now > 1 {
            self.inner.overlapped.store(true, Ordering::SeqCst);
        }
        GaugeGuard {
            state: Arc::clone(&self.inner),
        }
    }

    /// Highest number of simultaneous sections observed.
    #[must_use]
    pub fn max(&self) -> usize {
        self.inner.max.load(Ordering::SeqCst)
    }

    /// Total sections entered.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.inner.entries.load(Ordering::SeqCst)
    }

    /// Whether two sections ever ran at once.
    #[must_use]
    pub fn overlapped(&self) -> bool {
        self.inner.overlapped.load(Ordering::SeqCst)
    }
}

/// Leaves the measured section on drop.
#[derive(Debug)]
pub struct GaugeGuard {
    state: Arc<GaugeState>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.state.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Meeting point for a fixed number of threads, with a deadline.
///
/// Unlike [`std::sync::Barrier`], a party that is never joined by the
/// others gives up after the timeout instead of blocking forever.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    inner: Arc<(Mutex<usize>, Condvar)>,
    parties: usize,
}

impl Rendezvous {
    /// Meeting point for `parties` threads.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        Self {
            inner: Arc::new((Mutex::new(0), Condvar::new())),
            parties,
        }
    }

    /// Arrive and wait up to `timeout` for the remaining parties.
    ///
    /// Returns `true` if all parties arrived in time.
    pub fn arrive(&self, timeout: Duration) -> bool {
        let (arrived, all_here) = &*self.inner;
        let mut count = arrived.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_add(1);
        all_here.notify_all();
        let (count, result) = all_here
            .wait_timeout_while(count, timeout, |count| *count < self.parties)
            .unwrap_or_else(PoisonError::into_inner);
        drop(count);
        !result.timed_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_entries_count_as_overlap() {
        let gauge = OverlapGauge::new();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
        }
        let _c = gauge.enter();

        assert_eq!(gauge.max(), 2);
        assert_eq!(gauge.entries(), 3);
        assert!(gauge.overlapped());
    }

    #[test]
    fn test_sequential_entries_do_not_overlap() {
        let gauge = OverlapGauge::new();
        for _ in 0..3 {
            let _guard = gauge.enter();
        }
        assert_eq!(gauge.max(), 1);
        assert!(!gauge.overlapped());
    }

    #[test]
    fn test_rendezvous_meets() {
        let rendezvous = Rendezvous::new(2);
        let other = rendezvous.clone();
        let handle = std::thread::spawn(move || other.arrive(Duration::from_secs(5)));

        assert!(rendezvous.arrive(Duration::from_secs(5)));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_rendezvous_times_out_alone() {
        let rendezvous = Rendezvous::new(2);
        assert!(!rendezvous.arrive(Duration::from_millis(20)));
    }
}
