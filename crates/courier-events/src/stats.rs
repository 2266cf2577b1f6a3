//! Dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time snapshot of bus activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// `publish` calls, including those with no handlers.
    pub published: u64,
    /// Synchronous handler invocations.
    pub sync_invocations: u64,
    /// Asynchronous dispatches handed to the backend.
    pub async_scheduled: u64,
    /// Asynchronous dispatches that ran to completion (successfully or not).
    pub async_completed: u64,
    /// Handlers skipped because the arguments did not fit.
    pub argument_mismatches: u64,
    /// Handlers that panicked.
    pub panics: u64,
    /// Asynchronous dispatches that could not be started.
    pub spawn_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) published: AtomicU64,
    pub(crate) sync_invocations: AtomicU64,
    pub(crate) async_scheduled: AtomicU64,
    pub(crate) async_completed: AtomicU64,
    pub(crate) argument_mismatches: AtomicU64,
    pub(crate) panics: AtomicU64,
    pub(crate) spawn_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            sync_invocations: self.sync_invocations.load(Ordering::Relaxed),
            async_scheduled: self.async_scheduled.load(Ordering::Relaxed),
            async_completed: self.async_completed.load(Ordering::Relaxed),
            argument_mismatches: self.argument_mismatches.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
        }
    }
}
