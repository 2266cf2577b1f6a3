//! Topic registry: topic -> ordered registrations.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BusError, BusResult};
use crate::handler::Callback;

/// Handle returned by every subscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a registration is invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Inline on the publisher's thread.
    #[default]
    Sync,
    /// On an independently scheduled task.
    Async,
    /// On an independently scheduled task, never overlapping another
    /// invocation of the same registration.
    Transactional,
}

impl DispatchMode {
    /// Whether invocations leave the publisher's thread.
    #[must_use]
    pub fn is_async(self) -> bool {
        !matches!(self, Self::Sync)
    }
}

/// Flags for a new registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscribeOptions {
    /// Dispatch mode.
    pub mode: DispatchMode,
    /// Remove the registration after it fires once.
    pub once: bool,
}

impl SubscribeOptions {
    /// Synchronous, persistent.
    #[must_use]
    pub fn sync() -> Self {
        Self::default()
    }

    /// Asynchronous, optionally serialized per registration.
    #[must_use]
    pub fn asynchronous(transactional: bool) -> Self {
        Self {
            mode: if transactional {
                DispatchMode::Transactional
            } else {
                DispatchMode::Async
            },
            once: false,
        }
    }

    /// Make the registration one-shot.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

/// One subscribed handler bound to a topic.
pub(crate) struct Registration {
    pub(crate) id: SubscriptionId,
    pub(crate) callback: Callback,
    pub(crate) options: SubscribeOptions,
    fired: AtomicBool,
    serial: Mutex<()>,
}

impl Registration {
    fn new(callback: Callback, options: SubscribeOptions) -> Self {
        Self {
            id: SubscriptionId::new(),
            callback,
            options,
            fired: AtomicBool::new(false),
            serial: Mutex::new(()),
        }
    }

    /// Claim the single firing of a `once` registration.
    ///
    /// Returns `false` if another publisher already claimed it.
    pub(crate) fn claim(&self) -> bool {
        !self.options.once
            || self
                .fired
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Give back a claim whose invocation failed, so the next publish can
    /// fire the registration again.
    pub(crate) fn release(&self) {
        if self.options.once {
            self.fired.store(false, Ordering::Release);
        }
    }

    /// Serialize invocations of a transactional registration.
    pub(crate) fn serial_guard(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("callback", &self.callback)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Topic -> registrations, guarded by one mutex.
///
/// Topics exist only while they have at least one registration. The lock is
/// held for map access only, never while a handler runs.
#[derive(Default)]
pub(crate) struct Registry {
    topics: Mutex<HashMap<String, Vec<Arc<Registration>>>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Arc<Registration>>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(
        &self,
        topic: &str,
        callback: Callback,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let registration = Arc::new(Registration::new(callback, options));
        let id = registration.id;
        self.lock().entry(topic.to_owned()).or_default().push(registration);
        id
    }

    /// Remove the registration with `id`, preserving the order of the rest.
    pub(crate) fn remove(&self, topic: &str, id: SubscriptionId) -> BusResult<Arc<Registration>> {
        self.remove_where(topic, |r| r.id == id)
            .ok_or_else(|| BusError::no_such_id(topic, id))
    }

    /// Remove the first registration whose callback is `callback`.
    pub(crate) fn remove_callback(
        &self,
        topic: &str,
        callback: &Callback,
    ) -> BusResult<Arc<Registration>> {
        self.remove_where(topic, |r| r.callback.ptr_eq(callback))
            .ok_or_else(|| BusError::NoSuchHandler {
                topic: topic.to_owned(),
                handler: format!("callback '{}'", callback.name()),
            })
    }

    fn remove_where<P>(&self, topic: &str, predicate: P) -> Option<Arc<Registration>>
    where
        P: Fn(&Registration) -> bool,
    {
        let mut topics = self.lock();
        let list = topics.get_mut(topic)?;
        let index = list.iter().position(|r| predicate(r))?;
        let removed = list.remove(index);
        if list.is_empty() {
            topics.remove(topic);
        }
        Some(removed)
    }

    /// Stable copy of the topic's registrations, in insertion order.
    pub(crate) fn snapshot(&self, topic: &str) -> Vec<Arc<Registration>> {
        self.lock().get(topic).cloned().unwrap_or_default()
    }

    pub(crate) fn has_any(&self, topic: &str) -> bool {
        self.lock().get(topic).is_some_and(|list| !list.is_empty())
    }

    pub(crate) fn count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, Vec::len)
    }

    pub(crate) fn total(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub(crate) fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub(crate) fn clear_topic(&self, topic: &str) -> usize {
        self.lock().remove(topic).map_or(0, |list| list.len())
    }

    pub(crate) fn clear(&self) -> usize {
        let mut topics = self.lock();
        let removed = topics.values().map(Vec::len).sum();
        topics.clear();
        removed
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.lock();
        f.debug_struct("Registry")
            .field("topic_count", &topics.len())
            .field("registration_count", &topics.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
