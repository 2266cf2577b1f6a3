//! Topic-keyed event bus with sync, async, once and transactional dispatch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use courier_config::{AsyncBackend, BusConfig};
use tracing::{debug, trace, warn};

use crate::args::{Args, IntoArgs};
use crate::error::{BusError, BusResult};
use crate::executor::Spawner;
use crate::failure::{DispatchFailure, FailureHook, FailureKind, panic_message};
use crate::handler::{Callback, Handler, IntoHandler};
use crate::registry::{DispatchMode, Registration, Registry, SubscribeOptions, SubscriptionId};
use crate::stats::{BusStats, StatsCounters};
use crate::tracker::{CompletionTracker, PendingGuard};

/// In-process publish/subscribe bus.
///
/// Handlers are registered under string topics and invoked, in registration
/// order, each time the topic is published. Every registration chooses its
/// own dispatch mode:
///
/// - **sync**: runs on the publisher's thread before `publish` moves on,
/// - **async**: runs on the configured backend, concurrently with anything,
/// - **transactional**: async, but never overlapping another invocation of
///   the same registration,
///
/// and may be **once**, in which case it fires a single time and is removed.
///
/// `EventBus` is a handle: clones share one registry. Separate
/// `EventBus::new()` calls give fully independent buses.
///
/// Handler failures (argument mismatches, panics) never reach the publisher.
/// They are logged, counted in [`BusStats`] and passed to the hook installed
/// with [`EventBus::on_failure`].
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    name: String,
    registry: Registry,
    tracker: Arc<CompletionTracker>,
    spawner: Spawner,
    stats: StatsCounters,
    log_failures: bool,
    failure_hook: RwLock<Option<FailureHook>>,
}

impl EventBus {
    /// Create a bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&BusConfig::default())
    }

    /// Create a bus with the given name and default configuration.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_config(&BusConfig::new(name))
    }

    /// Create a bus from configuration.
    ///
    /// With [`AsyncBackend::Auto`] the backend is chosen here: tokio when
    /// called inside a runtime, threads otherwise.
    #[must_use]
    pub fn from_config(config: &BusConfig) -> Self {
        let spawner = Spawner::resolve(config.async_backend, config.effective_thread_prefix());
        debug!(
            bus = %config.name,
            backend = ?spawner.backend(),
            "Event bus created"
        );
        Self {
            inner: Arc::new(BusInner {
                name: config.name.clone(),
                registry: Registry::default(),
                tracker: Arc::new(CompletionTracker::default()),
                spawner,
                stats: StatsCounters::default(),
                log_failures: config.log_failures,
                failure_hook: RwLock::new(None),
            }),
        }
    }

    /// Bus name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Backend that runs asynchronous handlers.
    #[must_use]
    pub fn async_backend(&self) -> AsyncBackend {
        self.inner.spawner.backend()
    }

    /// Install the failure side channel, replacing any previous hook.
    ///
    /// The hook runs on whichever thread observed the failure. A panicking
    /// hook is caught and logged.
    pub fn on_failure<F>(&self, hook: F)
    where
        F: Fn(&DispatchFailure) + Send + Sync + 'static,
    {
        *self
            .inner
            .failure_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Remove the failure hook.
    pub fn clear_failure_hook(&self) {
        *self
            .inner
            .failure_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Subscribe a synchronous handler.
    ///
    /// # Errors
    ///
    /// Infallible for typed handlers; the `Result` matches the other
    /// subscribe calls.
    pub fn subscribe<M, H: IntoHandler<M>>(
        &self,
        topic: &str,
        handler: H,
    ) -> BusResult<SubscriptionId> {
        self.subscribe_with(topic, handler, SubscribeOptions::sync())
    }

    /// Subscribe an asynchronous handler. With `transactional`, invocations
    /// of this registration are serialized.
    ///
    /// # Errors
    ///
    /// See [`EventBus::subscribe`].
    pub fn subscribe_async<M, H: IntoHandler<M>>(
        &self,
        topic: &str,
        handler: H,
        transactional: bool,
    ) -> BusResult<SubscriptionId> {
        self.subscribe_with(topic, handler, SubscribeOptions::asynchronous(transactional))
    }

    /// Subscribe a synchronous handler that fires once.
    ///
    /// # Errors
    ///
    /// See [`EventBus::subscribe`].
    pub fn subscribe_once<M, H: IntoHandler<M>>(
        &self,
        topic: &str,
        handler: H,
    ) -> BusResult<SubscriptionId> {
        self.subscribe_with(topic, handler, SubscribeOptions::sync().once())
    }

    /// Subscribe an asynchronous handler that fires once.
    ///
    /// # Errors
    ///
    /// See [`EventBus::subscribe`].
    pub fn subscribe_once_async<M, H: IntoHandler<M>>(
        &self,
        topic: &str,
        handler: H,
    ) -> BusResult<SubscriptionId> {
        self.subscribe_with(topic, handler, SubscribeOptions::asynchronous(false).once())
    }

    /// Subscribe with explicit options.
    ///
    /// # Errors
    ///
    /// See [`EventBus::subscribe`].
    pub fn subscribe_with<M, H: IntoHandler<M>>(
        &self,
        topic: &str,
        handler: H,
        options: SubscribeOptions,
    ) -> BusResult<SubscriptionId> {
        Ok(self.register(topic, handler.into_callback(), options))
    }

    /// Subscribe a type-erased value.
    ///
    /// The value must be a [`Callback`] or an `Arc<dyn Handler>`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidHandler`] for any other value; the registry
    /// is left unchanged.
    pub fn subscribe_any(
        &self,
        topic: &str,
        value: Box<dyn Any + Send + Sync>,
        options: SubscribeOptions,
    ) -> BusResult<SubscriptionId> {
        let callback = match value.downcast::<Callback>() {
            Ok(callback) => *callback,
            Err(value) => match value.downcast::<Arc<dyn Handler>>() {
                Ok(handler) => Callback::from_arc(*handler),
                Err(_) => {
                    return Err(BusError::InvalidHandler {
                        reason: format!("value subscribed to '{topic}' is not a callable handler"),
                    });
                },
            },
        };
        Ok(self.register(topic, callback, options))
    }

    fn register(
        &self,
        topic: &str,
        callback: Callback,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let handler = callback.name().to_owned();
        let id = self.inner.registry.insert(topic, callback, options);
        debug!(
            bus = %self.inner.name,
            topic,
            subscription = %id,
            handler = %handler,
            mode = ?options.mode,
            once = options.once,
            "Handler subscribed"
        );
        id
    }

    /// Remove the registration `id` from `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSuchHandler`] if the topic has no such
    /// registration; nothing is changed.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> BusResult<()> {
        self.inner.registry.remove(topic, id)?;
        debug!(bus = %self.inner.name, topic, subscription = %id, "Handler unsubscribed");
        Ok(())
    }

    /// Remove the first registration on `topic` whose callback is
    /// `callback` (pointer identity). Returns the removed registration's id.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSuchHandler`] if no registration matches.
    pub fn unsubscribe_callback(
        &self,
        topic: &str,
        callback: &Callback,
    ) -> BusResult<SubscriptionId> {
        let removed = self.inner.registry.remove_callback(topic, callback)?;
        debug!(bus = %self.inner.name, topic, subscription = %removed.id, "Handler unsubscribed");
        Ok(removed.id)
    }

    /// Publish `args` to every handler of `topic`.
    ///
    /// Synchronous handlers have returned when this call returns;
    /// asynchronous ones have been scheduled. Publishing a topic without
    /// handlers does nothing.
    pub fn publish(&self, topic: &str, args: impl IntoArgs) {
        let args = Arc::new(args.into_args());
        StatsCounters::bump(&self.inner.stats.published);

        let snapshot = self.inner.registry.snapshot(topic);
        if snapshot.is_empty() {
            trace!(bus = %self.inner.name, topic, "No handlers for topic");
            return;
        }

        trace!(
            bus = %self.inner.name,
            topic,
            handlers = snapshot.len(),
            args = args.len(),
            "Publishing"
        );

        for registration in snapshot {
            self.inner.dispatch(topic, registration, &args);
        }
    }

    /// Whether `topic` has at least one registration.
    #[must_use]
    pub fn has_callback(&self, topic: &str) -> bool {
        self.inner.registry.has_any(topic)
    }

    /// Number of registrations on `topic`.
    #[must_use]
    pub fn handler_count(&self, topic: &str) -> usize {
        self.inner.registry.count(topic)
    }

    /// Number of registrations across all topics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.total()
    }

    /// Topics with at least one registration, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.inner.registry.topics()
    }

    /// Remove every registration on `topic`. Returns how many were removed.
    pub fn clear_topic(&self, topic: &str) -> usize {
        let removed = self.inner.registry.clear_topic(topic);
        debug!(bus = %self.inner.name, topic, removed, "Topic cleared");
        removed
    }

    /// Remove every registration. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.inner.registry.clear();
        debug!(bus = %self.inner.name, removed, "All handlers cleared");
        removed
    }

    /// Block until every asynchronous dispatch issued so far has finished.
    ///
    /// Calling this from inside an asynchronous handler of the same bus
    /// never returns, since that handler is itself outstanding. From async
    /// code prefer [`EventBus::drain`].
    pub fn wait_async(&self) {
        self.inner.tracker.wait();
    }

    /// Async form of [`EventBus::wait_async`].
    pub async fn drain(&self) {
        self.inner.tracker.wait_async().await;
    }

    /// Asynchronous dispatches scheduled but not yet finished.
    #[must_use]
    pub fn pending_async(&self) -> usize {
        self.inner.tracker.pending()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        self.inner.stats.snapshot()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.inner.name)
            .field("registry", &self.inner.registry)
            .field("spawner", &self.inner.spawner)
            .field("pending_async", &self.inner.tracker.pending())
            .finish_non_exhaustive()
    }
}

impl BusInner {
    fn dispatch(self: &Arc<Self>, topic: &str, registration: Arc<Registration>, args: &Arc<Args>) {
        if let Err(err) = registration.callback.accepts(args) {
            self.report(topic, &registration, FailureKind::ArgumentMismatch(err));
            return;
        }

        if !registration.claim() {
            trace!(
                bus = %self.name,
                topic,
                subscription = %registration.id,
                "Once handler already fired"
            );
            return;
        }

        if registration.options.mode.is_async() {
            // Removed at schedule time so a racing publish cannot see it.
            if registration.options.once {
                self.retire(topic, &registration);
            }
            self.schedule(topic, registration, Arc::clone(args));
        } else {
            StatsCounters::bump(&self.stats.sync_invocations);
            let succeeded = self.invoke(topic, &registration, args);
            if !registration.options.once {
                return;
            }
            if succeeded {
                self.retire(topic, &registration);
            } else {
                // A failed first call does not use up the registration.
                registration.release();
            }
        }
    }

    fn schedule(self: &Arc<Self>, topic: &str, registration: Arc<Registration>, args: Arc<Args>) {
        let task = DispatchTask {
            inner: Arc::clone(self),
            topic: topic.to_owned(),
            registration: Arc::clone(&registration),
            args,
            started: false,
            _pending: self.tracker.begin(),
        };

        StatsCounters::bump(&self.stats.async_scheduled);
        trace!(
            bus = %self.name,
            topic,
            subscription = %registration.id,
            mode = ?registration.options.mode,
            "Scheduling async handler"
        );
        // An unstarted task reports itself as a spawn failure when dropped,
        // which covers both this error and a runtime that discards the job.
        if let Err(e) = self.spawner.spawn(move || task.run()) {
            debug!(
                bus = %self.name,
                topic,
                subscription = %registration.id,
                error = %e,
                "Dispatch thread could not be spawned"
            );
        }
    }

    /// Run the handler, reporting any failure. Returns whether it succeeded.
    fn invoke(&self, topic: &str, registration: &Registration, args: &Args) -> bool {
        trace!(
            bus = %self.name,
            topic,
            subscription = %registration.id,
            handler = %registration.callback.name(),
            "Invoking handler"
        );

        // Catch panics to prevent one handler from affecting the publisher or
        // its siblings.
        let result = panic::catch_unwind(AssertUnwindSafe(|| registration.callback.call(args)));
        let failure = match result {
            Ok(Ok(())) => return true,
            Ok(Err(err)) => FailureKind::ArgumentMismatch(err),
            Err(payload) => FailureKind::Panicked(panic_message(payload.as_ref())),
        };
        self.report(topic, registration, failure);
        false
    }

    fn retire(&self, topic: &str, registration: &Registration) {
        if self.registry.remove(topic, registration.id).is_ok() {
            debug!(
                bus = %self.name,
                topic,
                subscription = %registration.id,
                "Once handler removed"
            );
        }
    }

    fn report(&self, topic: &str, registration: &Registration, kind: FailureKind) {
        let counter = match &kind {
            FailureKind::ArgumentMismatch(_) => &self.stats.argument_mismatches,
            FailureKind::Panicked(_) => &self.stats.panics,
            FailureKind::SpawnFailed(_) => &self.stats.spawn_failures,
        };
        StatsCounters::bump(counter);

        let failure = DispatchFailure {
            topic: topic.to_owned(),
            subscription: registration.id,
            handler: registration.callback.name().to_owned(),
            mode: registration.options.mode,
            kind,
        };

        if self.log_failures {
            warn!(
                target: "courier_events::dispatch",
                bus = %self.name,
                topic,
                subscription = %failure.subscription,
                handler = %failure.handler,
                error = %failure.kind,
                "Handler failed"
            );
        }

        let hook = self
            .failure_hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook
            && panic::catch_unwind(AssertUnwindSafe(|| hook(&failure))).is_err()
        {
            warn!(bus = %self.name, topic, "Failure hook panicked");
        }
    }
}

/// One scheduled asynchronous invocation.
///
/// Holds its pending-count guard, so `wait_async` waits for it. If the
/// backend drops it without running it, the drop is reported as
/// [`FailureKind::SpawnFailed`] before the guard is released.
struct DispatchTask {
    inner: Arc<BusInner>,
    topic: String,
    registration: Arc<Registration>,
    args: Arc<Args>,
    started: bool,
    _pending: PendingGuard,
}

impl DispatchTask {
    fn run(mut self) {
        self.started = true;
        let _serial = (self.registration.options.mode == DispatchMode::Transactional)
            .then(|| self.registration.serial_guard());
        self.inner.invoke(&self.topic, &self.registration, &self.args);
        StatsCounters::bump(&self.inner.stats.async_completed);
    }
}

impl Drop for DispatchTask {
    fn drop(&mut self) {
        if !self.started {
            self.inner.report(
                &self.topic,
                &self.registration,
                FailureKind::SpawnFailed("handler dropped before it ran".to_owned()),
            );
        }
    }
}
