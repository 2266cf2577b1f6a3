//! Object-safe views of the bus, split by role.
//!
//! Code that only publishes can take `&dyn BusPublisher`, code that only
//! registers handlers `&dyn BusSubscriber`, and so on. [`EventBus`]
//! implements all of them.

use crate::args::Args;
use crate::bus::EventBus;
use crate::error::BusResult;
use crate::handler::Callback;
use crate::registry::{SubscribeOptions, SubscriptionId};

/// Registers and removes handlers.
pub trait BusSubscriber: Send + Sync {
    /// Register `callback` under `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidHandler`](crate::BusError::InvalidHandler)
    /// if the implementation rejects the callback.
    fn subscribe_callback(
        &self,
        topic: &str,
        callback: Callback,
        options: SubscribeOptions,
    ) -> BusResult<SubscriptionId>;

    /// Remove a registration.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSuchHandler`](crate::BusError::NoSuchHandler)
    /// if it does not exist.
    fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> BusResult<()>;
}

/// Publishes events.
pub trait BusPublisher: Send + Sync {
    /// Publish an already built argument list.
    fn publish_args(&self, topic: &str, args: Args);
}

/// Inspects registrations and waits for asynchronous work.
pub trait BusController: Send + Sync {
    /// Whether `topic` has at least one registration.
    fn has_callback(&self, topic: &str) -> bool;

    /// Block until all asynchronous dispatches have finished.
    fn wait_async(&self);
}

/// The full bus surface.
pub trait Bus: BusSubscriber + BusPublisher + BusController {}

impl<T: BusSubscriber + BusPublisher + BusController> Bus for T {}

impl BusSubscriber for EventBus {
    fn subscribe_callback(
        &self,
        topic: &str,
        callback: Callback,
        options: SubscribeOptions,
    ) -> BusResult<SubscriptionId> {
        self.subscribe_with(topic, callback, options)
    }

    fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> BusResult<()> {
        EventBus::unsubscribe(self, topic, id)
    }
}

impl BusPublisher for EventBus {
    fn publish_args(&self, topic: &str, args: Args) {
        self.publish(topic, args);
    }
}

impl BusController for EventBus {
    fn has_callback(&self, topic: &str) -> bool {
        EventBus::has_callback(self, topic)
    }

    fn wait_async(&self) {
        EventBus::wait_async(self);
    }
}
