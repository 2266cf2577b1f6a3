//! Courier Events - in-process publish/subscribe bus.
//!
//! This crate provides:
//! - A topic registry mapping string topics to ordered handler lists
//! - Synchronous, asynchronous and transactional (serialized) dispatch
//! - One-shot registrations
//! - Dynamically typed arguments checked per handler at publish time
//! - A completion barrier for asynchronous work
//!
//! # Architecture
//!
//! Handlers are registered on an [`EventBus`] under a topic and receive the
//! arguments of every publish of that topic. Any closure or function with up
//! to eight `Clone + Send + Sync + 'static` parameters is a handler; so is
//! any type implementing [`Handler`].
//!
//! Publishing snapshots the topic's registrations and releases the registry
//! lock before running anything, so handlers may freely subscribe,
//! unsubscribe or publish on the same bus.
//!
//! Asynchronous handlers run on tokio's blocking pool when the bus is built
//! inside a runtime and on dedicated threads otherwise (see
//! [`courier_config::AsyncBackend`]). [`EventBus::wait_async`] blocks until
//! all of them finish; [`EventBus::drain`] does the same from async code.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use courier_events::EventBus;
//!
//! let bus = EventBus::new();
//! let total = Arc::new(AtomicU64::new(0));
//!
//! let sink = Arc::clone(&total);
//! bus.subscribe_async("payment", move |amount: u64, _currency: String| {
//!     sink.fetch_add(amount, Ordering::SeqCst);
//! }, true)
//! .unwrap();
//!
//! bus.publish("payment", (20_u64, "EUR".to_string()));
//! bus.publish("payment", (22_u64, "EUR".to_string()));
//! bus.wait_async();
//!
//! assert_eq!(total.load(Ordering::SeqCst), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod args;
mod bus;
mod error;
mod executor;
mod failure;
mod handler;
mod registry;
mod stats;
mod tracker;
mod traits;

pub use args::{Arg, Args, IntoArgs};
pub use bus::EventBus;
pub use error::{BusError, BusResult, MismatchReason};
pub use failure::{DispatchFailure, FailureHook, FailureKind};
pub use handler::{Callback, FnHandler, Handler, IntoHandler};
#[doc(hidden)]
pub use handler::{CallbackMarker, HandlerMarker, SharedMarker};
pub use registry::{DispatchMode, SubscribeOptions, SubscriptionId};
pub use stats::BusStats;
pub use traits::{Bus, BusController, BusPublisher, BusSubscriber};

pub use courier_config::{AsyncBackend, BusConfig};
