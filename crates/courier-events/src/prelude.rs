//! Prelude module - commonly used types for convenient import.
//!
//! Use `use courier_events::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use courier_events::prelude::*;
//!
//! let bus = EventBus::new();
//! bus.subscribe("order.created", |id: u64| println!("order {id}")).unwrap();
//! bus.publish("order.created", (42_u64,));
//! ```

// Event bus
pub use crate::{EventBus, SubscribeOptions, SubscriptionId, DispatchMode};

// Handlers and arguments
pub use crate::{Arg, Args, Callback, Handler, IntoArgs, IntoHandler};

// Capability traits
pub use crate::{Bus, BusController, BusPublisher, BusSubscriber};

// Errors and failure reporting
pub use crate::{BusError, BusResult, DispatchFailure, FailureKind};
