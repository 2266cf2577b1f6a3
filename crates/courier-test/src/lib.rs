//! Courier Test - shared test utilities for the Courier crates.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! courier-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use courier_test::{CallLog, OverlapGauge, init_test_tracing};
//!
//! #[test]
//! fn test_handlers_never_overlap() {
//!     init_test_tracing();
//!     let gauge = OverlapGauge::new();
//!     // ... run handlers that call `gauge.enter()` ...
//!     assert_eq!(gauge.max(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod concurrency;
pub mod fixtures;

pub use concurrency::*;
pub use fixtures::*;
