//! Courier Telemetry - logging setup for applications embedding the bus.
//!
//! The bus crates only emit `tracing` events. This crate installs the
//! subscriber that renders them:
//! - Level and per-target directives through `EnvFilter`
//! - Pretty, compact, full or JSON output on stdout or stderr
//! - Conversion from the file-based `[logging]` section (feature `config`)
//!
//! # Example
//!
//! ```rust,no_run
//! use courier_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), courier_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("courier_events=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
