//! Reporting of isolated per-handler failures.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::BusError;
use crate::registry::{DispatchMode, SubscriptionId};

/// What went wrong inside one handler dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The published arguments did not fit the handler.
    ArgumentMismatch(BusError),
    /// The handler panicked; carries the panic message.
    Panicked(String),
    /// The async task could not be started.
    SpawnFailed(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentMismatch(err) => err.fmt(f),
            Self::Panicked(message) => write!(f, "handler panicked: {message}"),
            Self::SpawnFailed(message) => write!(f, "failed to schedule handler: {message}"),
        }
    }
}

/// A failed dispatch, delivered to the failure hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    /// Topic that was published.
    pub topic: String,
    /// Registration that failed.
    pub subscription: SubscriptionId,
    /// Handler name.
    pub handler: String,
    /// How the handler was dispatched.
    pub mode: DispatchMode,
    /// Failure detail.
    pub kind: FailureKind,
}

/// Side channel for dispatch failures.
pub type FailureHook = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
