//! Event bus error types.

use std::fmt;

use thiserror::Error;

use crate::registry::SubscriptionId;

/// Errors from event bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The value offered as a handler cannot be invoked.
    #[error("invalid handler: {reason}")]
    InvalidHandler {
        /// Why the value was rejected.
        reason: String,
    },

    /// No matching registration exists for the topic.
    #[error("no such handler on topic '{topic}': {handler}")]
    NoSuchHandler {
        /// Topic that was searched.
        topic: String,
        /// Description of the handle that was not found.
        handler: String,
    },

    /// Published arguments do not fit the handler's parameters.
    #[error("argument mismatch for handler '{handler}': {reason}")]
    ArgumentMismatch {
        /// Name of the handler that rejected the arguments.
        handler: String,
        /// What did not match.
        reason: MismatchReason,
    },
}

impl BusError {
    pub(crate) fn no_such_id(topic: &str, id: SubscriptionId) -> Self {
        Self::NoSuchHandler {
            topic: topic.to_owned(),
            handler: format!("subscription {id}"),
        }
    }
}

/// Detail for [`BusError::ArgumentMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    /// Wrong number of arguments.
    Arity {
        /// Parameters the handler declares.
        expected: usize,
        /// Arguments that were published.
        found: usize,
    },
    /// An argument has the wrong type.
    Type {
        /// Zero-based argument position.
        position: usize,
        /// Parameter type the handler declares.
        expected: &'static str,
        /// Type of the published value.
        found: &'static str,
    },
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arity { expected, found } => {
                write!(f, "expected {expected} argument(s), got {found}")
            },
            Self::Type {
                position,
                expected,
                found,
            } => write!(f, "argument {position} is `{found}`, expected `{expected}`"),
        }
    }
}

/// Result type for event bus operations.
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_display() {
        let err = BusError::ArgumentMismatch {
            handler: "on_order".to_owned(),
            reason: MismatchReason::Type {
                position: 1,
                expected: "alloc::string::String",
                found: "i32",
            },
        };
        assert_eq!(
            err.to_string(),
            "argument mismatch for handler 'on_order': argument 1 is `i32`, expected `alloc::string::String`"
        );

        let arity = MismatchReason::Arity {
            expected: 2,
            found: 0,
        };
        assert_eq!(arity.to_string(), "expected 2 argument(s), got 0");
    }
}
