//! Error types for the scheduler.
//!
//! [`TaskError`] is what flows *into* computations (thrown at their
//! suspension point) and out of them when they fail. [`SchedulerError`] is
//! reserved for defects in the scheduler's own bookkeeping; task errors never
//! surface as one.

use thiserror::Error;

use crate::handle::HandleState;
use crate::ids::TaskKey;
#[cfg(feature = "python_bridge")]
use crate::py_shared::PyShared;

#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Delivered by `cancel(key, Some(..))` for the computation's cleanup step.
    #[error("cancelled: {message}")]
    Cancelled { message: String },
    /// The computation yielded something that is not awaitable.
    #[error("protocol error: {message}")]
    Protocol { message: String },
    /// Raised by a computation or carried by a failed future.
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },
    /// A live Python exception object.
    #[cfg(feature = "python_bridge")]
    #[error("{message}")]
    Python { exception: PyShared, message: String },
}

impl TaskError {
    pub fn cancelled(message: impl Into<String>) -> Self {
        TaskError::Cancelled {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        TaskError::Protocol {
            message: message.into(),
        }
    }

    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        TaskError::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    #[cfg(feature = "python_bridge")]
    pub fn python(exception: PyShared, message: impl Into<String>) -> Self {
        TaskError::Python {
            exception,
            message: message.into(),
        }
    }

    /// Error class name, in the spirit of an exception type.
    pub fn kind(&self) -> &str {
        match self {
            TaskError::Cancelled { .. } => "Cancelled",
            TaskError::Protocol { .. } => "ProtocolError",
            TaskError::Raised { kind, .. } => kind,
            #[cfg(feature = "python_bridge")]
            TaskError::Python { .. } => "PythonException",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TaskError::Cancelled { message }
            | TaskError::Protocol { message }
            | TaskError::Raised { message, .. } => message,
            #[cfg(feature = "python_bridge")]
            TaskError::Python { message, .. } => message,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Cancelled { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, TaskError::Protocol { .. })
    }

    /// Whether `other` is this very error rather than a new one: the same
    /// Python exception object, or the same variant, kind and message.
    pub fn is_same_error(&self, other: &TaskError) -> bool {
        match (self, other) {
            #[cfg(feature = "python_bridge")]
            (TaskError::Python { exception: a, .. }, TaskError::Python { exception: b, .. }) => {
                a.ptr_eq(b)
            }
            _ => {
                std::mem::discriminant(self) == std::mem::discriminant(other)
                    && self.kind() == other.kind()
                    && self.message() == other.message()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("cannot {operation} {key} while it is {state}")]
    InvalidState {
        key: TaskKey,
        state: HandleState,
        operation: &'static str,
    },
    #[error("task key {key} does not refer to a live handle")]
    StaleKey { key: TaskKey },
}

impl SchedulerError {
    pub fn invalid_state(key: TaskKey, state: HandleState, operation: &'static str) -> Self {
        SchedulerError::InvalidState {
            key,
            state,
            operation,
        }
    }

    pub fn stale_key(key: TaskKey) -> Self {
        SchedulerError::StaleKey { key }
    }
}
