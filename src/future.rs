//! Capability contract for externally-owned pending results.
//!
//! The scheduler never owns a future. It only registers one completion
//! callback and, once that fires, reads the stored error or result.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::TaskError;
use crate::value::Value;

/// Invoked once the future has resolved, with the future itself.
pub type DoneCallback = Box<dyn FnOnce(&dyn FutureLike) + Send>;

pub type FutureRef = Arc<dyn FutureLike>;
pub type WeakFutureRef = Weak<dyn FutureLike>;

pub trait FutureLike: Send + Sync + fmt::Debug {
    /// Register the completion callback.
    ///
    /// Implementations must invoke it exactly once, including when the
    /// future has already resolved at registration time. It may run on any
    /// thread, possibly before this method returns.
    fn add_done_callback(&self, callback: DoneCallback);

    /// The stored failure, or `None` if the future succeeded.
    fn exception(&self) -> Option<TaskError>;

    /// The stored result. Only meaningful once resolved without an exception.
    fn result(&self) -> Option<Value>;
}

/// Read a resolved future as a `Result`; an exception wins over a result.
pub fn outcome(future: &dyn FutureLike) -> Result<Value, TaskError> {
    match future.exception() {
        Some(error) => Err(error),
        None => Ok(future.result().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualFuture;

    #[test]
    fn test_outcome_prefers_exception() {
        let fut = ManualFuture::new();
        fut.set_exception(TaskError::raised("IOError", "disk"));
        match outcome(&*fut) {
            Err(err) => assert_eq!(err.kind(), "IOError"),
            Ok(v) => panic!("expected error, got {v:?}"),
        }
    }

    #[test]
    fn test_outcome_defaults_missing_result_to_none() {
        let fut = ManualFuture::new();
        fut.set_result(Value::None);
        assert_eq!(outcome(&*fut).ok(), Some(Value::None));
    }
}
