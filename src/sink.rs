//! Where task failures go.
//!
//! A failing computation never takes the scheduler down with it; the error
//! is handed to the [`ErrorSink`] injected at construction and the handle is
//! dropped.

use crate::error::TaskError;
use crate::ids::TaskKey;

pub trait ErrorSink: Send + Sync {
    fn report(&self, key: TaskKey, name: &str, error: &TaskError);
}

/// Reports failures through `log::error!`. Used when no sink is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, key: TaskKey, name: &str, error: &TaskError) {
        log::error!("{name} ({key}) failed: {error}");
    }
}

/// Discards failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullErrorSink;

impl ErrorSink for NullErrorSink {
    fn report(&self, _key: TaskKey, _name: &str, _error: &TaskError) {}
}

impl<F> ErrorSink for F
where
    F: Fn(TaskKey, &str, &TaskError) + Send + Sync,
{
    fn report(&self, key: TaskKey, name: &str, error: &TaskError) {
        self(key, name, error)
    }
}
