//! doeff-coro: tick-driven cooperative coroutine scheduler.
//!
//! A host engine registers computations with [`Scheduler::add`] and calls
//! [`Scheduler::process`] at whatever cadence it likes. Each tick advances
//! every computation that is not waiting on a future; a computation waits by
//! yielding [`Yielded::Await`], and the future's completion callback (which
//! may fire on any thread) makes it runnable again with the future's result
//! or error.
//!
//! # Architecture
//!
//! - **Generation-checked arena**: handles live in slots; [`TaskKey`]s go
//!   stale when their handle is removed
//! - **Per-handle locked slot**: the only state the completion callback
//!   touches
//! - **Contained failures**: task errors go to an injected [`ErrorSink`],
//!   never out of `process()`
//! - **Python bridge** (feature `python_bridge`): generators and
//!   `add_done_callback` futures

pub mod arena;
pub mod computation;
pub mod config;
pub mod error;
pub mod future;
pub mod handle;
pub mod ids;
mod logging;
#[cfg(feature = "python_bridge")]
pub mod py_shared;
#[cfg(feature = "python_bridge")]
pub mod python;
pub mod scheduler;
pub mod sink;
#[cfg(test)]
mod test_support;
pub mod value;

// Re-exports for convenience
pub use arena::Arena;
pub use computation::{from_fn, once, Computation, FnComputation, Once, Resume, Step, Yielded};
pub use config::SchedulerConfig;
pub use error::{SchedulerError, TaskError};
pub use future::{outcome, DoneCallback, FutureLike, FutureRef, WeakFutureRef};
pub use handle::{Handle, HandleState};
pub use ids::TaskKey;
#[cfg(feature = "python_bridge")]
pub use py_shared::PyShared;
#[cfg(feature = "python_bridge")]
pub use python::{PyFuture, PyGenerator, PyTickScheduler};
pub use scheduler::{Scheduler, TickReport};
pub use sink::{ErrorSink, LogErrorSink, NullErrorSink};
pub use value::Value;
