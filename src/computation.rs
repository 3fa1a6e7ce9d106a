//! The computation protocol driven by the scheduler.
//!
//! A computation is resumed with a value or has an error thrown into it, and
//! answers with a [`Step`]: it either yields, finishes, or fails. Yielding a
//! [`Yielded::Await`] is the only way to suspend; yielding a plain value is a
//! protocol violation that the scheduler reports back to the computation.

use std::borrow::Cow;
use std::fmt;

use crate::error::TaskError;
use crate::future::FutureRef;
use crate::value::Value;

pub trait Computation: Send {
    /// Run until the next yield, return or raise. The first call receives
    /// `Value::None`.
    fn resume(&mut self, value: Value) -> Step;

    /// Raise `error` at the current suspension point.
    fn throw(&mut self, error: TaskError) -> Step;

    fn name(&self) -> &str {
        "computation"
    }
}

impl fmt::Debug for dyn Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("name", &self.name())
            .finish()
    }
}

#[derive(Debug)]
pub enum Step {
    Yielded(Yielded),
    Completed(Value),
    Failed(TaskError),
}

/// What a computation hands back when it suspends.
#[derive(Debug, Clone)]
pub enum Yielded {
    Value(Value),
    Await(FutureRef),
}

impl Step {
    pub fn await_future(future: FutureRef) -> Self {
        Step::Yielded(Yielded::Await(future))
    }

    pub fn yield_value(value: impl Into<Value>) -> Self {
        Step::Yielded(Yielded::Value(value.into()))
    }

    pub fn complete(value: impl Into<Value>) -> Self {
        Step::Completed(value.into())
    }

    pub fn fail(error: TaskError) -> Self {
        Step::Failed(error)
    }
}

/// Input delivered to a closure-backed computation.
#[derive(Debug, Clone)]
pub enum Resume {
    Value(Value),
    Error(TaskError),
}

impl Resume {
    pub fn into_result(self) -> Result<Value, TaskError> {
        match self {
            Resume::Value(value) => Ok(value),
            Resume::Error(error) => Err(error),
        }
    }
}

/// Computation backed by a `FnMut(Resume) -> Step` state machine.
pub struct FnComputation<F> {
    name: Cow<'static, str>,
    step: F,
}

pub fn from_fn<F>(step: F) -> FnComputation<F>
where
    F: FnMut(Resume) -> Step + Send,
{
    FnComputation {
        name: Cow::Borrowed("fn"),
        step,
    }
}

impl<F> FnComputation<F> {
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Computation for FnComputation<F>
where
    F: FnMut(Resume) -> Step + Send,
{
    fn resume(&mut self, value: Value) -> Step {
        (self.step)(Resume::Value(value))
    }

    fn throw(&mut self, error: TaskError) -> Step {
        (self.step)(Resume::Error(error))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Computation that runs a closure to completion on its first advancement.
pub struct Once<F> {
    body: Option<F>,
}

pub fn once<F>(body: F) -> Once<F>
where
    F: FnOnce() -> Result<Value, TaskError> + Send,
{
    Once { body: Some(body) }
}

impl<F> Computation for Once<F>
where
    F: FnOnce() -> Result<Value, TaskError> + Send,
{
    fn resume(&mut self, _value: Value) -> Step {
        match self.body.take() {
            Some(body) => match body() {
                Ok(value) => Step::Completed(value),
                Err(error) => Step::Failed(error),
            },
            None => Step::Failed(TaskError::protocol("one-shot computation resumed twice")),
        }
    }

    fn throw(&mut self, error: TaskError) -> Step {
        // Never started: nothing can catch it.
        self.body = None;
        Step::Failed(error)
    }

    fn name(&self) -> &str {
        "once"
    }
}
