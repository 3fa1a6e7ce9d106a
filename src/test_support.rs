//! Hand-resolved future and recording computations shared by unit tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::computation::{Computation, Step};
use crate::error::TaskError;
use crate::future::{DoneCallback, FutureLike, FutureRef};
use crate::value::Value;

#[derive(Default)]
struct ManualState {
    outcome: Option<Result<Value, TaskError>>,
    callbacks: Vec<DoneCallback>,
}

/// Future resolved by the test body. Callbacks fire synchronously inside
/// `set_result`/`set_exception`, or inside `add_done_callback` when already
/// resolved.
pub struct ManualFuture {
    state: Mutex<ManualState>,
}

impl std::fmt::Debug for ManualFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualFuture")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl ManualFuture {
    pub fn new() -> Arc<Self> {
        Arc::new(ManualFuture {
            state: Mutex::new(ManualState::default()),
        })
    }

    pub fn set_result(&self, value: Value) {
        self.resolve(Ok(value));
    }

    pub fn set_exception(&self, error: TaskError) {
        self.resolve(Err(error));
    }

    pub fn is_resolved(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.state.lock().callbacks.len()
    }

    fn resolve(&self, outcome: Result<Value, TaskError>) {
        let callbacks = {
            let mut state = self.state.lock();
            state.outcome = Some(outcome);
            std::mem::take(&mut state.callbacks)
        };
        for callback in callbacks {
            callback(self);
        }
    }
}

impl FutureLike for ManualFuture {
    fn add_done_callback(&self, callback: DoneCallback) {
        let mut state = self.state.lock();
        if state.outcome.is_some() {
            drop(state);
            callback(self);
        } else {
            state.callbacks.push(callback);
        }
    }

    fn exception(&self) -> Option<TaskError> {
        match &self.state.lock().outcome {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    fn result(&self) -> Option<Value> {
        match &self.state.lock().outcome {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Every input a scripted computation received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Value(Value),
    Error(String),
}

pub type Log = Arc<Mutex<Vec<Received>>>;

/// Plays back a fixed list of steps, recording every input.
pub struct Scripted {
    steps: std::vec::IntoIter<Step>,
    log: Log,
}

impl Scripted {
    pub fn new(steps: Vec<Step>) -> (Self, Log) {
        let log: Log = Arc::default();
        (
            Scripted {
                steps: steps.into_iter(),
                log: log.clone(),
            },
            log,
        )
    }

    fn next_step(&mut self) -> Step {
        self.steps
            .next()
            .unwrap_or_else(|| Step::Completed(Value::None))
    }
}

impl Computation for Scripted {
    fn resume(&mut self, value: Value) -> Step {
        self.log.lock().push(Received::Value(value));
        self.next_step()
    }

    fn throw(&mut self, error: TaskError) -> Step {
        self.log.lock().push(Received::Error(error.kind().to_string()));
        self.next_step()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn await_step(future: &Arc<ManualFuture>) -> Step {
    let future: FutureRef = future.clone();
    Step::await_future(future)
}
