//! Per-computation state holder.
//!
//! The computation itself is owned by the [`Handle`] and only ever touched by
//! the tick loop. Everything a future's completion callback may change lives
//! in a separately locked slot, because that callback can fire on any thread
//! while a tick is running.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::computation::{Computation, Step};
use crate::error::{SchedulerError, TaskError};
use crate::future::{outcome, DoneCallback, FutureLike, FutureRef, WeakFutureRef};
use crate::ids::TaskKey;
use crate::sched_debug_log;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleState {
    Active,
    Paused,
    Depleted,
    Failed,
    Cancelled,
}

impl HandleState {
    /// Depleted, Failed and Cancelled only exist inside the tick (or cancel
    /// call) that produced them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandleState::Depleted | HandleState::Failed | HandleState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandleState::Active => "active",
            HandleState::Paused => "paused",
            HandleState::Depleted => "depleted",
            HandleState::Failed => "failed",
            HandleState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the next advancement feeds into the computation.
#[derive(Debug)]
pub enum Delivery {
    Resume(Value),
    Throw(TaskError),
}

#[derive(Debug)]
struct HandleSlot {
    state: HandleState,
    pending_error: Option<TaskError>,
    resume_value: Option<Value>,
    // Set iff state == Paused.
    pending_future: Option<WeakFutureRef>,
    // Bumped on every pause; a callback carrying an older epoch is stale.
    pause_epoch: u64,
}

pub struct Handle {
    key: TaskKey,
    computation: Box<dyn Computation>,
    slot: Arc<Mutex<HandleSlot>>,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("key", &self.key)
            .field("name", &self.computation.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Handle {
    pub fn new(key: TaskKey, computation: Box<dyn Computation>) -> Self {
        Handle {
            key,
            computation,
            slot: Arc::new(Mutex::new(HandleSlot {
                state: HandleState::Active,
                pending_error: None,
                resume_value: None,
                pending_future: None,
                pause_epoch: 0,
            })),
        }
    }

    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn name(&self) -> &str {
        self.computation.name()
    }

    pub fn state(&self) -> HandleState {
        self.slot.lock().state
    }

    /// Eligible for the next tick snapshot.
    pub fn is_runnable(&self) -> bool {
        self.state() != HandleState::Paused
    }

    /// The future this handle is paused on, if it is still alive.
    pub fn pending_future(&self) -> Option<FutureRef> {
        self.slot
            .lock()
            .pending_future
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn has_pending_error(&self) -> bool {
        self.slot.lock().pending_error.is_some()
    }

    /// Consume whatever is queued for the next advancement. A queued error
    /// takes precedence and discards any queued resume value.
    pub fn take_delivery(&self) -> Delivery {
        let mut slot = self.slot.lock();
        match slot.pending_error.take() {
            Some(error) => {
                slot.resume_value = None;
                Delivery::Throw(error)
            }
            None => Delivery::Resume(slot.resume_value.take().unwrap_or_default()),
        }
    }

    /// Drive the computation one step with `value`.
    pub fn advance(&mut self, value: Value) -> Result<Step, SchedulerError> {
        let state = self.state();
        if state != HandleState::Active {
            return Err(SchedulerError::invalid_state(self.key, state, "advance"));
        }
        // The slot lock is not held while user code runs: the computation may
        // resolve futures whose callbacks lock this very slot.
        Ok(self.computation.resume(value))
    }

    /// Raise `error` inside the computation. Also used for the final
    /// cleanup step of a handle cancelled with notice.
    pub fn throw(&mut self, error: TaskError) -> Result<Step, SchedulerError> {
        let state = self.state();
        if !matches!(state, HandleState::Active | HandleState::Cancelled) {
            return Err(SchedulerError::invalid_state(self.key, state, "throw into"));
        }
        Ok(self.computation.throw(error))
    }

    /// Queue an error for the next advancement without changing state.
    pub fn queue_error(&self, error: TaskError) {
        self.slot.lock().pending_error = Some(error);
    }

    pub fn mark_depleted(&self) {
        self.slot.lock().state = HandleState::Depleted;
    }

    pub fn mark_failed(&self) {
        self.slot.lock().state = HandleState::Failed;
    }

    /// Move to Cancelled. Returns `false` if the handle is already terminal.
    ///
    /// `notice` becomes the error thrown on the final advancement; `None`
    /// means the caller drops the handle without touching the computation.
    pub fn cancel(&self, notice: Option<TaskError>) -> bool {
        let mut slot = self.slot.lock();
        if slot.state.is_terminal() {
            return false;
        }
        slot.state = HandleState::Cancelled;
        slot.pending_future = None;
        slot.resume_value = None;
        slot.pending_error = notice;
        true
    }

    /// Pause on `future` and register the completion callback that will
    /// reactivate this handle.
    pub fn pause_on(&self, future: &FutureRef) {
        let epoch = {
            let mut slot = self.slot.lock();
            slot.state = HandleState::Paused;
            slot.pending_future = Some(Arc::downgrade(future));
            slot.pause_epoch += 1;
            slot.pause_epoch
        };
        // Registered after the lock is released: the future may invoke the
        // callback before `add_done_callback` returns.
        future.add_done_callback(self.completion_callback(epoch));
    }

    fn completion_callback(&self, epoch: u64) -> DoneCallback {
        let key = self.key;
        let slot = Arc::downgrade(&self.slot);
        Box::new(move |future: &dyn FutureLike| {
            // Handle already removed from the table.
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let resolved = outcome(future);
            if !wake(&slot, epoch, resolved) {
                sched_debug_log!("ignoring stale completion for {key} (epoch {epoch})");
            }
        })
    }
}

/// Paused → Active, stashing the future's outcome. Returns `false` when the
/// handle has since moved on (cancelled, or paused on a later future).
fn wake(slot: &Mutex<HandleSlot>, epoch: u64, resolved: Result<Value, TaskError>) -> bool {
    let mut slot = slot.lock();
    if slot.state != HandleState::Paused || slot.pause_epoch != epoch {
        return false;
    }
    slot.state = HandleState::Active;
    slot.pending_future = None;
    match resolved {
        Ok(value) => slot.resume_value = Some(value),
        Err(error) => slot.pending_error = Some(error),
    }
    true
}
