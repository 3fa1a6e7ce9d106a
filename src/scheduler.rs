//! Tick-driven cooperative scheduler.
//!
//! The scheduler owns a table of [`Handle`]s and advances every non-paused
//! one once per [`Scheduler::process`] call. It never runs anything on its
//! own: the host engine decides when to tick.

use std::fmt;

use crate::arena::Arena;
use crate::computation::{Computation, Step, Yielded};
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, TaskError};
use crate::handle::{Delivery, Handle, HandleState};
use crate::ids::TaskKey;
use crate::sched_debug_log;
use crate::sink::{ErrorSink, LogErrorSink};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Handles resumed or thrown into.
    pub advanced: usize,
    /// Handles that suspended on a future.
    pub paused: usize,
    /// Handles that returned (Depleted).
    pub completed: usize,
    /// Handles that raised (Failed).
    pub failed: usize,
    /// Handles removed after their cancellation notice.
    pub cancelled: usize,
    /// Non-awaitable yields, each answered with a protocol error next tick.
    pub protocol_errors: usize,
}

impl TickReport {
    pub fn removed(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }

    pub fn is_idle(&self) -> bool {
        self.advanced == 0
    }
}

pub struct Scheduler {
    handles: Arena<Handle>,
    sink: Box<dyn ErrorSink>,
    config: SchedulerConfig,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("label", &self.config.label)
            .field("handles", &self.handles.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Scheduler {
            handles: Arena::with_capacity(config.initial_capacity),
            sink: Box::new(LogErrorSink),
            config,
        }
    }

    /// Replace the sink task failures are reported to.
    pub fn with_error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a computation. It is first advanced on the next tick, never
    /// inside this call.
    pub fn add(&mut self, computation: impl Computation + 'static) -> TaskKey {
        self.add_boxed(Box::new(computation))
    }

    pub fn add_boxed(&mut self, computation: Box<dyn Computation>) -> TaskKey {
        let key = self
            .handles
            .alloc_with(|key| Handle::new(key, computation));
        log::debug!(
            "[{}] added {key} ({} live)",
            self.config.label,
            self.handles.len()
        );
        key
    }

    /// Cancel a registered computation.
    ///
    /// Returns `false` if `key` is unknown, stale, or already terminal
    /// (including a handle still waiting to receive an earlier notice).
    ///
    /// With `notice`, the handle gets exactly one more advancement on the
    /// next tick, during which `notice` is thrown into it; it is removed
    /// afterwards whatever the computation does. Without, the handle is
    /// dropped right away and the computation is never touched again.
    pub fn cancel(&mut self, key: TaskKey, notice: Option<TaskError>) -> bool {
        let Some(handle) = self.handles.get(key) else {
            return false;
        };
        let with_notice = notice.is_some();
        if !handle.cancel(notice) {
            return false;
        }
        if !with_notice {
            self.handles.remove(key);
        }
        log::debug!(
            "[{}] cancelled {key}{}",
            self.config.label,
            if with_notice { " with notice" } else { "" }
        );
        true
    }

    /// Run one tick.
    ///
    /// Every handle that is not paused at the start of the tick is advanced
    /// exactly once; handles that wake up during the tick wait for the next
    /// one. Iteration order across handles is unspecified. Errors raised by
    /// computations are contained here and reported to the error sink; the
    /// `Err` case is reserved for scheduler defects.
    pub fn process(&mut self) -> Result<TickReport, SchedulerError> {
        let snapshot: Vec<TaskKey> = self
            .handles
            .iter()
            .filter(|(_, handle)| handle.is_runnable())
            .map(|(key, _)| key)
            .collect();

        let mut report = TickReport::default();
        let mut finished = Vec::new();
        let mut defect = None;

        for key in snapshot {
            if let Err(err) = self.step(key, &mut report, &mut finished) {
                defect = Some(err);
                break;
            }
        }

        // Runs even when the tick was cut short.
        for key in finished {
            self.handles.remove(key);
        }

        if let Some(err) = defect {
            log::error!("[{}] tick aborted: {err}", self.config.label);
            return Err(err);
        }

        log::trace!(
            "[{}] tick: {report:?}, {} live",
            self.config.label,
            self.handles.len()
        );
        Ok(report)
    }

    /// Advance a single handle from the tick snapshot.
    fn step(
        &mut self,
        key: TaskKey,
        report: &mut TickReport,
        finished: &mut Vec<TaskKey>,
    ) -> Result<(), SchedulerError> {
        let handle = self
            .handles
            .get_mut(key)
            .ok_or_else(|| SchedulerError::stale_key(key))?;
        let cancelling = handle.state() == HandleState::Cancelled;
        let mut notice = None;

        let step = match handle.take_delivery() {
            Delivery::Throw(error) => {
                sched_debug_log!("[{}] throw {} into {key}", self.config.label, error.kind());
                if cancelling {
                    notice = Some(error.clone());
                }
                handle.throw(error)?
            }
            Delivery::Resume(value) => {
                sched_debug_log!(
                    "[{}] resume {key} with {}",
                    self.config.label,
                    value.type_name()
                );
                handle.advance(value)?
            }
        };
        report.advanced += 1;

        if cancelling {
            // Final cleanup step: whatever it produced, the handle goes.
            // Letting the notice itself propagate is not a failure.
            if let Step::Failed(error) = &step {
                let is_notice = notice
                    .as_ref()
                    .is_some_and(|notice| error.is_same_error(notice));
                if !is_notice && !error.is_cancellation() {
                    self.sink.report(key, handle.name(), error);
                }
            }
            report.cancelled += 1;
            finished.push(key);
            return Ok(());
        }

        match step {
            Step::Completed(_) => {
                handle.mark_depleted();
                report.completed += 1;
                finished.push(key);
            }
            Step::Failed(error) => {
                handle.mark_failed();
                self.sink.report(key, handle.name(), &error);
                report.failed += 1;
                finished.push(key);
            }
            Step::Yielded(Yielded::Await(future)) => {
                handle.pause_on(&future);
                report.paused += 1;
            }
            Step::Yielded(Yielded::Value(value)) => {
                log::warn!(
                    "[{}] {key} ({}) yielded a non-awaitable {} value",
                    self.config.label,
                    handle.name(),
                    value.type_name()
                );
                handle.queue_error(TaskError::protocol(format!(
                    "computation yielded a {} value; only futures may be yielded",
                    value.type_name()
                )));
                report.protocol_errors += 1;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, key: TaskKey) -> bool {
        self.handles.contains(key)
    }

    /// Current state of a live handle.
    pub fn state(&self, key: TaskKey) -> Option<HandleState> {
        self.handles.get(key).map(Handle::state)
    }

    pub fn keys(&self) -> Vec<TaskKey> {
        self.handles.keys().collect()
    }

    /// Whether the next tick would advance anything.
    pub fn has_runnable(&self) -> bool {
        self.handles.iter().any(|(_, handle)| handle.is_runnable())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
