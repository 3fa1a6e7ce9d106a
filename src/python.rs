//! PyO3 bridge: Python generators as computations, Python futures as
//! [`FutureLike`] values, and a `TickScheduler` class for Python hosts.
//!
//! A yielded Python object counts as awaitable when it has an
//! `add_done_callback` attribute, which covers both `asyncio.Future` and
//! `concurrent.futures.Future`.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use pyo3::exceptions::asyncio::CancelledError;
use pyo3::exceptions::{PyRuntimeError, PyStopIteration};
use pyo3::prelude::*;
use pyo3::types::{PyCFunction, PyDict, PyTuple};

use crate::computation::{Computation, Step, Yielded};
use crate::config::SchedulerConfig;
use crate::error::TaskError;
use crate::future::{DoneCallback, FutureLike};
use crate::ids::TaskKey;
use crate::py_shared::PyShared;
use crate::scheduler::Scheduler;
use crate::value::Value;

/// "TypeName: message", or just the type name for an empty message.
fn describe_exception(exc: &Bound<'_, PyAny>) -> String {
    let kind = exc
        .get_type()
        .qualname()
        .map(|name| name.to_string())
        .unwrap_or_else(|_| "Exception".to_string());
    match exc.str() {
        Ok(message) if !message.to_string().is_empty() => format!("{kind}: {message}"),
        _ => kind,
    }
}

fn exception_to_task_error(exc: &Bound<'_, PyAny>) -> TaskError {
    TaskError::python(PyShared::new(exc.clone().unbind()), describe_exception(exc))
}

fn pyerr_to_task_error(py: Python<'_>, err: PyErr) -> TaskError {
    exception_to_task_error(err.value(py).as_any())
}

fn task_error_to_pyerr(py: Python<'_>, error: &TaskError) -> PyErr {
    match error {
        TaskError::Python { exception, .. } => PyErr::from_value(exception.bind(py).clone()),
        TaskError::Cancelled { message } => CancelledError::new_err(message.clone()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

fn is_awaitable(obj: &Bound<'_, PyAny>) -> bool {
    obj.hasattr("add_done_callback").unwrap_or(false)
}

/// A Python generator driven through `send`/`throw`.
pub struct PyGenerator {
    generator: PyShared,
    name: String,
}

impl fmt::Debug for PyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyGenerator")
            .field("name", &self.name)
            .finish()
    }
}

impl PyGenerator {
    pub fn new(generator: &Bound<'_, PyAny>) -> PyResult<Self> {
        if !generator.hasattr("send")? || !generator.hasattr("throw")? {
            return Err(pyo3::exceptions::PyTypeError::new_err(
                "expected a generator (an object with send() and throw())",
            ));
        }
        let name = generator
            .getattr("__qualname__")
            .and_then(|name| name.extract::<String>())
            .unwrap_or_else(|_| "generator".to_string());
        Ok(PyGenerator {
            generator: PyShared::new(generator.clone().unbind()),
            name,
        })
    }

    fn interpret(py: Python<'_>, outcome: PyResult<Bound<'_, PyAny>>) -> Step {
        match outcome {
            Ok(yielded) if is_awaitable(&yielded) => Step::await_future(Arc::new(PyFuture::new(
                PyShared::new(yielded.unbind()),
            ))),
            Ok(yielded) => Step::Yielded(Yielded::Value(Value::from_pyobject(&yielded))),
            Err(err) if err.is_instance_of::<PyStopIteration>(py) => {
                let value = err
                    .value(py)
                    .getattr("value")
                    .map(|value| Value::from_pyobject(&value))
                    .unwrap_or_default();
                Step::Completed(value)
            }
            Err(err) => Step::Failed(pyerr_to_task_error(py, err)),
        }
    }
}

impl Computation for PyGenerator {
    fn resume(&mut self, value: Value) -> Step {
        Python::attach(|py| {
            let arg = match value.to_pyobject(py) {
                Ok(arg) => arg,
                Err(err) => return Step::Failed(pyerr_to_task_error(py, err)),
            };
            let outcome = self.generator.bind(py).call_method1("send", (arg,));
            Self::interpret(py, outcome)
        })
    }

    fn throw(&mut self, error: TaskError) -> Step {
        Python::attach(|py| {
            let exc = task_error_to_pyerr(py, &error).into_value(py);
            let outcome = self.generator.bind(py).call_method1("throw", (exc,));
            Self::interpret(py, outcome)
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Any Python object exposing `add_done_callback`, `exception` and `result`.
#[derive(Clone)]
pub struct PyFuture {
    future: PyShared,
}

impl fmt::Debug for PyFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyFuture").finish_non_exhaustive()
    }
}

impl PyFuture {
    pub fn new(future: PyShared) -> Self {
        PyFuture { future }
    }
}

impl FutureLike for PyFuture {
    fn add_done_callback(&self, callback: DoneCallback) {
        // Python only knows `Fn`; the slot makes the callback single-shot.
        let slot = Arc::new(Mutex::new(Some(callback)));
        let registered = Python::attach(|py| {
            let target = self.clone();
            let hook_slot = Arc::clone(&slot);
            PyCFunction::new_closure(
                py,
                None,
                None,
                move |_args: &Bound<'_, PyTuple>,
                      _kwargs: Option<&Bound<'_, PyDict>>|
                      -> PyResult<()> {
                    if let Some(callback) = hook_slot.lock().take() {
                        callback(&target);
                    }
                    Ok(())
                },
            )
            .and_then(|hook| self.future.bind(py).call_method1("add_done_callback", (hook,)))
            .map(|_| ())
            .map_err(|err| pyerr_to_task_error(py, err))
        });
        if let Err(error) = registered {
            log::warn!("failed to register completion callback on Python future: {error}");
            // The future will never call back, so the failure is what resumes the waiter.
            if let Some(callback) = slot.lock().take() {
                callback(&RegistrationFailed(error));
            }
        }
    }

    fn exception(&self) -> Option<TaskError> {
        Python::attach(|py| match self.future.bind(py).call_method0("exception") {
            Ok(exc) if exc.is_none() => None,
            Ok(exc) => Some(exception_to_task_error(&exc)),
            // asyncio raises CancelledError from exception() on a cancelled future.
            Err(err) => Some(pyerr_to_task_error(py, err)),
        })
    }

    fn result(&self) -> Option<Value> {
        Python::attach(|py| {
            self.future
                .bind(py)
                .call_method0("result")
                .ok()
                .map(|value| Value::from_pyobject(&value))
        })
    }
}

/// Stands in for a Python future whose `add_done_callback` raised.
#[derive(Debug)]
struct RegistrationFailed(TaskError);

impl FutureLike for RegistrationFailed {
    fn add_done_callback(&self, callback: DoneCallback) {
        callback(self);
    }

    fn exception(&self) -> Option<TaskError> {
        Some(self.0.clone())
    }

    fn result(&self) -> Option<Value> {
        None
    }
}

/// `exc_type()`, wrapped as the notice thrown by `TickScheduler.cancel`.
fn cancel_notice(exc_type: &Bound<'_, PyAny>) -> PyResult<TaskError> {
    Ok(exception_to_task_error(&exc_type.call0()?))
}

/// Python-facing scheduler: `add(gen)`, `cancel(key, exc_type=None)`,
/// `process()`.
#[pyclass(name = "TickScheduler", module = "doeff_coro")]
pub struct PyTickScheduler {
    inner: Mutex<Scheduler>,
}

impl PyTickScheduler {
    fn scheduler(&self) -> PyResult<MutexGuard<'_, Scheduler>> {
        self.inner.try_lock().ok_or_else(|| {
            PyRuntimeError::new_err("TickScheduler is busy (called from inside a running tick?)")
        })
    }
}

#[pymethods]
impl PyTickScheduler {
    #[new]
    #[pyo3(signature = (label = None))]
    fn new(label: Option<String>) -> Self {
        let mut config = SchedulerConfig::default();
        if let Some(label) = label {
            config = config.with_label(label);
        }
        PyTickScheduler {
            inner: Mutex::new(Scheduler::with_config(config)),
        }
    }

    /// Register a generator; returns its integer key.
    fn add(&self, generator: &Bound<'_, PyAny>) -> PyResult<u64> {
        let computation = PyGenerator::new(generator)?;
        Ok(self.scheduler()?.add(computation).to_raw())
    }

    /// With `exc_type`, `exc_type()` is thrown into the generator on the
    /// next tick before it is removed.
    #[pyo3(signature = (key, exc_type = None))]
    fn cancel(&self, key: u64, exc_type: Option<&Bound<'_, PyAny>>) -> PyResult<bool> {
        let notice = match exc_type {
            Some(exc_type) => Some(cancel_notice(exc_type)?),
            None => None,
        };
        Ok(self.scheduler()?.cancel(TaskKey::from_raw(key), notice))
    }

    /// Run one tick; returns how many generators were advanced.
    fn process(&self) -> PyResult<usize> {
        let report = self
            .scheduler()?
            .process()
            .map_err(|err| PyRuntimeError::new_err(err.to_string()))?;
        Ok(report.advanced)
    }

    fn __len__(&self) -> PyResult<usize> {
        Ok(self.scheduler()?.len())
    }

    fn __contains__(&self, key: u64) -> PyResult<bool> {
        Ok(self.scheduler()?.contains(TaskKey::from_raw(key)))
    }
}

#[pymodule]
pub fn doeff_coro(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTickScheduler>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pyo3::types::PyDict;

    use super::*;

    fn run_fixture<'py>(py: Python<'py>, code: &std::ffi::CStr) -> Bound<'py, PyDict> {
        let locals = PyDict::new(py);
        py.run(code, Some(&locals), Some(&locals))
            .expect("failed to define generator test fixtures");
        locals
    }

    fn local<'py>(locals: &Bound<'py, PyDict>, name: &str) -> Bound<'py, PyAny> {
        locals
            .get_item(name)
            .expect("locals.get_item failed")
            .expect("fixture missing")
    }

    #[test]
    fn test_generator_awaits_python_future_and_receives_result() {
        Python::initialize();
        Python::attach(|py| {
            let locals = run_fixture(
                py,
                c"import concurrent.futures\nfut = concurrent.futures.Future()\nseen = []\ndef _gen():\n    value = yield fut\n    seen.append(value)\n    return value\ngen = _gen()\n",
            );
            let mut sched = Scheduler::new();
            let key = sched.add(PyGenerator::new(&local(&locals, "gen")).unwrap());

            for _ in 0..3 {
                sched.process().unwrap();
            }
            assert!(sched.contains(key));

            local(&locals, "fut")
                .call_method1("set_result", (41,))
                .unwrap();
            let report = sched.process().unwrap();
            assert_eq!(report.completed, 1);

            let seen: Vec<i64> = local(&locals, "seen").extract().unwrap();
            assert_eq!(seen, vec![41]);
        });
    }

    #[test]
    fn test_plain_yield_is_thrown_back_as_runtime_error() {
        Python::initialize();
        Python::attach(|py| {
            let locals = run_fixture(
                py,
                c"caught = []\ndef _gen():\n    try:\n        yield 5\n    except RuntimeError as e:\n        caught.append(str(e))\ngen = _gen()\n",
            );
            let mut sched = Scheduler::new();
            let key = sched.add(PyGenerator::new(&local(&locals, "gen")).unwrap());

            assert_eq!(sched.process().unwrap().protocol_errors, 1);
            assert!(sched.contains(key));
            assert_eq!(sched.process().unwrap().completed, 1);

            let caught: Vec<String> = local(&locals, "caught").extract().unwrap();
            assert_eq!(caught.len(), 1);
            assert!(caught[0].contains("protocol error"));
        });
    }

    #[test]
    fn test_future_exception_raised_at_yield_point() {
        Python::initialize();
        Python::attach(|py| {
            let locals = run_fixture(
                py,
                c"import concurrent.futures\nfut = concurrent.futures.Future()\ncaught = []\ndef _gen():\n    try:\n        yield fut\n    except KeyError as e:\n        caught.append(e.args[0])\ngen = _gen()\n",
            );
            let mut sched = Scheduler::new();
            sched.add(PyGenerator::new(&local(&locals, "gen")).unwrap());
            sched.process().unwrap();

            let err = py
                .eval(c"KeyError('missing')", None, None)
                .unwrap();
            local(&locals, "fut")
                .call_method1("set_exception", (err,))
                .unwrap();
            assert_eq!(sched.process().unwrap().completed, 1);

            let caught: Vec<String> = local(&locals, "caught").extract().unwrap();
            assert_eq!(caught, vec!["missing".to_string()]);
        });
    }

    #[test]
    fn test_cancel_with_python_exception_type() {
        Python::initialize();
        Python::attach(|py| {
            let locals = run_fixture(
                py,
                c"import concurrent.futures\nfut = concurrent.futures.Future()\ncleaned = []\ndef _gen():\n    try:\n        yield fut\n    except ValueError:\n        cleaned.append(True)\ngen = _gen()\n",
            );
            let sched = PyTickScheduler::new(None);
            let key = sched.add(&local(&locals, "gen")).unwrap();
            assert_eq!(sched.process().unwrap(), 1);

            let exc_type = py.eval(c"ValueError", None, None).unwrap();
            assert!(sched.cancel(key, Some(&exc_type)).unwrap());
            assert_eq!(sched.process().unwrap(), 1);
            assert!(!sched.__contains__(key).unwrap());

            let cleaned: Vec<bool> = local(&locals, "cleaned").extract().unwrap();
            assert_eq!(cleaned, vec![true]);
        });
    }

    #[test]
    fn test_uncaught_cancel_notice_removes_without_report() {
        Python::initialize();
        Python::attach(|py| {
            let locals = run_fixture(
                py,
                c"import concurrent.futures\nfut = concurrent.futures.Future()\ndef _gen():\n    yield fut\ngen = _gen()\n",
            );
            let reported = Arc::new(Mutex::new(Vec::new()));
            let sink = {
                let reported = reported.clone();
                move |_key: TaskKey, _name: &str, error: &TaskError| {
                    reported.lock().push(error.to_string());
                }
            };
            let mut sched = Scheduler::new().with_error_sink(sink);
            let key = sched.add(PyGenerator::new(&local(&locals, "gen")).unwrap());
            sched.process().unwrap();

            let exc_type = py.eval(c"ValueError", None, None).unwrap();
            assert!(sched.cancel(key, Some(cancel_notice(&exc_type).unwrap())));
            assert_eq!(sched.process().unwrap().cancelled, 1);
            assert!(!sched.contains(key));
            assert!(reported.lock().is_empty());
        });
    }

    #[test]
    fn test_failed_callback_registration_is_thrown_into_generator() {
        Python::initialize();
        Python::attach(|py| {
            let locals = run_fixture(
                py,
                c"class Bad:\n    def add_done_callback(self):\n        pass\ncaught = []\ndef _gen():\n    try:\n        yield Bad()\n    except TypeError as e:\n        caught.append(type(e).__name__)\ngen = _gen()\n",
            );
            let mut sched = Scheduler::new();
            let key = sched.add(PyGenerator::new(&local(&locals, "gen")).unwrap());

            assert_eq!(sched.process().unwrap().paused, 1);
            assert_eq!(sched.state(key), Some(crate::handle::HandleState::Active));
            assert_eq!(sched.process().unwrap().completed, 1);
            assert!(!sched.contains(key));

            let caught: Vec<String> = local(&locals, "caught").extract().unwrap();
            assert_eq!(caught, vec!["TypeError".to_string()]);
        });
    }
}
