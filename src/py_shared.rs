use std::sync::Arc;

use pyo3::prelude::*;

/// GIL-free clonable Python object reference (`Arc<Py<PyAny>>`).
///
/// Values and errors cross the future completion callback on arbitrary
/// threads; `.clone()` here is an atomic increment and never needs the GIL.
#[derive(Debug, Clone)]
pub struct PyShared(Arc<Py<PyAny>>);

impl PyShared {
    pub fn new(obj: Py<PyAny>) -> Self {
        PyShared(Arc::new(obj))
    }

    pub fn bind<'py>(&self, py: Python<'py>) -> &Bound<'py, PyAny> {
        self.0.bind(py)
    }

    /// Same underlying Python object.
    pub fn ptr_eq(&self, other: &PyShared) -> bool {
        self.0.as_ptr() == other.0.as_ptr()
    }
}
