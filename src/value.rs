//! Values that flow between the scheduler, its computations and futures.
//!
//! Rust-native variants cover the common cases; with the `python_bridge`
//! feature a value can also carry an arbitrary Python object.

#[cfg(feature = "python_bridge")]
use pyo3::prelude::*;
#[cfg(feature = "python_bridge")]
use pyo3::types::{PyBool, PyBytes, PyList, PyString};

#[cfg(feature = "python_bridge")]
use crate::py_shared::PyShared;

/// A resume value, a yielded value, or a computation's final result.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    #[cfg(feature = "python_bridge")]
    Python(PyShared),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type tag used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            #[cfg(feature = "python_bridge")]
            Value::Python(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Identity, not Python `==`: comparing by value would need the GIL.
            #[cfg(feature = "python_bridge")]
            (Value::Python(a), Value::Python(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(feature = "python_bridge")]
impl Value {
    pub fn to_pyobject<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        match self {
            Value::None => Ok(py.None().into_bound(py)),
            Value::Bool(b) => Ok(PyBool::new(py, *b).to_owned().into_any()),
            Value::Int(i) => Ok(i.into_pyobject(py)?.into_any()),
            Value::Float(f) => Ok(f.into_pyobject(py)?.into_any()),
            Value::String(s) => Ok(PyString::new(py, s).into_any()),
            Value::Bytes(b) => Ok(PyBytes::new(py, b).into_any()),
            Value::List(items) => {
                let list = PyList::empty(py);
                for item in items {
                    list.append(item.to_pyobject(py)?)?;
                }
                Ok(list.into_any())
            }
            Value::Python(obj) => Ok(obj.bind(py).clone()),
        }
    }

    /// Convert a Python object, keeping scalars Rust-native.
    ///
    /// Containers stay Python objects so identity survives the round trip.
    pub fn from_pyobject(obj: &Bound<'_, PyAny>) -> Self {
        if obj.is_none() {
            return Value::None;
        }
        if let Ok(b) = obj.cast::<PyBool>() {
            return Value::Bool(b.is_true());
        }
        if let Ok(i) = obj.extract::<i64>() {
            return Value::Int(i);
        }
        if let Ok(s) = obj.extract::<String>() {
            return Value::String(s);
        }
        Value::Python(PyShared::new(obj.clone().unbind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_default_is_none() {
        assert!(Value::default().is_none());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::String("x".into()).as_int(), None);
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::from(3_i64), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.0));
        assert_eq!(
            Value::from(vec![Value::Int(1), Value::None]),
            Value::List(vec![Value::Int(1), Value::None])
        );
    }

    #[test]
    fn test_value_type_name() {
        assert_eq!(Value::None.type_name(), "None");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::List(Vec::new()).type_name(), "list");
    }
}
