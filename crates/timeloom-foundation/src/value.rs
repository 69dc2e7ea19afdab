//! Runtime values and simulation states
//!
//! The crunching layer treats simulation payloads as opaque data; step
//! functions give them meaning.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Runtime value type for simulation payloads and step arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(f64),
    Int(i64),
    Bool(bool),
    Text(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Scalar(0.0)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// One world-moment of a simulation.
///
/// The clock advances monotonically as step functions are applied; the
/// crunching layer uses it to decide when a job's target has been met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Simulation time of this moment
    pub clock: f64,
    /// Simulation payload
    pub data: Value,
}

impl State {
    pub fn new(clock: f64, data: Value) -> Self {
        Self { clock, data }
    }

    /// A state at clock zero, the usual starting point of a history.
    pub fn initial(data: Value) -> Self {
        Self::new(0.0, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Scalar(1.5).as_scalar(), Some(1.5));
        assert_eq!(Value::Int(3).as_int(), Some(3));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Text("hi".into()).as_text(), Some("hi"));
        assert_eq!(Value::Scalar(1.5).as_int(), None);
    }

    #[test]
    fn test_value_default_is_zero_scalar() {
        assert_eq!(Value::default(), Value::Scalar(0.0));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Scalar(2.5).to_string(), "2.5");
        assert_eq!(Value::Text("g".into()).to_string(), "\"g\"");
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.to_string(), "[1, 2]");
    }

    #[test]
    fn test_initial_state_clock() {
        let state = State::initial(Value::Int(7));
        assert_eq!(state.clock, 0.0);
        assert_eq!(state.data, Value::Int(7));
    }
}
