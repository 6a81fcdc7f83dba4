//! Evaluated values carried in layer parameters.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Best-known value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(IndexMap<String, Value>),
    /// Symbolic stand-in for something that could not be resolved
    /// (`VAR_name`, `CALL_name`, or source text). Serialized as a string but
    /// never treated as literal content.
    Placeholder(String),
}

impl Value {
    pub fn placeholder(text: impl Into<String>) -> Self {
        Value::Placeholder(text.into())
    }

    pub fn unresolved_variable(name: &str) -> Self {
        Value::Placeholder(format!("VAR_{}", name))
    }

    pub fn unresolved_call(callee: &str) -> Self {
        Value::Placeholder(format!("CALL_{}", callee))
    }

    /// Concrete string content; placeholders are not concrete.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// String or placeholder: anything that serializes as a JSON string.
    pub fn is_string_like(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Placeholder(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Placeholder(_))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::Int(i)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => match i64::try_from(*i) {
                Ok(small) => serializer.serialize_i64(small),
                Err(_) => match u64::try_from(*i) {
                    Ok(unsigned) => serializer.serialize_u64(unsigned),
                    Err(_) => serializer.serialize_i128(*i),
                },
            },
            Value::Float(x) if x.is_finite() => serializer.serialize_f64(*x),
            Value::Float(x) => serializer.serialize_str(&crate::ast::float_repr(*x)),
            Value::Str(s) | Value::Placeholder(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Dict(map) => map.serialize(serializer),
        }
    }
}
