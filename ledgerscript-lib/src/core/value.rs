//! Deals with run-time data representation
//!
//! Scalars are stored inline, strings are shared immutable text and arrays are shared
//! mutable vectors, so assigning an array to a second variable aliases it.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use super::TypeId;

/// a handle to a persistent state entry. It only knows the key and the element type,
/// every access goes through the state observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRef {
    pub key: String,
    pub ty: TypeId,
}

/// a value at run time
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    State(Rc<StateRef>),
}

#[derive(Error, Debug)]
pub enum StateCodecError {
    #[error("values of type {0} cannot be persisted")]
    Unsupported(String),

    #[error("stored bytes do not decode as {ty}: {source}")]
    Decode {
        ty: TypeId,
        #[source]
        source: postcard::Error,
    },

    #[error(transparent)]
    Encode(#[from] postcard::Error),
}

impl Value {
    pub fn array(values: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(values)))
    }

    pub fn state(key: impl Into<String>, ty: TypeId) -> Self {
        Self::State(Rc::new(StateRef {
            key: key.into(),
            ty,
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Bool(_) => "Bool",
            Self::Int32(_) => "Int32",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
            Self::Array(_) => "Array",
            Self::State(_) => "State",
        }
    }

    /// the value a variable of the given type holds before it is assigned.
    /// State handles have no default.
    pub fn default_for(ty: &TypeId) -> Option<Self> {
        Some(match ty {
            TypeId::Void | TypeId::State(_) => return None,
            TypeId::Bool => Self::Bool(false),
            TypeId::Int32 => Self::Int32(0),
            TypeId::Int64 => Self::Int64(0),
            TypeId::Float64 => Self::Float64(0.0),
            TypeId::String => Self::from(""),
            TypeId::Array(_) => Self::array(Vec::new()),
        })
    }

    /// checks whether the value is an instance of the type
    pub fn matches(&self, ty: &TypeId) -> bool {
        match (self, ty) {
            (Self::Void, TypeId::Void)
            | (Self::Bool(_), TypeId::Bool)
            | (Self::Int32(_), TypeId::Int32)
            | (Self::Int64(_), TypeId::Int64)
            | (Self::Float64(_), TypeId::Float64)
            | (Self::String(_), TypeId::String) => true,
            (Self::Array(values), TypeId::Array(inner)) => {
                values.borrow().iter().all(|v| v.matches(inner))
            }
            (Self::State(handle), TypeId::State(inner)) => handle.ty == **inner,
            _ => false,
        }
    }

    /// converts the value into its host-facing form
    pub fn to_output(&self) -> OutputValue {
        match self {
            Self::Void => OutputValue::Absent,
            Self::Bool(b) => OutputValue::Bool(*b),
            Self::Int32(i) => OutputValue::Integer(i64::from(*i)),
            Self::Int64(i) => OutputValue::Integer(*i),
            Self::Float64(f) => OutputValue::Float(OrderedFloat(*f)),
            Self::String(s) => OutputValue::Text(s.to_string()),
            Self::Array(values) => {
                OutputValue::Aggregate(values.borrow().iter().map(Value::to_output).collect())
            }
            Self::State(handle) => OutputValue::Text(handle.key.clone()),
        }
    }

    /// the bytes stored for this value in persistent state
    pub fn encode_state(&self) -> Result<Vec<u8>, StateCodecError> {
        Ok(match self {
            Self::Bool(b) => postcard::to_allocvec(b)?,
            Self::Int32(i) => postcard::to_allocvec(i)?,
            Self::Int64(i) => postcard::to_allocvec(i)?,
            Self::Float64(f) => postcard::to_allocvec(f)?,
            Self::String(s) => postcard::to_allocvec(&s.to_string())?,
            other => return Err(StateCodecError::Unsupported(other.type_name().into())),
        })
    }

    /// decodes bytes read from persistent state as a value of the given type
    pub fn decode_state(ty: &TypeId, bytes: &[u8]) -> Result<Self, StateCodecError> {
        let decode_err = |source| StateCodecError::Decode {
            ty: ty.clone(),
            source,
        };
        Ok(match ty {
            TypeId::Bool => Self::Bool(postcard::from_bytes(bytes).map_err(decode_err)?),
            TypeId::Int32 => Self::Int32(postcard::from_bytes(bytes).map_err(decode_err)?),
            TypeId::Int64 => Self::Int64(postcard::from_bytes(bytes).map_err(decode_err)?),
            TypeId::Float64 => Self::Float64(postcard::from_bytes(bytes).map_err(decode_err)?),
            TypeId::String => {
                let text: String = postcard::from_bytes(bytes).map_err(decode_err)?;
                Self::from(text)
            }
            other => return Err(StateCodecError::Unsupported(other.to_string())),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::State(a), Self::State(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int32(i) => write!(f, "{i}"),
            Self::Int64(i) => write!(f, "{i}"),
            Self::Float64(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::State(handle) => write!(f, "State<{}>({})", handle.ty, handle.key),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float64(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

/// The host-facing form of the value an entry function returned.
///
/// Integers of both widths collapse into `Integer`, arrays become `Aggregate` and a
/// state handle is reported by its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputValue {
    #[default]
    Absent,
    Bool(bool),
    Integer(i64),
    Float(OrderedFloat<f64>),
    Text(String),
    Aggregate(Vec<OutputValue>),
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "<absent>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Aggregate(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codec() {
        let value = Value::from("hello");
        let bytes = value.encode_state().unwrap();
        assert_eq!(Value::decode_state(&TypeId::String, &bytes).unwrap(), value);

        let bytes = Value::Int64(-3).encode_state().unwrap();
        assert_eq!(
            Value::decode_state(&TypeId::Int64, &bytes).unwrap(),
            Value::Int64(-3)
        );
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Value::decode_state(&TypeId::String, &[0xff, 0xff, 0xff]).is_err());
        assert!(Value::decode_state(&TypeId::Bool, &[]).is_err());
        assert!(Value::array(vec![]).encode_state().is_err());
    }

    #[test]
    fn test_output_conversion() {
        let arr = Value::array(vec![Value::Int32(1), Value::Int64(2)]);
        assert_eq!(
            arr.to_output(),
            OutputValue::Aggregate(vec![OutputValue::Integer(1), OutputValue::Integer(2)])
        );
        assert_eq!(Value::Void.to_output(), OutputValue::Absent);
        assert_eq!(arr.to_string(), "[1, 2]");
    }

    #[test]
    fn test_matches() {
        let arr = Value::array(vec![Value::Int32(1)]);
        assert!(arr.matches(&TypeId::Int32.array()));
        assert!(!arr.matches(&TypeId::Int64.array()));
        assert!(Value::state("k", TypeId::Bool).matches(&TypeId::Bool.state()));
    }
}
