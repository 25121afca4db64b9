//! Deals with types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents type information at compile time.
///
/// Host bindings declare their signatures with the same vocabulary, so a host function
/// can be checked against script code exactly like a script function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeId {
    Void,
    Bool,
    Int32,
    Int64,
    Float64,
    String,
    Array(Box<TypeId>),
    State(Box<TypeId>),
}

impl TypeId {
    pub fn array(self) -> Self {
        Self::Array(Box::new(self))
    }

    pub fn state(self) -> Self {
        Self::State(Box::new(self))
    }

    /// resolves the name of a type that takes no type argument
    pub fn from_simple_name(name: &str) -> Option<Self> {
        Some(match name {
            "Bool" => Self::Bool,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Float64" => Self::Float64,
            "String" => Self::String,
            _ => return None,
        })
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64 | Self::Float64)
    }

    /// types that can be compared with `==` and `!=`
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Int32 | Self::Int64 | Self::Float64 | Self::String
        )
    }

    /// types a `State<T>` can hold
    pub fn is_storable(&self) -> bool {
        self.is_primitive()
    }

    /// the element type of arrays and state handles
    pub fn element(&self) -> Option<&TypeId> {
        match self {
            Self::Array(inner) | Self::State(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "Void"),
            Self::Bool => write!(f, "Bool"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::Float64 => write!(f, "Float64"),
            Self::String => write!(f, "String"),
            Self::Array(inner) => write!(f, "Array<{inner}>"),
            Self::State(inner) => write!(f, "State<{inner}>"),
        }
    }
}

/// represents a Function signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub result: TypeId,
}

impl Signature {
    pub fn new(params: impl Into<Vec<TypeId>>, result: TypeId) -> Self {
        Self {
            params: params.into(),
            result,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") : {}", self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested() {
        let t = TypeId::Int32.array().array();
        assert_eq!(t.to_string(), "Array<Array<Int32>>");
        let sig = Signature::new([TypeId::Int32, TypeId::String.state()], TypeId::Void);
        assert_eq!(sig.to_string(), "(Int32, State<String>) : Void");
    }

    #[test]
    fn test_storable() {
        assert!(TypeId::String.is_storable());
        assert!(!TypeId::Int32.array().is_storable());
        assert!(!TypeId::Void.is_storable());
    }
}
