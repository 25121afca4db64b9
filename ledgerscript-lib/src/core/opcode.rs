//! This file defines the opcodes and the operations that are built into the language.
//!
//! The VM is a stack machine. Every function has a frame whose locals live at the
//! bottom of its part of the operand stack, parameters first.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::IntoStaticStr;

use super::TypeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
pub enum OpCode {
    /// push an entry of the constant pool
    PushConst(u32),
    /// push a copy of a local of the current frame
    LoadLocal(u16),
    /// pop the stack top into a local of the current frame
    StoreLocal(u16),
    Pop,
    /// duplicate the two topmost entries, used by compound assignments to array elements
    Dup2,
    /// pop n values and push an array containing them in order
    MakeArray(u32),
    /// pop a length and push an array of that many default values of the element type
    NewArray(TypeId),
    /// pop a key and push a handle to the state entry
    NewState(TypeId),
    /// [array, index] -> [element]
    LoadIndex,
    /// [array, index, value] -> []
    StoreIndex,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Jump(u32),
    /// pop a Bool and jump if it is false
    JumpIfFalse(u32),
    /// pushes whether the loop variable is still inside the half open range. The
    /// direction of the range is determined by the sign of the step, a zero step is
    /// a runtime fault
    RangeTest { var: u16, limit: u16, step: u16 },
    /// call a script function of the unit, its arguments are on the stack
    Call(u16),
    /// call an entry of the unit's import table
    CallHost(u16),
    CallIntrinsic { intrinsic: Intrinsic, argc: u8 },
    /// return the stack top to the caller
    Return,
    ReturnVoid,
}

impl OpCode {
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }
}

/// entries of the constant pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl Constant {
    /// equality that distinguishes `0.0` from `-0.0`, used to deduplicate the pool
    pub fn same_as(&self, other: &Constant) -> bool {
        match (self, other) {
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int32(i) => write!(f, "{i}"),
            Self::Int64(i) => write!(f, "{i}i64"),
            Self::Float64(x) => write!(f, "{x:?}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Operations implemented by the VM itself: free functions that are always available,
/// and the methods of the built-in types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr)]
pub enum Intrinsic {
    Print,
    PrintLn,
    ToString,
    ToInt32,
    ToInt64,
    ToFloat64,
    Panic,
    Assert,
    ArrayCount,
    ArrayAppend,
    StringLength,
    StateGet,
    StateGetOr,
    StateSet,
    StateExisted,
}

static FREE_FUNCTIONS: Lazy<BTreeMap<&'static str, Intrinsic>> = Lazy::new(|| {
    BTreeMap::from([
        ("print", Intrinsic::Print),
        ("printLn", Intrinsic::PrintLn),
        ("toString", Intrinsic::ToString),
        ("toInt32", Intrinsic::ToInt32),
        ("toInt64", Intrinsic::ToInt64),
        ("toFloat64", Intrinsic::ToFloat64),
        ("panic", Intrinsic::Panic),
        ("assert", Intrinsic::Assert),
    ])
});

impl Intrinsic {
    /// looks up a free function that is built into the language
    pub fn from_function_name(name: &str) -> Option<Self> {
        FREE_FUNCTIONS.get(name).copied()
    }

    /// names that neither scripts nor hosts can define
    pub fn reserved_names() -> impl Iterator<Item = &'static str> {
        FREE_FUNCTIONS.keys().copied()
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_lookup() {
        assert_eq!(
            Intrinsic::from_function_name("printLn"),
            Some(Intrinsic::PrintLn)
        );
        assert_eq!(Intrinsic::from_function_name("println"), None);
        assert!(Intrinsic::reserved_names().any(|n| n == "assert"));
    }

    #[test]
    fn test_constant_dedup_respects_sign() {
        assert!(!Constant::Float64(0.0).same_as(&Constant::Float64(-0.0)));
        assert!(Constant::String("a".into()).same_as(&Constant::String("a".into())));
        assert!(!Constant::Int32(1).same_as(&Constant::Int64(1)));
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(OpCode::RangeTest { var: 0, limit: 1, step: 2 }.mnemonic(), "RangeTest");
        assert_eq!(OpCode::PushConst(3).mnemonic(), "PushConst");
    }
}
