//! contains all important data structures

mod ast_macros;

pub mod ast;
pub use ast::*;

pub mod types;
pub use types::*;

pub mod scopes;
pub use scopes::*;

pub mod value;
pub use value::*;

pub mod opcode;
pub use opcode::*;

pub mod bytecode;
pub use bytecode::*;

pub mod bytecode_builder;
pub use bytecode_builder::*;

pub mod diagnostics;
pub use diagnostics::*;
