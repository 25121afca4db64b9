//! The compiled form of a script.
//!
//! A [`CompiledUnit`] only contains ordered containers, so serializing the same unit
//! twice yields the same bytes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::*;
use crate::utils;

/// a host function the unit calls. It is bound to the registry by qualified name and
/// signature before the unit runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostImport {
    pub name: String,
    pub signature: Signature,
}

/// the code of a single script function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCode {
    pub name: String,
    pub signature: Signature,
    /// number of local slots, including the parameters
    pub locals: u16,
    pub code: Vec<OpCode>,
    /// has one entry for each opcode, the source line it was generated from
    pub lines: Vec<u32>,
}

impl FunctionCode {
    pub fn line_of(&self, index: usize) -> u32 {
        self.lines.get(index).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    /// version of the crate that compiled this unit
    pub version: [u16; 3],
    pub functions: Vec<FunctionCode>,
    pub constants: Vec<Constant>,
    pub imports: Vec<HostImport>,
    /// function name to index in `functions`
    pub function_index: BTreeMap<String, u16>,
}

#[derive(Error, Debug)]
pub enum UnitFormatError {
    #[error("the compiled unit could not be encoded or decoded: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("the unit was compiled by version {found:?}, this is version {expected:?}")]
    VersionMismatch { found: [u16; 3], expected: [u16; 3] },
}

impl CompiledUnit {
    pub fn function(&self, name: &str) -> Option<(usize, &FunctionCode)> {
        let index = usize::from(*self.function_index.get(name)?);
        self.functions.get(index).map(|f| (index, f))
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.function_index.keys().map(String::as_str)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, UnitFormatError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UnitFormatError> {
        let unit: Self = postcard::from_bytes(bytes)?;
        let expected = utils::get_version();
        if unit.version != expected {
            return Err(UnitFormatError::VersionMismatch {
                found: unit.version,
                expected,
            });
        }
        Ok(unit)
    }
}

/// a human readable listing, used by `--dump-bytecode`
impl fmt::Display for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.imports.is_empty() {
            writeln!(f, "imports:")?;
            for (i, import) in self.imports.iter().enumerate() {
                writeln!(f, "  {i:>4}  {}{}", import.name, import.signature)?;
            }
        }
        if !self.constants.is_empty() {
            writeln!(f, "constants:")?;
            for (i, constant) in self.constants.iter().enumerate() {
                writeln!(f, "  {i:>4}  {constant}")?;
            }
        }
        for function in &self.functions {
            writeln!(
                f,
                "function {}{} locals={}",
                function.name, function.signature, function.locals
            )?;
            for (i, op) in function.code.iter().enumerate() {
                writeln!(f, "  {i:>4}  [line {:>3}]  {op:?}", function.line_of(i))?;
            }
        }
        Ok(())
    }
}
