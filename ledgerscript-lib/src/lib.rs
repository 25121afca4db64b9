//! ledgerscript: a small, statically typed scripting language with a bytecode VM and
//! persistent key/value state.
//!
//! Running a script takes the following steps:
//! 1. declare the host capabilities a script may call in a [`bindings::RegistryBuilder`]
//!    and freeze it with `build()`.
//! 1. compile the source with [`compiler::compile`]. This parses the text
//!    ([`parser::parse`]), resolves names and checks types ([`analysis::analyse`]) and
//!    generates bytecode. The result is either a [`core::CompiledUnit`] or a list of
//!    [`core::Diagnostics`].
//! 1. pick a state backend that implements [`state::StateObserver`], usually a
//!    [`state::JsonStateStore`] loaded from a file.
//! 1. run a function of the unit:
//!
//!    ```
//!    use ledgerscript_lib::bindings::Registry;
//!    use ledgerscript_lib::core::OutputValue;
//!    use ledgerscript_lib::state::JsonStateStore;
//!    use ledgerscript_lib::{compiler, vm};
//!
//!    let registry = Registry::builder().build();
//!    let unit = compiler::compile(&registry, "function main() : Int32 return 6 * 7; endfunction")
//!        .expect("valid program");
//!    let mut store = JsonStateStore::new();
//!    let result = vm::Vm::new(&registry).execute(&unit, "main", &mut store);
//!    assert!(result.success);
//!    assert_eq!(result.output, OutputValue::Integer(42));
//!    ```
//!
//! 1. save the state backend again.
//!
//! [`host::run`] bundles these steps the way the `ledger` binary uses them.
pub mod analysis;
pub mod bindings;
pub mod compiler;
pub mod core;
pub mod host;
pub mod parser;
pub mod state;
pub mod utils;
pub mod vm;
