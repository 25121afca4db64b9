//! The complete run of a script as a host performs it: load the state file, compile,
//! execute, save the state file.

use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::bindings::Registry;
use crate::compiler;
use crate::core::Diagnostics;
use crate::state::{JsonStateStore, StateStoreError};
use crate::vm::{ExecutionResult, Vm, VmConfig};

#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    State(#[from] StateStoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    CompileFailed(Diagnostics),
    Executed(ExecutionResult),
}

impl RunOutcome {
    /// the process exit code for the outcome. Only a successful execution yields 0
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Executed(result) if result.success => 0,
            _ => 1,
        }
    }
}

/// Runs `entry` of the script in `source`.
///
/// With a `state_path`, the state is loaded from that file before compiling, and saved
/// back after the execution, also if it failed. A malformed state file stops the run
/// before anything is compiled. Without a path the state only lives for this run.
pub fn run(
    registry: &Registry,
    source: &str,
    entry: &str,
    state_path: Option<&Path>,
    config: VmConfig,
) -> Result<RunOutcome, HostError> {
    let mut store = match state_path {
        Some(path) => JsonStateStore::load_from_file(path)?,
        None => JsonStateStore::new(),
    };

    let unit = match compiler::compile(registry, source) {
        Ok(unit) => unit,
        Err(diagnostics) => {
            info!(errors = diagnostics.len(), "compilation failed");
            return Ok(RunOutcome::CompileFailed(diagnostics));
        }
    };

    let result = Vm::with_config(registry, config).execute(&unit, entry, &mut store);
    info!(entry, success = result.success, "execution finished");

    if let Some(path) = state_path {
        store.save_to_file(path)?;
    }
    Ok(RunOutcome::Executed(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputValue;

    #[test]
    fn test_exit_codes() {
        let registry = Registry::builder().build();
        let ok = run(&registry, "function main() endfunction", "main", None, VmConfig::default())
            .unwrap();
        assert_eq!(ok.exit_code(), 0);

        let failed = run(&registry, "function main() panic(\"x\"); endfunction", "main", None, VmConfig::default())
            .unwrap();
        assert_eq!(failed.exit_code(), 1);

        let broken = run(&registry, "function main(", "main", None, VmConfig::default()).unwrap();
        assert!(matches!(broken, RunOutcome::CompileFailed(_)));
        assert_eq!(broken.exit_code(), 1);
    }

    #[test]
    fn test_output_is_reported() {
        let registry = Registry::builder().build();
        let outcome = run(
            &registry,
            "function main() : Float64 return 1.5; endfunction",
            "main",
            None,
            VmConfig::default(),
        )
        .unwrap();
        let RunOutcome::Executed(result) = outcome else {
            panic!("expected an execution");
        };
        assert_eq!(result.output, OutputValue::Float(1.5.into()));
    }
}
