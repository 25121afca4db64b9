use indoc::indoc;
use std::fs;

use ledgerscript_lib::bindings::{system, Registry};
use ledgerscript_lib::compiler;
use ledgerscript_lib::core::{CompiledUnit, OutputValue};
use ledgerscript_lib::host::{self, HostError, RunOutcome};
use ledgerscript_lib::state::{JsonStateStore, MemoryStateStore};
use ledgerscript_lib::vm::{Vm, VmConfig};

fn registry_with_args(args: &[&str]) -> Registry {
    let mut builder = Registry::builder();
    system::register(&mut builder, args.iter().map(|a| a.to_string()).collect()).unwrap();
    builder.build()
}

#[test]
fn argc_counts_the_bound_arguments() {
    let registry = registry_with_args(&["a", "b"]);
    let unit = compiler::compile(
        &registry,
        "function main() : Int32 return System.Argc(); endfunction",
    )
    .unwrap();
    let result = Vm::new(&registry).execute(&unit, "main", &mut MemoryStateStore::new());
    assert!(result.success);
    assert_eq!(result.output, OutputValue::Integer(2));
}

#[test]
fn unregistered_function_is_one_diagnostic() {
    let registry = registry_with_args(&[]);
    let diagnostics = compiler::compile(
        &registry,
        indoc! {"
            function main() : Int32
              var x = 1;
              return notRegistered(x);
            endfunction
        "},
    )
    .unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    let line = &diagnostics.lines()[0];
    assert!(line.starts_with("line 3:"), "{line}");
    assert!(line.contains("notRegistered"), "{line}");
}

#[test]
fn errors_are_reported_together() {
    let registry = registry_with_args(&[]);
    let diagnostics = compiler::compile(
        &registry,
        indoc! {r#"
            function main()
              var a : Int32 = "one";
              var b = missing;
              while (1)
              endwhile
            endfunction
        "#},
    )
    .unwrap_err();
    let lines: Vec<u32> = diagnostics.iter().map(|d| d.line()).collect();
    assert_eq!(lines, vec![2, 3, 4]);
}

#[test]
fn compiled_units_are_deterministic() {
    let registry = registry_with_args(&["x"]);
    let src = indoc! {r#"
        function greet(name : String) : String
          return "hello " + name;
        endfunction

        function main() : String
          var seen = State<Int64>("seen");
          seen.set(seen.get(0i64) + 1i64);
          return greet(System.Argv(0));
        endfunction
    "#};
    let first = compiler::compile(&registry, src).unwrap().to_bytes().unwrap();
    let second = compiler::compile(&registry, src).unwrap().to_bytes().unwrap();
    assert_eq!(first, second);

    let unit = CompiledUnit::from_bytes(&first).unwrap();
    let result = Vm::new(&registry).execute(&unit, "main", &mut MemoryStateStore::new());
    assert_eq!(result.output, OutputValue::Text("hello x".into()));
}

#[test]
fn state_survives_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let registry = registry_with_args(&[]);
    let src = indoc! {r#"
        function main() : Int32
          var runs = State<Int32>("runs");
          runs.set(runs.get(0) + 1);
          printLn("run " + toString(runs.get()));
          return runs.get();
        endfunction
    "#};

    for expected in 1..=3 {
        let outcome = host::run(&registry, src, "main", Some(&path), VmConfig::default()).unwrap();
        let RunOutcome::Executed(result) = outcome else {
            panic!("script should compile");
        };
        assert_eq!(result.output, OutputValue::Integer(expected));
        assert_eq!(result.console, format!("run {expected}\n"));
    }

    let saved = JsonStateStore::load_from_file(&path).unwrap();
    assert_eq!(saved.keys().collect::<Vec<_>>(), vec!["runs"]);
    // postcard stores 3 zigzag encoded as a single byte
    assert!(fs::read_to_string(&path).unwrap().contains("\"06\""));
}

#[test]
fn state_is_saved_after_a_fault() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let registry = registry_with_args(&[]);
    let src = indoc! {r#"
        function main()
          State<String>("first").set("kept");
          panic("stop");
        endfunction
    "#};
    let outcome = host::run(&registry, src, "main", Some(&path), VmConfig::default()).unwrap();
    assert_eq!(outcome.exit_code(), 1);
    let RunOutcome::Executed(result) = outcome else {
        panic!("script should compile");
    };
    assert_eq!(result.error, "line 3: panic: stop");
    let saved = JsonStateStore::load_from_file(&path).unwrap();
    assert_eq!(saved.len(), 1);
}

#[test]
fn malformed_state_file_stops_before_compiling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "[1, 2, 3]").unwrap();
    let registry = registry_with_args(&[]);
    // the script doesn't even compile, the state error has to win
    let err = host::run(&registry, "function main(", "main", Some(&path), VmConfig::default())
        .unwrap_err();
    let HostError::State(err) = err;
    assert!(err.is_malformed());
    // the file is left alone
    assert_eq!(fs::read_to_string(&path).unwrap(), "[1, 2, 3]");
}

#[test]
fn compile_failure_does_not_touch_the_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let registry = registry_with_args(&[]);
    let outcome =
        host::run(&registry, "function main() x = 1; endfunction", "main", Some(&path), VmConfig::default())
            .unwrap();
    assert!(matches!(outcome, RunOutcome::CompileFailed(_)));
    assert!(!path.exists());
}
