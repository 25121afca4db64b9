//! Runs every `tests/*.lgs` script through the `ledger` binary and compares its stdout
//! with the `.out` file of the same name. A script may have an `.args` file, its lines
//! are passed to the script after `--`.

use anyhow::{anyhow, Context, Result};
use glob::glob;
use std::result::Result as StdResult;

use std::fs;
use std::path::Path;
use std::process::Command;

const LEDGER: &str = "../target/release/ledger";

fn main() -> Result<()> {
    compile_ledger().context("compiling interpreter")?;

    let scripts: Vec<_> = glob("tests/*.lgs")?.collect::<StdResult<_, _>>()?;
    let mut failures = 0;
    for script in &scripts {
        if run_script(script)? {
            println!("{}: passed", script.display());
        } else {
            failures += 1;
        }
    }
    if failures > 0 {
        return Err(anyhow!("{failures} of {} scripts failed", scripts.len()));
    }
    Ok(())
}

fn run_script(script: &Path) -> Result<bool> {
    let expected_path = script.with_extension("out");
    let expected_output = fs::read_to_string(&expected_path)
        .with_context(|| format!("loading expected output: {}", expected_path.display()))?;
    let args = match fs::read_to_string(script.with_extension("args")) {
        Ok(text) => text.lines().map(str::to_owned).collect(),
        Err(_) => vec![],
    };

    let output = Command::new(LEDGER)
        .arg(script)
        .arg("--")
        .args(&args)
        .output()
        .with_context(|| format!("running script {}", script.display()))?;
    let stdout = String::from_utf8(output.stdout)?;
    if stdout == expected_output {
        Ok(true)
    } else {
        println!(
            "{}: failed\nactual output:\n{}\nstderr:\n{}",
            script.display(),
            stdout,
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(false)
    }
}

fn compile_ledger() -> Result<()> {
    let st = Command::new("cargo")
        .args(["build", "--release", "-p", "ledger"])
        .current_dir("..")
        .status()?;
    if st.success() {
        Ok(())
    } else {
        Err(anyhow!("compiling the interpreter failed"))
    }
}
