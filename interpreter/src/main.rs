use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{fmt, EnvFilter};

use ledgerscript_lib::bindings::{system, Registry};
use ledgerscript_lib::core::Diagnostics;
use ledgerscript_lib::host::{self, RunOutcome};
use ledgerscript_lib::vm::VmConfig;
use ledgerscript_lib::{compiler, parser};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    script: PathBuf,

    /// the function to run
    #[arg(short, long, default_value = "main")]
    func: String,

    /// the JSON file the script's state is loaded from and saved to
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[arg(long, default_value_t = VmConfig::default().max_call_depth)]
    max_call_depth: usize,

    /// the most elements a script may put into one array
    #[arg(long, default_value_t = VmConfig::default().max_array_len)]
    max_array_len: usize,

    /// print the syntax tree instead of running the script
    #[arg(long)]
    dump_ast: bool,

    /// print the compiled unit instead of running the script
    #[arg(long)]
    dump_bytecode: bool,

    /// arguments for the script, after `--`
    #[arg(last = true)]
    script_args: Vec<String>,
}

/// logs go to stderr, so they never mix with the script's console output
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn report_diagnostics(diagnostics: &Diagnostics) {
    eprintln!("Failed to compile:");
    for line in diagnostics.lines() {
        eprintln!("{line}");
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let src = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("reading script {}", cli.script.display()))?;

    // the script sees its own path first, like argv
    let mut args = vec![cli.script.display().to_string()];
    args.extend(cli.script_args.iter().cloned());
    let mut builder = Registry::builder();
    system::register(&mut builder, args)?;
    let registry = builder.build();

    if cli.dump_ast {
        let (ast, _) = parser::parse(&src)?;
        println!("{ast:#?}");
        return Ok(());
    }
    if cli.dump_bytecode {
        match compiler::compile(&registry, &src) {
            Ok(unit) => print!("{unit}"),
            Err(diagnostics) => {
                report_diagnostics(&diagnostics);
                process::exit(1);
            }
        }
        return Ok(());
    }

    let config = VmConfig {
        max_call_depth: cli.max_call_depth,
        max_array_len: cli.max_array_len,
    };
    let outcome = match host::run(&registry, &src, &cli.func, cli.data.as_deref(), config) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    match &outcome {
        RunOutcome::CompileFailed(diagnostics) => report_diagnostics(diagnostics),
        RunOutcome::Executed(result) => {
            if !result.console.is_empty() {
                print!("{}", result.console);
                if !result.console.ends_with('\n') {
                    println!();
                }
            }
            if !result.success {
                eprintln!("{}", result.error);
            }
        }
    }
    process::exit(outcome.exit_code());
}
