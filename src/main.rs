//! libcheck - Cell Library Checker
//!
//! Loads a cell library description, reports every problem with its
//! location, or prints a summary of the cells it defines.
//!
//! # Usage
//!
//! ```bash
//! libcheck cells.lib
//! RUST_LOG=liberty_core=debug libcheck --fail-fast cells.lib
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use liberty_core::{error::Result, Cell, CellKind, Config, LibertyError, ValidatedLibrary};

/// Cell library checker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the library description file (.lib)
    #[arg(value_name = "LIBRARY_FILE")]
    library_file: PathBuf,

    /// Stop at the first parse error instead of recovering
    #[arg(long)]
    fail_fast: bool,

    /// Build and validate cells in parallel
    #[arg(long)]
    parallel: bool,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    let config = Config::new()
        .with_error_recovery(!args.fail_fast)
        .with_parallel(args.parallel);

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(LibertyError::Diagnostics(diagnostics)) => {
            for diagnostic in &diagnostics {
                eprintln!("{}:{}", args.library_file.display(), diagnostic);
            }
            eprintln!("{}", diagnostics);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &Config) -> Result<()> {
    let libraries = liberty_core::load_file(&args.library_file, config)?;
    for library in &libraries {
        print_summary(library);
    }
    Ok(())
}

fn print_summary(library: &ValidatedLibrary) {
    println!("library {} ({} cells)", library.name(), library.cells().len());
    for cell in library.cells() {
        print_cell(cell);
    }
}

fn print_cell(cell: &Cell) {
    let kind = match cell.kind() {
        CellKind::Combinational => "combinational",
        CellKind::Sequential => "sequential",
    };
    let inputs: Vec<&str> = cell.inputs().map(|p| p.name.as_str()).collect();
    let outputs: Vec<&str> = cell.outputs().map(|p| p.name.as_str()).collect();
    println!(
        "  {} [{}] inputs: {} outputs: {}",
        cell.name,
        kind,
        inputs.join(", "),
        outputs.join(", ")
    );

    for pin in cell.outputs() {
        if let Some(function) = &pin.function {
            println!("    {} = {}", pin.name, function.expr);
        }
    }
    if let Some(ff) = cell.flip_flop() {
        println!(
            "    ff({}, {}) on {} <- {}",
            ff.state, ff.state_inverted, ff.clocked_on.expr, ff.next_state.expr
        );
    }
}
