#![warn(clippy::pedantic)]

//! # RegLang Compiler CLI
//!
//! Command line interface for the RegLang→MSL compiler:
//!
//! ```bash
//! reglang2msl rules.rl rules.msl
//! ```
//!
//! The input file is read as UTF-8 RegLang source, compiled, and the MSL
//! module is written to the output path.
//!
//! ## Exit codes
//! * 0 – success.
//! * 1 – usage / IO / compilation failure.
//!
//! Diagnostics and compiler warnings (for example oversized power results in
//! knowledge definitions) are printed to stderr.

mod parser;

use std::{fs, process};

use clap::Parser;
use parser::Cli;
use reglang2msl::CodeGenerator;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Cli::parse();
    if !args.input_file.exists() {
        eprintln!("Error: input path not found");
        process::exit(1);
    }

    let source = match fs::read_to_string(&args.input_file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.input_file.display());
            process::exit(1);
        }
    };

    let program = match reglang2msl::parse(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Parse error: {e}");
            process::exit(1);
        }
    };

    let msl = match CodeGenerator::new().generate(&program) {
        Ok(msl) => msl,
        Err(e) => {
            eprintln!("Translation failed: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = fs::write(&args.output_file, msl) {
        eprintln!("Error writing {}: {e}", args.output_file.display());
        process::exit(1);
    }
    process::exit(0);
}
