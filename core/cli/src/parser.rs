//! Command line argument parsing for the RegLang compiler.
//!
//! The `reglang2msl` binary takes exactly two positional arguments: the
//! RegLang file to read and the MSL file to write. No flags and no
//! environment variables influence the translation.

use clap::Parser;

/// Command line interface definition for the RegLang compiler.
#[derive(Parser)]
#[command(
    name = "reglang2msl",
    author,
    version,
    about = "Translate RegLang to MSL",
    long_about = "The 'reglang2msl' command reads a RegLang source file, compiles its \
knowledge bases and rules into an MSL automaton, and writes the resulting MSL module \
to the output path."
)]
pub(crate) struct Cli {
    /// Path to the input RegLang file, read as UTF-8.
    pub(crate) input_file: std::path::PathBuf,

    /// Path to save the output MSL file, written as UTF-8.
    pub(crate) output_file: std::path::PathBuf,
}
