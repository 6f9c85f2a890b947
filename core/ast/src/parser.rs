//! The generated RegLang parser.
//!
//! The grammar lives in `reglang.pest` next to this module and is embedded
//! into the binary at compile time, so no grammar file needs to be shipped
//! alongside the executable.

use pest_derive::Parser;

/// Pest parser over the packaged RegLang grammar.
#[derive(Parser)]
#[grammar = "reglang.pest"]
pub struct ReglangParser;
