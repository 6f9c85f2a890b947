//! Error types for the AST crate.

use thiserror::Error;

/// Errors that can occur while parsing RegLang source text.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum AstError {
    /// The grammar rejected the source text. The message carries the
    /// rendered parser diagnostic, including line and column markers.
    #[error("failed to parse RegLang source\n{message}")]
    Parse { message: String },
}
