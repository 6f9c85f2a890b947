//! Errors raised while lowering rules.

use thiserror::Error;

/// A single rule carries more check statements than the error-code step
/// permits, so the checks cannot be numbered within the rule's code range.
#[derive(Debug, Clone, Error)]
#[error("too many checking statements ({count}) in a single rule")]
#[must_use = "errors must not be silently ignored"]
pub struct MaxRuleStatementError {
    pub count: usize,
}
