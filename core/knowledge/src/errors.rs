//! Errors raised by the knowledge-base interpreter.

use reglang_ast::nodes::Location;
use thiserror::Error;

/// Semantic misuse inside a knowledge definition. Messages carry the
/// `line:column` of the offending token.
#[derive(Debug, Clone, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum InterpretationError {
    #[error("{location}: knowledge '{name}' is not defined")]
    UndefinedKnowledge { name: String, location: Location },

    #[error("{location}: knowledge base '{name}' is not defined")]
    UndefinedKnowledgeBase { name: String, location: Location },

    #[error("{location}: knowledge '{item}' is not defined in '{base}'")]
    UndefinedItem {
        base: String,
        item: String,
        location: Location,
    },

    #[error("{location}: adding and removing elements only supports array objects")]
    AlterNonArray { name: String, location: Location },

    #[error("{location}: '{value}' cannot be converted to a number")]
    NotConvertible { value: String, location: Location },

    #[error("{location}: array elements must all be numbers or all be strings")]
    MixedArray { location: Location },

    #[error("{location}: array indices must be numbers or strings convertible to numbers")]
    IndexNotNumber { location: Location },

    #[error("{location}: index {index} is out of bounds for an array of length {length}")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        location: Location,
    },

    #[error("{location}: length only applies to arrays, but got a {found}")]
    LengthOnNonArray {
        found: &'static str,
        location: Location,
    },

    #[error("{location}: {construct} expressions are not expected in knowledge definitions")]
    Forbidden {
        construct: &'static str,
        location: Location,
    },

    #[error("{location}: integer overflow in '{op}' expression")]
    ArithmeticOverflow {
        op: &'static str,
        location: Location,
    },

    #[error("{location}: division by zero")]
    DivisionByZero { location: Location },

    #[error("{location}: negative exponents are not supported")]
    NegativeExponent { location: Location },
}
