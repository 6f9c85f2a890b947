//! Type labels inferred for MSL nodes.

use core::fmt;
use std::fmt::{Display, Formatter};

use reglang_knowledge::value::KValue;

/// The type of an MSL expression.
///
/// Knowledge references carry the type of their bound value; everything
/// else starts as `Unknown` and is narrowed by context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeLabel {
    Int,
    Str,
    Bool,
    IntArray,
    StrArray,
    BoolArray,
    AnyArray,
    Unknown,
}

impl TypeLabel {
    /// The type of a knowledge value. Array element kinds come from the
    /// value itself; knowledge arrays are never empty.
    #[must_use]
    pub fn of_knowledge(value: &KValue) -> TypeLabel {
        match value {
            KValue::Int(_) => TypeLabel::Int,
            KValue::Str(_) => TypeLabel::Str,
            KValue::IntArray(_) => TypeLabel::IntArray,
            KValue::StrArray(_) => TypeLabel::StrArray,
        }
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            TypeLabel::IntArray | TypeLabel::StrArray | TypeLabel::BoolArray | TypeLabel::AnyArray
        )
    }

    /// `int[]` for `int`, `string[]` for `string`, `bool[]` for `bool`.
    #[must_use]
    pub fn array_of(element: TypeLabel) -> TypeLabel {
        match element {
            TypeLabel::Int => TypeLabel::IntArray,
            TypeLabel::Str => TypeLabel::StrArray,
            TypeLabel::Bool => TypeLabel::BoolArray,
            _ => TypeLabel::AnyArray,
        }
    }

    /// The element type of an array label, `None` for scalars.
    #[must_use]
    pub fn element(&self) -> Option<TypeLabel> {
        match self {
            TypeLabel::IntArray => Some(TypeLabel::Int),
            TypeLabel::StrArray => Some(TypeLabel::Str),
            TypeLabel::BoolArray => Some(TypeLabel::Bool),
            TypeLabel::AnyArray => Some(TypeLabel::Unknown),
            _ => None,
        }
    }
}

impl Display for TypeLabel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let label = match self {
            TypeLabel::Int => "int",
            TypeLabel::Str => "string",
            TypeLabel::Bool => "bool",
            TypeLabel::IntArray => "int[]",
            TypeLabel::StrArray => "string[]",
            TypeLabel::BoolArray => "bool[]",
            TypeLabel::AnyArray => "any[]",
            TypeLabel::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}
