//! The knowledge value domain.
//!
//! Knowledge items are fully constant-folded during interpretation, so the
//! domain is a closed sum of four shapes: integers, strings, and homogeneous
//! arrays of either. Arrays in knowledge storage are order-preserving and
//! deduplicated under `add`.

use core::fmt;
use std::fmt::{Display, Formatter};

/// A fully evaluated knowledge value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum KValue {
    Int(i64),
    Str(String),
    IntArray(Vec<i64>),
    StrArray(Vec<String>),
}

impl KValue {
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, KValue::IntArray(_) | KValue::StrArray(_))
    }

    /// Shape name used in diagnostics.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            KValue::Int(_) => "number",
            KValue::Str(_) => "string",
            KValue::IntArray(_) | KValue::StrArray(_) => "array",
        }
    }
}

/// Renders the value in MSL literal syntax: integers bare, strings in double
/// quotes, arrays bracketed with `, ` separators.
impl Display for KValue {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            KValue::Int(n) => write!(f, "{n}"),
            KValue::Str(s) => write!(f, "\"{s}\""),
            KValue::IntArray(elements) => {
                let rendered: Vec<String> = elements.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            KValue::StrArray(elements) => {
                let rendered: Vec<String> = elements.iter().map(|e| format!("\"{e}\"")).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

/// Converts a RegLang string into a number.
///
/// Accepts a decimal digit sequence or a `0x`-prefixed hexadecimal literal;
/// anything else (including values outside the 64-bit range) yields `None`.
#[must_use]
pub fn string_to_int(value: &str) -> Option<i64> {
    if let Some(hex) = value.strip_prefix("0x") {
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return i64::from_str_radix(hex, 16).ok();
        }
        return None;
    }
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return value.parse().ok();
    }
    None
}

/// Knowledge bases in declaration order; each base maps item names to values,
/// also in declaration order. The compiler output must be deterministic, so
/// iteration order is part of the contract.
#[derive(Default, Clone, PartialEq, Eq, Debug)]
pub struct KnowledgeMap {
    bases: Vec<(String, Vec<(String, KValue)>)>,
}

impl KnowledgeMap {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.iter().all(|(_, items)| items.is_empty())
    }

    /// Looks up one item of one base.
    #[must_use]
    pub fn item(&self, base: &str, item: &str) -> Option<&KValue> {
        self.bases
            .iter()
            .find(|(name, _)| name == base)
            .and_then(|(_, items)| items.iter().find(|(name, _)| name == item))
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn has_base(&self, base: &str) -> bool {
        self.bases.iter().any(|(name, _)| name == base)
    }

    /// Registers an (initially empty) base, making it visible to knowledge
    /// references of subsequent items. Returns the base's item list.
    pub fn base_mut(&mut self, base: &str) -> &mut Vec<(String, KValue)> {
        if let Some(index) = self.bases.iter().position(|(name, _)| name == base) {
            return &mut self.bases[index].1;
        }
        self.bases.push((base.to_string(), Vec::new()));
        &mut self.bases.last_mut().expect("base was just pushed").1
    }

    /// Iterates bases in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(String, KValue)])> {
        self.bases
            .iter()
            .map(|(name, items)| (name.as_str(), items.as_slice()))
    }

    /// Iterates all items as flat `<base>_<item>` constants, the naming used
    /// in emitted MSL.
    pub fn flat(&self) -> impl Iterator<Item = (String, &KValue)> {
        self.bases.iter().flat_map(|(base, items)| {
            items
                .iter()
                .map(move |(item, value)| (format!("{base}_{item}"), value))
        })
    }
}
