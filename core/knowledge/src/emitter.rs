//! Emits MSL constant definitions from an interpreted knowledge map.

use std::fmt::Write as _;

use crate::value::KnowledgeMap;

/// Renders every knowledge item as `const <value> as <base>_<item>;`, one
/// per line in declaration order, followed by a separating blank line when
/// at least one constant was emitted.
#[must_use]
pub fn emit_constants(knowledge: &KnowledgeMap) -> String {
    let mut output = String::new();
    for (name, value) in knowledge.flat() {
        writeln!(output, "const {value} as {name};").expect("writing to a String cannot fail");
    }
    if !output.is_empty() {
        output.push('\n');
    }
    output
}
