use std::rc::Rc;

use reglang_ast::nodes::Program;

pub(crate) fn parse(source: &str) -> Rc<Program> {
    reglang2msl::parse(source).expect("source should parse")
}

pub(crate) fn compile(source: &str) -> String {
    reglang2msl::compile(source).expect("source should compile")
}

/// Extracts every error code (>= 1000) from emitted MSL, in text order.
pub(crate) fn error_codes(msl: &str) -> Vec<i64> {
    let mut codes = Vec::new();
    let mut digits = String::new();
    for c in msl.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            if let Ok(value) = digits.parse::<i64>() {
                if value >= 1000 {
                    codes.push(value);
                }
            }
            digits.clear();
        }
    }
    codes
}
