//! Serializes MSL ASTs into plain MSL source text.
//!
//! Parentheses are added only where operator precedence or associativity
//! requires them. Conditional expressions get a line break after the `?`
//! when the rendered condition is long, and long branches are wrapped in an
//! indented parenthesized block, so deeply nested check chains stay
//! readable.

use crate::nodes::Node;

/// Serializes one MSL AST node into MSL source text.
///
/// Statements (`Assign`, `Skip`) include their trailing semicolon; a
/// `TransitionBody` serializes its statements one per line.
#[must_use]
pub fn serialize(node: &Node) -> String {
    match node {
        Node::TransitionBody(stmts) => stmts
            .iter()
            .map(serialize)
            .collect::<Vec<_>>()
            .join("\n"),
        Node::Conditional(guard, then, otherwise) => {
            serialize_conditional(guard, then, otherwise)
        }
        Node::Assign(target, value) => format!("{} = {};", serialize(target), serialize(value)),
        Node::Skip => ";".to_string(),
        Node::Or(left, right) => binary(node, "||", left, right),
        Node::And(left, right) => binary(node, "&&", left, right),
        Node::Not(operand) => {
            let mut operand_str = serialize(operand);
            if matches!(
                **operand,
                Node::Equality(..) | Node::Compare(..) | Node::And(..) | Node::Or(..)
            ) {
                operand_str = format!("({operand_str})");
            }
            format!("!{operand_str}")
        }
        Node::Equality(left, op, right) => binary(node, op.symbol(), left, right),
        Node::Compare(left, op, right) => binary(node, op.symbol(), left, right),
        Node::Add(left, op, right) => binary(node, op.symbol(), left, right),
        Node::Mul(left, op, right) => binary(node, op.symbol(), left, right),
        Node::Power(base, exponent) => binary(node, "**", base, exponent),
        Node::Call(name, arguments) => {
            let arguments = arguments.iter().map(serialize).collect::<Vec<_>>();
            format!("{name}({})", arguments.join(", "))
        }
        Node::Var(name) => name.clone(),
        Node::GetAttr(obj, attr) => format!("{}.{attr}", serialize(obj)),
        Node::GetItem(obj, index) => format!("{}[{}]", serialize(obj), serialize(index)),
        Node::Array(elements) => {
            let elements = elements.iter().map(serialize).collect::<Vec<_>>();
            format!("[{}]", elements.join(", "))
        }
        Node::Number(literal) | Node::Str(literal) => literal.clone(),
        Node::True => "true".to_string(),
        Node::False => "false".to_string(),
    }
}

fn has_higher_precedence(this: &Node, that: &Node) -> bool {
    let this_level = this
        .precedence()
        .expect("binary serialization is only invoked on operator nodes");
    this_level < that.precedence().unwrap_or(0)
}

fn binary(this: &Node, operator: &str, left: &Node, right: &Node) -> String {
    let mut left_str = serialize(left);
    let mut right_str = serialize(right);
    let both_power = matches!(this, Node::Power(..)) && matches!(left, Node::Power(..));
    if has_higher_precedence(this, left) || both_power {
        left_str = format!("({left_str})");
    }
    if has_higher_precedence(this, right) {
        right_str = format!("({right_str})");
    }
    format!("{left_str} {operator} {right_str}")
}

/// A branch longer than this is wrapped in an indented block.
const BRANCH_WRAP_WIDTH: usize = 50;
/// A condition longer than this pushes the then-branch to the next line.
const CONDITION_BREAK_WIDTH: usize = 30;

fn serialize_conditional(guard: &Node, then: &Node, otherwise: &Node) -> String {
    let mut condition_str = serialize(guard);
    if guard.precedence().is_some() {
        condition_str = format!("({condition_str})");
    }
    let then_str = branch(then);
    let else_str = branch(otherwise);
    let line_break = if condition_str.chars().count() < CONDITION_BREAK_WIDTH {
        " "
    } else {
        "\n"
    };
    format!("{condition_str} ?{line_break}{then_str} : {else_str}")
}

fn branch(node: &Node) -> String {
    let rendered = serialize(node);
    if node.precedence().is_none() {
        return rendered;
    }
    if rendered.chars().count() < BRANCH_WRAP_WIDTH {
        format!("({rendered})")
    } else {
        format!("(\n{}\n)", indent(&rendered, "    "))
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
