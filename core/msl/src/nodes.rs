//! The MSL abstract syntax tree.
//!
//! A single [`Node`] sum with one variant per MSL construct, so that the
//! serializer, type inference, and the satisfiability lowering can match
//! exhaustively. Nodes are plain value trees: `Eq`/`Hash` are derived, and
//! passes that need per-node bookkeeping key their maps by node value, so
//! structurally identical subtrees share one entry.
//!
//! String literal nodes carry their surrounding double quotes; every producer
//! and consumer of [`Node::Str`] relies on that convention.

use core::fmt;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EqualityOp {
    Eq,
    Ne,
}

impl EqualityOp {
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            EqualityOp::Eq => "==",
            EqualityOp::Ne => "!=",
        }
    }
}

impl Display for EqualityOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AddOp {
    Add,
    Sub,
}

impl AddOp {
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            AddOp::Add => "+",
            AddOp::Sub => "-",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MulOp {
    Mul,
    Div,
    Mod,
}

impl MulOp {
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            MulOp::Mul => "*",
            MulOp::Div => "/",
            MulOp::Mod => "%",
        }
    }
}

/// One MSL AST node.
///
/// The variants mirror the MSL constructs emitted by the rule transformer:
/// conditional expressions, assignments, boolean connectives, comparisons,
/// arithmetic, calls, attribute and item access, literals, and the
/// transition body that groups one statement per rule block.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Node {
    /// `guard ? then : otherwise`
    Conditional(Box<Node>, Box<Node>, Box<Node>),
    /// `target = value;`
    Assign(Box<Node>, Box<Node>),
    /// `;`
    Skip,
    Or(Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Equality(Box<Node>, EqualityOp, Box<Node>),
    Compare(Box<Node>, CompareOp, Box<Node>),
    Add(Box<Node>, AddOp, Box<Node>),
    Mul(Box<Node>, MulOp, Box<Node>),
    /// `base ** exponent`, right-associative
    Power(Box<Node>, Box<Node>),
    /// `name(arg, ...)`
    Call(String, Vec<Node>),
    Var(String),
    /// `obj.name`
    GetAttr(Box<Node>, String),
    /// `obj[index]`
    GetItem(Box<Node>, Box<Node>),
    Array(Vec<Node>),
    /// Numeric literal text, emitted verbatim.
    Number(String),
    /// String literal text including its surrounding double quotes.
    Str(String),
    True,
    False,
    TransitionBody(Vec<Node>),
}

impl Node {
    #[must_use]
    pub fn conditional(guard: Node, then: Node, otherwise: Node) -> Node {
        Node::Conditional(Box::new(guard), Box::new(then), Box::new(otherwise))
    }

    #[must_use]
    pub fn assign(target: Node, value: Node) -> Node {
        Node::Assign(Box::new(target), Box::new(value))
    }

    #[must_use]
    pub fn or(left: Node, right: Node) -> Node {
        Node::Or(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn and(left: Node, right: Node) -> Node {
        Node::And(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn not(operand: Node) -> Node {
        Node::Not(Box::new(operand))
    }

    #[must_use]
    pub fn equality(left: Node, op: EqualityOp, right: Node) -> Node {
        Node::Equality(Box::new(left), op, Box::new(right))
    }

    #[must_use]
    pub fn compare(left: Node, op: CompareOp, right: Node) -> Node {
        Node::Compare(Box::new(left), op, Box::new(right))
    }

    #[must_use]
    pub fn add(left: Node, op: AddOp, right: Node) -> Node {
        Node::Add(Box::new(left), op, Box::new(right))
    }

    #[must_use]
    pub fn mul(left: Node, op: MulOp, right: Node) -> Node {
        Node::Mul(Box::new(left), op, Box::new(right))
    }

    #[must_use]
    pub fn power(base: Node, exponent: Node) -> Node {
        Node::Power(Box::new(base), Box::new(exponent))
    }

    #[must_use]
    pub fn call(name: impl Into<String>, arguments: Vec<Node>) -> Node {
        Node::Call(name.into(), arguments)
    }

    #[must_use]
    pub fn var(name: impl Into<String>) -> Node {
        Node::Var(name.into())
    }

    #[must_use]
    pub fn getattr(obj: Node, name: impl Into<String>) -> Node {
        Node::GetAttr(Box::new(obj), name.into())
    }

    #[must_use]
    pub fn getitem(obj: Node, index: Node) -> Node {
        Node::GetItem(Box::new(obj), Box::new(index))
    }

    #[must_use]
    pub fn number(literal: impl Into<String>) -> Node {
        Node::Number(literal.into())
    }

    /// Builds a string literal node from bare text, adding the quotes the
    /// serializer expects.
    #[must_use]
    pub fn quoted(text: &str) -> Node {
        Node::Str(format!("\"{text}\""))
    }

    /// Operator precedence, tightest first. `None` for leaves, calls, and
    /// statements, which never need parentheses.
    #[must_use]
    pub fn precedence(&self) -> Option<u8> {
        match self {
            Node::Power(..) => Some(1),
            Node::Mul(..) => Some(2),
            Node::Add(..) => Some(3),
            Node::Equality(..) => Some(4),
            Node::Compare(..) => Some(5),
            Node::Not(..) => Some(6),
            Node::And(..) => Some(7),
            Node::Or(..) => Some(8),
            Node::Conditional(..) => Some(9),
            _ => None,
        }
    }
}
