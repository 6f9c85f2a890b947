use core::fmt;
use std::{
    fmt::{Display, Formatter},
    rc::Rc,
};

use serde::Serialize;

/// Source span of an AST node, in 1-based lines and columns.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct Location {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_column)
    }
}

macro_rules! ast_nodes {
    (
        $(
            $(#[$outer:meta])*
            pub struct $name:ident {
                $(
                    $(#[$field_attr:meta])*
                    pub $field_name:ident : $field_ty:ty
                ),* $(,)?
            }
        )+
    ) => {
        $(
            $(#[$outer])*
            #[derive(Clone, PartialEq, Eq, Debug, Serialize)]
            pub struct $name {
                pub id: u32,
                pub location: Location,
                $(
                    $(#[$field_attr])*
                    pub $field_name : $field_ty,
                )*
            }
        )+
    };
}

macro_rules! ast_enum {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$arm_attr:meta])*
                $arm:ident($inner:ty),
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, PartialEq, Eq, Debug, Serialize)]
        pub enum $name {
            $(
                $(#[$arm_attr])*
                $arm($inner),
            )*
        }

        impl $name {
            #[must_use]
            pub fn id(&self) -> u32 {
                match self {
                    $( $name::$arm(n) => n.id, )*
                }
            }

            #[must_use]
            pub fn location(&self) -> Location {
                match self {
                    $( $name::$arm(n) => n.location.clone(), )*
                }
            }
        }
    };
}

ast_enum! {
    /// A top-level declaration.
    pub enum Item {
        KnowledgeBase(Rc<KnowledgeBaseBlock>),
        Rule(Rc<RuleBlock>),
    }
}

ast_enum! {
    /// One entry of a knowledge base block, in declaration order.
    pub enum KnowledgeEntry {
        Init(Rc<KnowledgeInit>),
        Alter(Rc<KnowledgeAlter>),
    }
}

ast_enum! {
    pub enum Expression {
        Number(Rc<NumberLiteral>),
        Str(Rc<StringLiteral>),
        Bool(Rc<BoolLiteral>),
        Array(Rc<ArrayLiteral>),
        Binary(Rc<BinaryExpression>),
        Not(Rc<NotExpression>),
        Membership(Rc<MembershipExpression>),
        Quantifier(Rc<QuantifierExpression>),
        Count(Rc<CountExpression>),
        Length(Rc<LengthExpression>),
        KnowledgeRef(Rc<KnowledgeRef>),
        Index(Rc<IndexExpression>),
        Tx(Rc<TxAttribute>),
        Contract(Rc<ContractAttribute>),
        Var(Rc<Identifier>),
    }
}

/// Array mutation verb of a `NAME.add(...)` / `NAME.del(...)` entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum AlterOp {
    Add,
    Del,
}

impl Display for AlterOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            AlterOp::Add => write!(f, "add"),
            AlterOp::Del => write!(f, "del"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum CheckKind {
    Require,
    Prohibit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum OperatorKind {
    Pow,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl OperatorKind {
    /// The operator's surface-syntax spelling.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            OperatorKind::Pow => "^",
            OperatorKind::Add => "+",
            OperatorKind::Sub => "-",
            OperatorKind::Mul => "*",
            OperatorKind::Div => "/",
            OperatorKind::Mod => "%",
            OperatorKind::And => "and",
            OperatorKind::Or => "or",
            OperatorKind::Eq => "==",
            OperatorKind::Ne => "!=",
            OperatorKind::Lt => "<",
            OperatorKind::Le => "<=",
            OperatorKind::Gt => ">",
            OperatorKind::Ge => ">=",
        }
    }

    #[must_use]
    pub fn is_equality(&self) -> bool {
        matches!(self, OperatorKind::Eq | OperatorKind::Ne)
    }

    #[must_use]
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            OperatorKind::Lt | OperatorKind::Le | OperatorKind::Gt | OperatorKind::Ge
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum QuantifierKind {
    AtLeast,
    AtMost,
    Any,
    All,
}

/// Scalar attributes of a transaction record.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum TxField {
    From,
    To,
    Function,
}

impl Display for TxField {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TxField::From => write!(f, "from"),
            TxField::To => write!(f, "to"),
            TxField::Function => write!(f, "function"),
        }
    }
}

/// Which of the two per-address state maps a `tx` access reads.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum StateSet {
    ReadSet,
    WriteSet,
}

impl Display for StateSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            StateSet::ReadSet => write!(f, "readset"),
            StateSet::WriteSet => write!(f, "writeset"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum ContractField {
    Name,
    Owner,
}

impl Display for ContractField {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ContractField::Name => write!(f, "name"),
            ContractField::Owner => write!(f, "owner"),
        }
    }
}

/// Shape of a `tx.*` access.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum TxAccess {
    Basic(TxField),
    State {
        set: StateSet,
        address: Expression,
        var: Rc<Identifier>,
    },
    Arg {
        var: Rc<Identifier>,
    },
}

/// Shape of a `contract(addr).*` access.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum ContractAccess {
    Basic {
        address: Expression,
        field: ContractField,
    },
    State {
        address: Expression,
        var: Rc<Identifier>,
    },
}

ast_nodes! {

    /// Root of a parsed RegLang source file.
    pub struct Program {
        pub items: Vec<Item>,
    }

    pub struct KnowledgeBaseBlock {
        pub name: Rc<Identifier>,
        pub entries: Vec<KnowledgeEntry>,
    }

    /// `knowledge NAME = expr;`
    pub struct KnowledgeInit {
        pub name: Rc<Identifier>,
        pub value: Expression,
    }

    /// `NAME.add(expr);` or `NAME.del(expr);`
    pub struct KnowledgeAlter {
        pub name: Rc<Identifier>,
        pub op: AlterOp,
        pub value: Expression,
    }

    pub struct RuleBlock {
        pub name: Rc<Identifier>,
        pub scope: Expression,
        pub checks: Vec<Rc<CheckStatement>>,
    }

    pub struct CheckStatement {
        pub kind: CheckKind,
        pub condition: Expression,
    }

    pub struct Identifier {
        pub name: String,
    }

    /// Number literal; the decimal token text is kept verbatim.
    pub struct NumberLiteral {
        pub value: String,
    }

    /// String literal; `value` is the raw token text including the
    /// surrounding double quotes. Consumers normalize at their boundary.
    pub struct StringLiteral {
        pub value: String,
    }

    pub struct BoolLiteral {
        pub value: bool,
    }

    pub struct ArrayLiteral {
        pub elements: Vec<Expression>,
    }

    pub struct BinaryExpression {
        pub left: Expression,
        pub operator: OperatorKind,
        pub right: Expression,
    }

    pub struct NotExpression {
        pub operand: Expression,
    }

    /// `element in knowledgebase(KB).item`
    pub struct MembershipExpression {
        pub element: Expression,
        pub reference: Rc<KnowledgeRef>,
    }

    /// `at least n (cond)` / `at most n (cond)` / `any (cond)` / `all (cond)`.
    /// `bound` is present only for the first two kinds.
    pub struct QuantifierExpression {
        pub kind: QuantifierKind,
        pub bound: Option<Expression>,
        pub condition: Expression,
    }

    pub struct CountExpression {
        pub arguments: Vec<Expression>,
    }

    pub struct LengthExpression {
        pub argument: Expression,
    }

    /// `knowledgebase(KB).item`
    pub struct KnowledgeRef {
        pub base: Rc<Identifier>,
        pub item: Rc<Identifier>,
    }

    pub struct IndexExpression {
        pub array: Expression,
        pub index: Expression,
    }

    pub struct TxAttribute {
        pub access: TxAccess,
    }

    pub struct ContractAttribute {
        pub access: ContractAccess,
    }

}
