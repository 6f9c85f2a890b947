//! First-order terms over integers, strings, booleans, and sequences.

use core::fmt;
use std::fmt::{Display, Formatter};

/// The sort of a term.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Sort {
    Bool,
    Int,
    Str,
    Seq(Box<Sort>),
}

impl Sort {
    #[must_use]
    pub fn seq_of(element: Sort) -> Sort {
        Sort::Seq(Box::new(element))
    }

    /// The element sort of a sequence sort.
    #[must_use]
    pub fn element(&self) -> Option<&Sort> {
        match self {
            Sort::Seq(element) => Some(element),
            _ => None,
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::Str => write!(f, "String"),
            Sort::Seq(element) => write!(f, "(Seq {element})"),
        }
    }
}

/// Term constructors understood by the solver.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
    Not,
    And,
    Or,
    Equal,
    Distinct,
    Lt,
    Leq,
    Gt,
    Geq,
    Add,
    Sub,
    Mult,
    IntsDivision,
    IntsModulus,
    Pow,
    Ite,
    SeqUnit,
    SeqConcat,
    SeqLength,
    SeqNth,
    SeqContains,
}

/// A term: a literal, a declared constant, or an application.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Term {
    Int(i64),
    Str(String),
    Bool(bool),
    Const { name: String, sort: Sort },
    App { kind: Kind, args: Vec<Term> },
}

impl Term {
    #[must_use]
    pub fn constant(name: impl Into<String>, sort: Sort) -> Term {
        Term::Const {
            name: name.into(),
            sort,
        }
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Term {
        Term::Str(value.into())
    }

    #[must_use]
    pub fn app(kind: Kind, args: Vec<Term>) -> Term {
        Term::App { kind, args }
    }

    /// Computes the sort of this term.
    ///
    /// # Panics
    ///
    /// Panics on ill-formed applications (for example `SeqNth` of a
    /// non-sequence); the lowering only builds well-sorted terms.
    #[must_use]
    pub fn sort(&self) -> Sort {
        match self {
            Term::Int(_) => Sort::Int,
            Term::Str(_) => Sort::Str,
            Term::Bool(_) => Sort::Bool,
            Term::Const { sort, .. } => sort.clone(),
            Term::App { kind, args } => match kind {
                Kind::Not
                | Kind::And
                | Kind::Or
                | Kind::Equal
                | Kind::Distinct
                | Kind::Lt
                | Kind::Leq
                | Kind::Gt
                | Kind::Geq
                | Kind::SeqContains => Sort::Bool,
                Kind::Add
                | Kind::Sub
                | Kind::Mult
                | Kind::IntsDivision
                | Kind::IntsModulus
                | Kind::Pow
                | Kind::SeqLength => Sort::Int,
                Kind::Ite => args
                    .get(1)
                    .expect("ite has a then-branch")
                    .sort(),
                Kind::SeqUnit => Sort::seq_of(
                    args.first().expect("seq.unit has an element").sort(),
                ),
                Kind::SeqConcat => args
                    .first()
                    .expect("seq.++ has at least one operand")
                    .sort(),
                Kind::SeqNth => {
                    let seq_sort = args.first().expect("seq.nth has a sequence").sort();
                    seq_sort
                        .element()
                        .expect("seq.nth applies to sequences")
                        .clone()
                }
            },
        }
    }
}
