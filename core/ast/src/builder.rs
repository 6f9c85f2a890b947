//! AST builder that converts pest parse trees into typed AST nodes.
//!
//! The `Builder` walks the concrete syntax tree produced by
//! [`ReglangParser`](crate::parser::ReglangParser) and constructs the typed
//! AST defined in [`nodes`](crate::nodes). It assigns unique sequential ids
//! to each node and records source locations from the pest spans.
//!
//! The layered expression grammar (or → and → not → comparison → membership
//! → additive → multiplicative → power → postfix → atom) produces deeply
//! nested single-child pairs for plain atoms; the builder collapses those
//! chains while folding operator chains left-associatively. Keyword pairs
//! (`kw_*`) are structural markers and are skipped.
//!
//! Grammar and builder are kept in lockstep: a pair shape the builder does
//! not recognize is a programmer error, not an input error, and panics.

use std::rc::Rc;

use pest::Parser as _;
use pest::iterators::Pair;

use crate::errors::AstError;
use crate::nodes::{
    AlterOp, ArrayLiteral, BinaryExpression, BoolLiteral, CheckKind, CheckStatement,
    ContractAccess, ContractAttribute, ContractField, CountExpression, Expression, Identifier,
    IndexExpression, Item, KnowledgeAlter, KnowledgeBaseBlock, KnowledgeEntry, KnowledgeInit,
    KnowledgeRef, LengthExpression, Location, MembershipExpression, NotExpression, NumberLiteral,
    OperatorKind, Program, QuantifierExpression, QuantifierKind, RuleBlock, StateSet,
    StringLiteral, TxAccess, TxAttribute, TxField,
};
use crate::parser::{ReglangParser, Rule};

/// Parses RegLang source text into a [`Program`].
///
/// # Errors
///
/// Returns [`AstError::Parse`] when the grammar rejects the source text.
pub fn parse_program(source: &str) -> Result<Rc<Program>, AstError> {
    let mut pairs = ReglangParser::parse(Rule::program, source).map_err(|e| AstError::Parse {
        message: e.to_string(),
    })?;
    let root = pairs.next().expect("a successful parse yields a program");
    let mut builder = Builder::new();
    Ok(builder.build_program(&root))
}

pub struct Builder {
    next_id: u32,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    fn fresh_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn location(pair: &Pair<Rule>) -> Location {
        let span = pair.as_span();
        let (start_line, start_column) = span.start_pos().line_col();
        let (end_line, end_column) = span.end_pos().line_col();
        Location {
            start_line: u32::try_from(start_line).unwrap_or(u32::MAX),
            start_column: u32::try_from(start_column).unwrap_or(u32::MAX),
            end_line: u32::try_from(end_line).unwrap_or(u32::MAX),
            end_column: u32::try_from(end_column).unwrap_or(u32::MAX),
        }
    }

    /// Builds the AST from the root `program` pair.
    ///
    /// # Panics
    ///
    /// Panics if `root` is not a `program` pair or the parse tree shape does
    /// not match the packaged grammar.
    pub fn build_program(&mut self, root: &Pair<Rule>) -> Rc<Program> {
        assert!(
            root.as_rule() == Rule::program,
            "expected a root pair of rule `program`"
        );
        let id = self.fresh_id();
        let location = Self::location(root);
        let mut items = Vec::new();
        for child in root.clone().into_inner() {
            match child.as_rule() {
                Rule::knowledgebase_block => {
                    items.push(Item::KnowledgeBase(self.build_knowledgebase_block(&child)));
                }
                Rule::rule_block => {
                    items.push(Item::Rule(self.build_rule_block(&child)));
                }
                Rule::EOI => {}
                rule => unreachable!("unexpected top-level rule {rule:?}"),
            }
        }
        Rc::new(Program {
            id,
            location,
            items,
        })
    }

    fn build_knowledgebase_block(&mut self, pair: &Pair<Rule>) -> Rc<KnowledgeBaseBlock> {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let mut name = None;
        let mut entries = Vec::new();
        for child in pair.clone().into_inner() {
            match child.as_rule() {
                Rule::name => name = Some(self.build_identifier(&child)),
                Rule::knowledge_init => {
                    entries.push(KnowledgeEntry::Init(self.build_knowledge_init(&child)));
                }
                Rule::knowledge_alter => {
                    entries.push(KnowledgeEntry::Alter(self.build_knowledge_alter(&child)));
                }
                Rule::kw_knowledgebase | Rule::kw_end => {}
                rule => unreachable!("unexpected rule {rule:?} in knowledgebase block"),
            }
        }
        Rc::new(KnowledgeBaseBlock {
            id,
            location,
            name: name.expect("knowledgebase block has a name"),
            entries,
        })
    }

    fn build_knowledge_init(&mut self, pair: &Pair<Rule>) -> Rc<KnowledgeInit> {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let mut inner = pair
            .clone()
            .into_inner()
            .filter(|p| p.as_rule() != Rule::kw_knowledge);
        let name = self.build_identifier(&inner.next().expect("init has a name"));
        let value = self.build_expression(&inner.next().expect("init has a value"));
        Rc::new(KnowledgeInit {
            id,
            location,
            name,
            value,
        })
    }

    fn build_knowledge_alter(&mut self, pair: &Pair<Rule>) -> Rc<KnowledgeAlter> {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let mut inner = pair.clone().into_inner();
        let name = self.build_identifier(&inner.next().expect("alter has a name"));
        let op_pair = inner.next().expect("alter has a verb");
        let op = match op_pair.as_str() {
            "add" => AlterOp::Add,
            "del" => AlterOp::Del,
            verb => unreachable!("unexpected alter verb `{verb}`"),
        };
        let value = self.build_expression(&inner.next().expect("alter has a value"));
        Rc::new(KnowledgeAlter {
            id,
            location,
            name,
            op,
            value,
        })
    }

    fn build_rule_block(&mut self, pair: &Pair<Rule>) -> Rc<RuleBlock> {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let mut name = None;
        let mut scope = None;
        let mut checks = Vec::new();
        for child in pair.clone().into_inner() {
            match child.as_rule() {
                Rule::name => name = Some(self.build_identifier(&child)),
                Rule::or_expr => scope = Some(self.build_expression(&child)),
                Rule::check_stmt => checks.push(self.build_check_stmt(&child)),
                Rule::kw_rule | Rule::kw_when | Rule::kw_end => {}
                rule => unreachable!("unexpected rule {rule:?} in rule block"),
            }
        }
        Rc::new(RuleBlock {
            id,
            location,
            name: name.expect("rule block has a name"),
            scope: scope.expect("rule block has a scope"),
            checks,
        })
    }

    fn build_check_stmt(&mut self, pair: &Pair<Rule>) -> Rc<CheckStatement> {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let mut inner = pair.clone().into_inner();
        let kind_pair = inner.next().expect("check statement has a kind");
        let kind = match kind_pair.as_str() {
            "require" => CheckKind::Require,
            "prohibit" => CheckKind::Prohibit,
            kind => unreachable!("unexpected check kind `{kind}`"),
        };
        let condition = self.build_expression(&inner.next().expect("check has a condition"));
        Rc::new(CheckStatement {
            id,
            location,
            kind,
            condition,
        })
    }

    fn build_identifier(&mut self, pair: &Pair<Rule>) -> Rc<Identifier> {
        let id = self.fresh_id();
        Rc::new(Identifier {
            id,
            location: Self::location(pair),
            name: pair.as_str().to_string(),
        })
    }

    fn build_expression(&mut self, pair: &Pair<Rule>) -> Expression {
        match pair.as_rule() {
            Rule::or_expr => self.build_operator_chain(pair, &[(Rule::kw_or, OperatorKind::Or)]),
            Rule::and_expr => self.build_operator_chain(pair, &[(Rule::kw_and, OperatorKind::And)]),
            Rule::not_expr => self.build_not(pair),
            Rule::comparison => self.build_comparison(pair),
            Rule::membership => self.build_membership(pair),
            Rule::additive | Rule::multiplicative => self.build_arith_chain(pair),
            Rule::power => self.build_power(pair),
            Rule::postfix => self.build_postfix(pair),
            Rule::at_least | Rule::at_most | Rule::any_quant | Rule::all_quant => {
                self.build_quantifier(pair)
            }
            Rule::count_call => self.build_count(pair),
            Rule::length_call => self.build_length(pair),
            Rule::knowledge_ref => Expression::KnowledgeRef(self.build_knowledge_ref(pair)),
            Rule::tx_attr => self.build_tx_attr(pair),
            Rule::contract_attr => self.build_contract_attr(pair),
            Rule::array => self.build_array(pair),
            Rule::number => Expression::Number(Rc::new(NumberLiteral {
                id: self.fresh_id(),
                location: Self::location(pair),
                value: pair.as_str().to_string(),
            })),
            Rule::string => Expression::Str(Rc::new(StringLiteral {
                id: self.fresh_id(),
                location: Self::location(pair),
                value: pair.as_str().to_string(),
            })),
            Rule::boolean => Expression::Bool(Rc::new(BoolLiteral {
                id: self.fresh_id(),
                location: Self::location(pair),
                value: pair.as_str() == "true",
            })),
            Rule::var_ref => {
                let inner = pair
                    .clone()
                    .into_inner()
                    .next()
                    .expect("var_ref wraps a name");
                Expression::Var(self.build_identifier(&inner))
            }
            rule => unreachable!("unexpected expression rule {rule:?}"),
        }
    }

    /// Folds `operand (marker operand)*` into left-associative binary nodes.
    fn build_operator_chain(
        &mut self,
        pair: &Pair<Rule>,
        markers: &[(Rule, OperatorKind)],
    ) -> Expression {
        let location = Self::location(pair);
        let mut result: Option<Expression> = None;
        let mut pending: Option<OperatorKind> = None;
        for child in pair.clone().into_inner() {
            if let Some((_, op)) = markers.iter().find(|(rule, _)| *rule == child.as_rule()) {
                pending = Some(*op);
                continue;
            }
            let operand = self.build_expression(&child);
            result = Some(match (result, pending.take()) {
                (None, None) => operand,
                (Some(left), Some(operator)) => Expression::Binary(Rc::new(BinaryExpression {
                    id: self.fresh_id(),
                    location: location.clone(),
                    left,
                    operator,
                    right: operand,
                })),
                _ => unreachable!("operator chain out of step"),
            });
        }
        result.expect("operator chain has at least one operand")
    }

    fn build_not(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let mut inner = pair.clone().into_inner();
        let first = inner.next().expect("not_expr has a child");
        if first.as_rule() == Rule::kw_not {
            let operand =
                self.build_expression(&inner.next().expect("negation wraps an expression"));
            Expression::Not(Rc::new(NotExpression {
                id: self.fresh_id(),
                location,
                operand,
            }))
        } else {
            self.build_expression(&first)
        }
    }

    fn build_comparison(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let mut inner = pair.clone().into_inner();
        let left = self.build_expression(&inner.next().expect("comparison has a left operand"));
        let Some(op_pair) = inner.next() else {
            return left;
        };
        let operator = match op_pair.as_str() {
            "==" => OperatorKind::Eq,
            "!=" => OperatorKind::Ne,
            "<=" => OperatorKind::Le,
            ">=" => OperatorKind::Ge,
            "<" => OperatorKind::Lt,
            ">" => OperatorKind::Gt,
            op => unreachable!("unexpected comparison operator `{op}`"),
        };
        let right = self.build_expression(&inner.next().expect("comparison has a right operand"));
        Expression::Binary(Rc::new(BinaryExpression {
            id: self.fresh_id(),
            location,
            left,
            operator,
            right,
        }))
    }

    fn build_membership(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let mut inner = pair
            .clone()
            .into_inner()
            .filter(|p| p.as_rule() != Rule::kw_in);
        let element = self.build_expression(&inner.next().expect("membership has an element"));
        let Some(ref_pair) = inner.next() else {
            return element;
        };
        let reference = self.build_knowledge_ref(&ref_pair);
        Expression::Membership(Rc::new(MembershipExpression {
            id: self.fresh_id(),
            location,
            element,
            reference,
        }))
    }

    fn build_arith_chain(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let mut result: Option<Expression> = None;
        let mut pending: Option<OperatorKind> = None;
        for child in pair.clone().into_inner() {
            match child.as_rule() {
                Rule::add_op | Rule::mul_op => {
                    pending = Some(match child.as_str() {
                        "+" => OperatorKind::Add,
                        "-" => OperatorKind::Sub,
                        "*" => OperatorKind::Mul,
                        "/" => OperatorKind::Div,
                        "%" => OperatorKind::Mod,
                        op => unreachable!("unexpected arithmetic operator `{op}`"),
                    });
                }
                _ => {
                    let operand = self.build_expression(&child);
                    result = Some(match (result, pending.take()) {
                        (None, None) => operand,
                        (Some(left), Some(operator)) => {
                            Expression::Binary(Rc::new(BinaryExpression {
                                id: self.fresh_id(),
                                location: location.clone(),
                                left,
                                operator,
                                right: operand,
                            }))
                        }
                        _ => unreachable!("arithmetic chain out of step"),
                    });
                }
            }
        }
        result.expect("arithmetic chain has at least one operand")
    }

    fn build_power(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let mut inner = pair.clone().into_inner();
        let base = self.build_expression(&inner.next().expect("power has a base"));
        let Some(exponent_pair) = inner.next() else {
            return base;
        };
        // the grammar nests the exponent, so `a ^ b ^ c` is right-associative
        let exponent = self.build_expression(&exponent_pair);
        Expression::Binary(Rc::new(BinaryExpression {
            id: self.fresh_id(),
            location,
            left: base,
            operator: OperatorKind::Pow,
            right: exponent,
        }))
    }

    fn build_postfix(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let mut inner = pair.clone().into_inner();
        let mut result = self.build_expression(&inner.next().expect("postfix has an atom"));
        for suffix in inner {
            assert!(suffix.as_rule() == Rule::index_suffix);
            let index_pair = suffix
                .into_inner()
                .next()
                .expect("index suffix wraps an expression");
            let index = self.build_expression(&index_pair);
            result = Expression::Index(Rc::new(IndexExpression {
                id: self.fresh_id(),
                location: location.clone(),
                array: result,
                index,
            }));
        }
        result
    }

    fn build_quantifier(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let kind = match pair.as_rule() {
            Rule::at_least => QuantifierKind::AtLeast,
            Rule::at_most => QuantifierKind::AtMost,
            Rule::any_quant => QuantifierKind::Any,
            Rule::all_quant => QuantifierKind::All,
            rule => unreachable!("unexpected quantifier rule {rule:?}"),
        };
        let mut operands = pair.clone().into_inner().filter(|p| {
            !matches!(
                p.as_rule(),
                Rule::kw_at | Rule::kw_least | Rule::kw_most | Rule::kw_any | Rule::kw_all
            )
        });
        let bound = if matches!(kind, QuantifierKind::AtLeast | QuantifierKind::AtMost) {
            Some(self.build_expression(&operands.next().expect("bounded quantifier has a bound")))
        } else {
            None
        };
        let condition =
            self.build_expression(&operands.next().expect("quantifier has a condition"));
        Expression::Quantifier(Rc::new(QuantifierExpression {
            id: self.fresh_id(),
            location,
            kind,
            bound,
            condition,
        }))
    }

    fn build_count(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let arguments = pair
            .clone()
            .into_inner()
            .filter(|p| p.as_rule() != Rule::kw_count)
            .map(|p| self.build_expression(&p))
            .collect();
        Expression::Count(Rc::new(CountExpression {
            id: self.fresh_id(),
            location,
            arguments,
        }))
    }

    fn build_length(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let argument_pair = pair
            .clone()
            .into_inner()
            .find(|p| p.as_rule() != Rule::kw_length)
            .expect("length call has an argument");
        let argument = self.build_expression(&argument_pair);
        Expression::Length(Rc::new(LengthExpression {
            id: self.fresh_id(),
            location,
            argument,
        }))
    }

    fn build_knowledge_ref(&mut self, pair: &Pair<Rule>) -> Rc<KnowledgeRef> {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let mut names = pair
            .clone()
            .into_inner()
            .filter(|p| p.as_rule() == Rule::name);
        let base = self.build_identifier(&names.next().expect("knowledge ref has a base"));
        let item = self.build_identifier(&names.next().expect("knowledge ref has an item"));
        Rc::new(KnowledgeRef {
            id,
            location,
            base,
            item,
        })
    }

    fn build_tx_attr(&mut self, pair: &Pair<Rule>) -> Expression {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let access_pair = pair
            .clone()
            .into_inner()
            .find(|p| p.as_rule() != Rule::kw_tx)
            .expect("tx attribute has an access");
        let access = match access_pair.as_rule() {
            Rule::tx_basic => TxAccess::Basic(match access_pair.as_str() {
                "from" => TxField::From,
                "to" => TxField::To,
                "function" => TxField::Function,
                field => unreachable!("unexpected tx field `{field}`"),
            }),
            Rule::tx_state => {
                let mut inner = access_pair.into_inner();
                let set_pair = inner.next().expect("tx state names a set");
                let set = match set_pair.as_str() {
                    "readset" => StateSet::ReadSet,
                    "writeset" => StateSet::WriteSet,
                    set => unreachable!("unexpected state set `{set}`"),
                };
                let address =
                    self.build_expression(&inner.next().expect("tx state has an address"));
                let var = self.build_identifier(&inner.next().expect("tx state has a variable"));
                TxAccess::State { set, address, var }
            }
            Rule::tx_args => {
                let var_pair = access_pair
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::name)
                    .expect("tx args has a variable");
                TxAccess::Arg {
                    var: self.build_identifier(&var_pair),
                }
            }
            rule => unreachable!("unexpected tx access rule {rule:?}"),
        };
        Expression::Tx(Rc::new(TxAttribute {
            id,
            location,
            access,
        }))
    }

    fn build_contract_attr(&mut self, pair: &Pair<Rule>) -> Expression {
        let id = self.fresh_id();
        let location = Self::location(pair);
        let mut inner = pair
            .clone()
            .into_inner()
            .filter(|p| p.as_rule() != Rule::kw_contract);
        let address = self.build_expression(&inner.next().expect("contract access has an address"));
        let access_pair = inner.next().expect("contract access has a member");
        let access = match access_pair.as_rule() {
            Rule::contract_basic => ContractAccess::Basic {
                address,
                field: match access_pair.as_str() {
                    "name" => ContractField::Name,
                    "owner" => ContractField::Owner,
                    field => unreachable!("unexpected contract field `{field}`"),
                },
            },
            Rule::contract_state => {
                let var_pair = access_pair
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::name)
                    .expect("contract state has a variable");
                ContractAccess::State {
                    address,
                    var: self.build_identifier(&var_pair),
                }
            }
            rule => unreachable!("unexpected contract access rule {rule:?}"),
        };
        Expression::Contract(Rc::new(ContractAttribute {
            id,
            location,
            access,
        }))
    }

    fn build_array(&mut self, pair: &Pair<Rule>) -> Expression {
        let location = Self::location(pair);
        let elements = pair
            .clone()
            .into_inner()
            .map(|p| self.build_expression(&p))
            .collect();
        Expression::Array(Rc::new(ArrayLiteral {
            id: self.fresh_id(),
            location,
            elements,
        }))
    }
}
