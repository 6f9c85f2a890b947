//! Lowers compiled rules into solver formulas and checks satisfiability.

use reglang_knowledge::value::{KValue, KnowledgeMap, string_to_int};
use reglang_msl::nodes::{AddOp, CompareOp, EqualityOp, MulOp, Node};
use reglang_msl::serializer::serialize;
use reglang_type_checker::inference::{MslTypeInference, TypeMap};
use reglang_type_checker::type_info::TypeLabel;
use rustc_hash::FxHashMap;

use crate::solver::{SatResult, Solver};
use crate::term::{Kind, Sort, Term};

/// Checks whether compiled rules can pass without emitting an error code.
///
/// For each rule statement, the conjunction of the rule's guard and the
/// negation of every check predicate is asserted; `check_sat` then asks
/// whether some input satisfies the guard while triggering no check.
///
/// Knowledge references lower to literal terms. Every other variable,
/// attribute path, and string-indexed access becomes a declared constant
/// keyed by its serialized path, so identical paths share one symbol. The
/// `reglang.count_*` helpers are modeled as uninterpreted integer constants
/// keyed by their serialized call.
pub struct RuleSatChecker<S: Solver> {
    solver: S,
    knowledge: FxHashMap<String, KValue>,
    knowledge_map: KnowledgeMap,
    symbols: FxHashMap<String, Term>,
}

impl<S: Solver> RuleSatChecker<S> {
    #[must_use]
    pub fn new(solver: S, knowledge: KnowledgeMap) -> Self {
        let flat = knowledge
            .flat()
            .map(|(name, value)| (name, value.clone()))
            .collect();
        Self {
            solver,
            knowledge: flat,
            knowledge_map: knowledge,
            symbols: FxHashMap::default(),
        }
    }

    /// The underlying solver, for inspecting declarations and assertions.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Clears per-run scratch state. Called at the start of every check, so
    /// a single checker instance can serve many compilations.
    pub fn reset(&mut self) {
        self.symbols.clear();
        self.solver.reset_assertions();
    }

    /// Lowers and asserts every rule of a transition body, then checks
    /// satisfiability.
    ///
    /// # Panics
    ///
    /// Panics when `body` is not a transition body produced by the rule
    /// transformer.
    pub fn check(&mut self, body: &Node) -> SatResult {
        self.reset();
        let types = MslTypeInference::new(&self.knowledge_map).infer(body);

        let Node::TransitionBody(statements) = body else {
            panic!("satisfiability checking starts at a transition body");
        };
        for statement in statements {
            let Node::Assign(_, value) = statement else {
                continue;
            };
            let Node::Conditional(premise, chain, _) = &**value else {
                panic!("rule statements assign a conditional expression");
            };

            let mut conditions = Vec::new();
            let mut candidate = chain.as_ref();
            while let Node::Conditional(condition, _, rest) = candidate {
                conditions.push(condition.as_ref());
                candidate = rest.as_ref();
            }
            assert!(
                matches!(candidate, Node::GetAttr(..)),
                "check chains end at output.value"
            );

            // the rule passes silently: the guard holds and no check fires
            let mut operands = vec![self.lower(premise, &types)];
            for condition in conditions {
                let negated = negate(condition);
                operands.push(self.lower(&negated, &types));
            }
            let formula = Term::app(Kind::And, operands);
            self.solver.assert_formula(formula);
        }

        self.solver.check_sat()
    }

    #[allow(clippy::too_many_lines)]
    fn lower(&mut self, node: &Node, types: &TypeMap) -> Term {
        match node {
            Node::True => Term::Bool(true),
            Node::False => Term::Bool(false),
            Node::Number(literal) => Term::Int(string_to_int(literal).unwrap_or_else(|| {
                panic!("number literal `{literal}` is not convertible")
            })),
            Node::Str(literal) => Term::string(literal.trim_matches('"')),
            Node::Not(operand) => {
                let term = self.lower(operand, types);
                assert!(term.sort() == Sort::Bool, "negation takes a boolean");
                Term::app(Kind::Not, vec![term])
            }
            Node::And(left, right) | Node::Or(left, right) => {
                let kind = if matches!(node, Node::And(..)) {
                    Kind::And
                } else {
                    Kind::Or
                };
                let left = self.lower(left, types);
                let right = self.lower(right, types);
                assert!(
                    left.sort() == Sort::Bool && right.sort() == Sort::Bool,
                    "connectives take booleans"
                );
                Term::app(kind, vec![left, right])
            }
            Node::Equality(left, op, right) => {
                let left = self.lower(left, types);
                let right = self.lower(right, types);
                assert!(
                    left.sort() == right.sort(),
                    "equality operands must share a sort"
                );
                let kind = match op {
                    EqualityOp::Eq => Kind::Equal,
                    EqualityOp::Ne => Kind::Distinct,
                };
                Term::app(kind, vec![left, right])
            }
            Node::Compare(left, op, right) => {
                let left = self.lower(left, types);
                let right = self.lower(right, types);
                assert!(
                    left.sort() == right.sort(),
                    "comparison operands must share a sort"
                );
                let kind = match op {
                    CompareOp::Lt => Kind::Lt,
                    CompareOp::Le => Kind::Leq,
                    CompareOp::Gt => Kind::Gt,
                    CompareOp::Ge => Kind::Geq,
                };
                Term::app(kind, vec![left, right])
            }
            Node::Add(left, op, right) => {
                let kind = match op {
                    AddOp::Add => Kind::Add,
                    AddOp::Sub => Kind::Sub,
                };
                Term::app(
                    kind,
                    vec![self.lower(left, types), self.lower(right, types)],
                )
            }
            Node::Mul(left, op, right) => {
                let kind = match op {
                    MulOp::Mul => Kind::Mult,
                    MulOp::Div => Kind::IntsDivision,
                    MulOp::Mod => Kind::IntsModulus,
                };
                Term::app(
                    kind,
                    vec![self.lower(left, types), self.lower(right, types)],
                )
            }
            Node::Power(base, exponent) => Term::app(
                Kind::Pow,
                vec![self.lower(base, types), self.lower(exponent, types)],
            ),
            Node::Call(name, arguments) => self.lower_call(node, name, arguments, types),
            Node::Var(name) => {
                if let Some(value) = self.knowledge.get(name) {
                    return const_to_term(value);
                }
                let sort = sort_of(types, node);
                self.symbol(name.clone(), sort)
            }
            Node::GetAttr(..) => {
                let sort = sort_of(types, node);
                self.symbol(serialize(node), sort)
            }
            Node::GetItem(obj, index) => {
                if matches!(**index, Node::Str(_)) {
                    // string-indexed map access becomes one symbol per path
                    let sort = sort_of(types, node);
                    return self.symbol(serialize(node), sort);
                }
                // integer-indexed access reads a sequence: knowledge arrays
                // lower to literal sequences, every other path becomes a
                // sequence symbol keyed by its serialized form
                let sequence = match &**obj {
                    Node::Var(name) if self.knowledge.contains_key(name) => {
                        self.lower(obj, types)
                    }
                    Node::Array(_) => self.lower(obj, types),
                    _ => {
                        let sort = match sort_of(types, obj) {
                            sort @ Sort::Seq(_) => sort,
                            element => Sort::seq_of(element),
                        };
                        self.symbol(serialize(obj), sort)
                    }
                };
                let position = self.lower(index, types);
                assert!(
                    sequence.sort().element().is_some(),
                    "integer indexing applies to sequences"
                );
                Term::app(Kind::SeqNth, vec![sequence, position])
            }
            Node::Array(elements) => {
                assert!(!elements.is_empty(), "arrays are never empty");
                let units = elements
                    .iter()
                    .map(|element| {
                        let term = self.lower(element, types);
                        Term::app(Kind::SeqUnit, vec![term])
                    })
                    .collect();
                Term::app(Kind::SeqConcat, units)
            }
            other => panic!("satisfiability lowering does not visit {other:?}"),
        }
    }

    fn lower_call(
        &mut self,
        call: &Node,
        name: &str,
        arguments: &[Node],
        types: &TypeMap,
    ) -> Term {
        match name {
            "length" => {
                assert!(arguments.len() == 1, "length takes one argument");
                let sequence = self.lower(&arguments[0], types);
                Term::app(Kind::SeqLength, vec![sequence])
            }
            "reglang.contains" => {
                assert!(arguments.len() == 2, "contains takes two arguments");
                let sequence = self.lower(&arguments[0], types);
                let element = self.lower(&arguments[1], types);
                let singleton = Term::app(Kind::SeqUnit, vec![element]);
                Term::app(Kind::SeqContains, vec![sequence, singleton])
            }
            "reglang.count" => {
                assert!(arguments.len() == 1, "count takes one array argument");
                let Node::Array(elements) = &arguments[0] else {
                    panic!("count takes a boolean expression array");
                };
                // the number of satisfied conditions: a sum of 0/1 terms
                let mut sum: Option<Term> = None;
                for element in elements {
                    let condition = self.lower(element, types);
                    let indicator = Term::app(
                        Kind::Ite,
                        vec![condition, Term::Int(1), Term::Int(0)],
                    );
                    sum = Some(match sum {
                        None => indicator,
                        Some(total) => Term::app(Kind::Add, vec![total, indicator]),
                    });
                }
                sum.expect("count arrays are never empty")
            }
            "reglang.count_eq" | "reglang.count_neq" | "reglang.count_le"
            | "reglang.count_ge" | "reglang.count_lt" | "reglang.count_gt"
            | "reglang.count_member" => {
                // an uninterpreted integer-valued function of its arguments,
                // one symbol per distinct serialized call
                self.symbol(serialize(call), Sort::Int)
            }
            other => panic!("unexpected function `{other}` in satisfiability lowering"),
        }
    }

    /// Returns the declared constant for `name`, declaring it on first use
    /// so identical paths share one symbol.
    fn symbol(&mut self, name: String, sort: Sort) -> Term {
        if let Some(term) = self.symbols.get(&name) {
            return term.clone();
        }
        self.solver.declare_const(&name, &sort);
        let term = Term::constant(name.clone(), sort);
        self.symbols.insert(name, term.clone());
        term
    }
}

/// Negates a boolean expression, unwrapping an outer negation instead of
/// stacking a second one.
fn negate(node: &Node) -> Node {
    if let Node::Not(inner) = node {
        (**inner).clone()
    } else {
        Node::not(node.clone())
    }
}

fn const_to_term(value: &KValue) -> Term {
    match value {
        KValue::Int(n) => Term::Int(*n),
        KValue::Str(s) => Term::string(s.clone()),
        KValue::IntArray(elements) => {
            let units = elements
                .iter()
                .map(|e| Term::app(Kind::SeqUnit, vec![Term::Int(*e)]))
                .collect();
            Term::app(Kind::SeqConcat, units)
        }
        KValue::StrArray(elements) => {
            let units = elements
                .iter()
                .map(|e| Term::app(Kind::SeqUnit, vec![Term::string(e.clone())]))
                .collect();
            Term::app(Kind::SeqConcat, units)
        }
    }
}

fn sort_of(types: &TypeMap, node: &Node) -> Sort {
    let label = types.get(node).copied().unwrap_or(TypeLabel::Unknown);
    match label {
        TypeLabel::Str => Sort::Str,
        TypeLabel::Bool => Sort::Bool,
        TypeLabel::IntArray => Sort::seq_of(Sort::Int),
        TypeLabel::StrArray => Sort::seq_of(Sort::Str),
        TypeLabel::BoolArray => Sort::seq_of(Sort::Bool),
        // any-arrays and unknowns default to the integer theory
        TypeLabel::AnyArray => Sort::seq_of(Sort::Int),
        TypeLabel::Int | TypeLabel::Unknown => Sort::Int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::RecordingSolver;
    use reglang_ast::builder::parse_program;
    use reglang_codegen::transformer::RuleTransitionBuilder;
    use reglang_knowledge::interpreter::KnowledgeBaseInterpreter;

    fn check(source: &str) -> RuleSatChecker<RecordingSolver> {
        let program = parse_program(source).expect("source should parse");
        let knowledge = KnowledgeBaseInterpreter::new()
            .interpret(&program)
            .expect("knowledge should interpret");
        let body = RuleTransitionBuilder::new()
            .transform(&program)
            .expect("transform should succeed");
        let mut checker = RuleSatChecker::new(RecordingSolver::new(), knowledge);
        assert_eq!(checker.check(&body), SatResult::Unknown);
        checker
    }

    #[test]
    fn guard_and_negated_checks_are_conjoined() {
        let checker = check("rule r when true; prohibit tx.from == \"0xabc\"; end");
        let assertions = &checker.solver().assertions;
        assert_eq!(assertions.len(), 1);
        let expected = Term::app(
            Kind::And,
            vec![
                Term::Bool(true),
                Term::app(
                    Kind::Not,
                    vec![Term::app(
                        Kind::Equal,
                        vec![
                            Term::constant("tx.from", Sort::Str),
                            Term::string("0xabc"),
                        ],
                    )],
                ),
            ],
        );
        assert_eq!(assertions[0], expected);
    }

    #[test]
    fn negating_a_require_unwraps_the_negation() {
        let checker = check("rule r when true; require x > 0; end");
        let assertions = &checker.solver().assertions;
        let expected = Term::app(
            Kind::And,
            vec![
                Term::Bool(true),
                Term::app(
                    Kind::Gt,
                    vec![Term::constant("x", Sort::Int), Term::Int(0)],
                ),
            ],
        );
        assert_eq!(assertions[0], expected);
    }

    #[test]
    fn knowledge_references_lower_to_literal_sequences() {
        let checker = check(
            "knowledgebase kb knowledge allowed = [1, 3]; end\n\
             rule r when true; prohibit x in knowledgebase(kb).allowed; end",
        );
        let sequence = Term::app(
            Kind::SeqConcat,
            vec![
                Term::app(Kind::SeqUnit, vec![Term::Int(1)]),
                Term::app(Kind::SeqUnit, vec![Term::Int(3)]),
            ],
        );
        let contains = Term::app(
            Kind::SeqContains,
            vec![
                sequence,
                Term::app(
                    Kind::SeqUnit,
                    vec![Term::constant("x", Sort::Int)],
                ),
            ],
        );
        let expected = Term::app(
            Kind::And,
            vec![Term::Bool(true), Term::app(Kind::Not, vec![contains])],
        );
        assert_eq!(checker.solver().assertions[0], expected);
    }

    #[test]
    fn integer_indexing_lowers_to_seq_nth() {
        let checker = check(
            "knowledgebase kb knowledge arr = [5, 6]; end\n\
             rule r when knowledgebase(kb).arr[1] == 6; end",
        );
        // empty rules still assert nothing; the guard-only rule is a skip
        assert!(checker.solver().assertions.is_empty());

        let checker = check(
            "knowledgebase kb knowledge arr = [5, 6]; end\n\
             rule r when true; prohibit knowledgebase(kb).arr[1] == 6; end",
        );
        let sequence = Term::app(
            Kind::SeqConcat,
            vec![
                Term::app(Kind::SeqUnit, vec![Term::Int(5)]),
                Term::app(Kind::SeqUnit, vec![Term::Int(6)]),
            ],
        );
        let nth = Term::app(Kind::SeqNth, vec![sequence, Term::Int(1)]);
        let expected = Term::app(
            Kind::And,
            vec![
                Term::Bool(true),
                Term::app(
                    Kind::Not,
                    vec![Term::app(Kind::Equal, vec![nth, Term::Int(6)])],
                ),
            ],
        );
        assert_eq!(checker.solver().assertions[0], expected);
    }

    #[test]
    fn integer_indexing_a_path_declares_a_sequence_symbol() {
        let checker = check("rule r when true; prohibit tx.args.list[0] == 1; end");
        let declaration = checker
            .solver()
            .declarations
            .iter()
            .find(|(name, _)| name == "tx.args[\"list\"]")
            .expect("the indexed path is declared");
        assert_eq!(declaration.1, Sort::seq_of(Sort::Int));
    }

    #[test]
    fn length_lowers_to_seq_length() {
        let checker = check(
            "knowledgebase kb knowledge arr = [5, 6]; end\n\
             rule r when true; require length(knowledgebase(kb).arr) > 1; end",
        );
        let rendered = format!("{:?}", checker.solver().assertions[0]);
        assert!(rendered.contains("SeqLength"), "got: {rendered}");
    }

    #[test]
    fn count_lowers_to_a_sum_of_indicators() {
        let checker = check("rule r when true; prohibit count(x == 1, y == 2) >= 1; end");
        let x_is_one = Term::app(
            Kind::Equal,
            vec![Term::constant("x", Sort::Int), Term::Int(1)],
        );
        let y_is_two = Term::app(
            Kind::Equal,
            vec![Term::constant("y", Sort::Int), Term::Int(2)],
        );
        let indicator =
            |cond: Term| Term::app(Kind::Ite, vec![cond, Term::Int(1), Term::Int(0)]);
        let sum = Term::app(Kind::Add, vec![indicator(x_is_one), indicator(y_is_two)]);
        let expected = Term::app(
            Kind::And,
            vec![
                Term::Bool(true),
                Term::app(
                    Kind::Not,
                    vec![Term::app(Kind::Geq, vec![sum, Term::Int(1)])],
                ),
            ],
        );
        assert_eq!(checker.solver().assertions[0], expected);
    }

    #[test]
    fn quantifier_counters_become_uninterpreted_symbols() {
        let checker = check(
            "knowledgebase kb knowledge risk = [1, 2]; end\n\
             rule r when true;\n\
             require at least 1 (knowledgebase(kb).risk >= 5);\n\
             require at most 3 (knowledgebase(kb).risk >= 5);\n\
             end",
        );
        let counter_declarations = checker
            .solver()
            .declarations
            .iter()
            .filter(|(name, _)| name == "reglang.count_ge(kb_risk, 5)")
            .count();
        // the two quantifiers share the same serialized call
        assert_eq!(counter_declarations, 1);
    }

    #[test]
    fn identical_paths_share_one_symbol() {
        let checker = check(
            "rule r when true;\n\
             prohibit tx.args.amount > 100;\n\
             prohibit tx.args.amount < 0;\n\
             end",
        );
        let declarations: Vec<&str> = checker
            .solver()
            .declarations
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        let amount_declarations = declarations
            .iter()
            .filter(|name| **name == "tx.args[\"amount\"]")
            .count();
        assert_eq!(amount_declarations, 1);
    }

    #[test]
    fn symbol_sorts_follow_the_type_map() {
        let checker = check("rule r when true; prohibit tx.args.amount > 100; end");
        let declaration = checker
            .solver()
            .declarations
            .iter()
            .find(|(name, _)| name == "tx.args[\"amount\"]")
            .expect("the map access is declared");
        assert_eq!(declaration.1, Sort::Int);

        let checker = check("rule r when tx.from == \"0xabc\"; prohibit x == 1; end");
        let declaration = checker
            .solver()
            .declarations
            .iter()
            .find(|(name, _)| name == "tx.from")
            .expect("tx.from is declared");
        assert_eq!(declaration.1, Sort::Str);
    }

    #[test]
    fn checks_reset_between_runs() {
        let program = parse_program("rule r when true; prohibit x == 1; end").unwrap();
        let body = RuleTransitionBuilder::new().transform(&program).unwrap();
        let mut checker = RuleSatChecker::new(RecordingSolver::new(), KnowledgeMap::default());
        checker.check(&body);
        assert_eq!(checker.solver().assertions.len(), 1);
        checker.check(&body);
        assert_eq!(checker.solver().assertions.len(), 1);
    }
}
