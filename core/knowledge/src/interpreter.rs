//! Interpreter for RegLang knowledge bases.
//!
//! Knowledge definitions are constant-folded at compile time: only numbers,
//! strings, arrays, knowledge references, array indexing, `length`, and
//! integer arithmetic may appear. Everything that depends on a transaction,
//! a contract, or an unbound variable raises an [`InterpretationError`].
//!
//! Blocks are interpreted in declaration order and the map is filled
//! incrementally, so later items may reference earlier items of the same
//! base and later bases may reference earlier bases.

use reglang_ast::nodes::{
    AlterOp, Expression, Item, KnowledgeAlter, KnowledgeBaseBlock, KnowledgeEntry, KnowledgeInit,
    Location, OperatorKind, Program,
};

use crate::errors::InterpretationError;
use crate::value::{KValue, KnowledgeMap, string_to_int};

/// The power result magnitude (in decimal digits) beyond which a warning is
/// emitted. Far larger than the 64-bit value domain; kept as an advisory
/// limit for callers that log warnings.
const POWER_WARN_DIGITS: f64 = 4300.0;

/// Interpreter that folds all knowledge definitions into a [`KnowledgeMap`].
///
/// A single instance may interpret many programs serially; per-run state is
/// cleared when a run finishes.
#[derive(Default)]
pub struct KnowledgeBaseInterpreter {
    knowledge: KnowledgeMap,
}

impl KnowledgeBaseInterpreter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) -> KnowledgeMap {
        std::mem::take(&mut self.knowledge)
    }

    /// Interprets every knowledge base block of `program`, in order.
    ///
    /// # Errors
    ///
    /// Returns an [`InterpretationError`] on undefined references,
    /// out-of-range indices, forbidden constructs, or non-convertible string
    /// operands.
    pub fn interpret(&mut self, program: &Program) -> Result<KnowledgeMap, InterpretationError> {
        let run = self.run(program);
        let knowledge = self.reset();
        run?;
        Ok(knowledge)
    }

    fn run(&mut self, program: &Program) -> Result<(), InterpretationError> {
        for item in &program.items {
            if let Item::KnowledgeBase(block) = item {
                self.interpret_block(block)?;
            }
        }
        Ok(())
    }

    fn interpret_block(&mut self, block: &KnowledgeBaseBlock) -> Result<(), InterpretationError> {
        let base_name = block.name.name.clone();
        // register the base up front so its own items can reference it
        self.knowledge.base_mut(&base_name);
        for entry in &block.entries {
            match entry {
                KnowledgeEntry::Init(init) => self.interpret_init(&base_name, init)?,
                KnowledgeEntry::Alter(alter) => self.interpret_alter(&base_name, alter)?,
            }
        }
        Ok(())
    }

    fn interpret_init(
        &mut self,
        base: &str,
        init: &KnowledgeInit,
    ) -> Result<(), InterpretationError> {
        let value = self.eval(&init.value)?;
        let items = self.knowledge.base_mut(base);
        let name = &init.name.name;
        if let Some(slot) = items.iter_mut().find(|(item, _)| item == name) {
            slot.1 = value;
        } else {
            items.push((name.clone(), value));
        }
        Ok(())
    }

    fn interpret_alter(
        &mut self,
        base: &str,
        alter: &KnowledgeAlter,
    ) -> Result<(), InterpretationError> {
        let incoming = self.eval(&alter.value)?;
        let name = &alter.name.name;
        let items = self.knowledge.base_mut(base);
        let Some(slot) = items.iter_mut().find(|(item, _)| item == name) else {
            return Err(InterpretationError::UndefinedKnowledge {
                name: name.clone(),
                location: alter.location.clone(),
            });
        };
        if !slot.1.is_array() {
            return Err(InterpretationError::AlterNonArray {
                name: name.clone(),
                location: alter.location.clone(),
            });
        }
        slot.1 = apply_alter(&slot.1, &incoming, alter.op);
        Ok(())
    }

    fn eval(&self, expr: &Expression) -> Result<KValue, InterpretationError> {
        match expr {
            Expression::Number(number) => {
                string_to_int(&number.value).map(KValue::Int).ok_or_else(|| {
                    InterpretationError::NotConvertible {
                        value: number.value.clone(),
                        location: number.location.clone(),
                    }
                })
            }
            Expression::Str(string) => Ok(KValue::Str(normalize_string(&string.value))),
            Expression::Array(array) => {
                let mut ints = Vec::new();
                let mut strs = Vec::new();
                for element in &array.elements {
                    match element {
                        Expression::Number(number) if strs.is_empty() => {
                            let value = string_to_int(&number.value).ok_or_else(|| {
                                InterpretationError::NotConvertible {
                                    value: number.value.clone(),
                                    location: number.location.clone(),
                                }
                            })?;
                            ints.push(value);
                        }
                        Expression::Str(string) if ints.is_empty() => {
                            strs.push(normalize_string(&string.value));
                        }
                        _ => {
                            return Err(InterpretationError::MixedArray {
                                location: array.location.clone(),
                            });
                        }
                    }
                }
                if strs.is_empty() {
                    Ok(KValue::IntArray(ints))
                } else {
                    Ok(KValue::StrArray(strs))
                }
            }
            Expression::Binary(binary) => {
                let location = binary.location.clone();
                match binary.operator {
                    OperatorKind::Add
                    | OperatorKind::Sub
                    | OperatorKind::Mul
                    | OperatorKind::Div
                    | OperatorKind::Mod
                    | OperatorKind::Pow => {
                        let left = self.eval_int(&binary.left)?;
                        let right = self.eval_int(&binary.right)?;
                        arithmetic(binary.operator, left, right, &location)
                    }
                    OperatorKind::And | OperatorKind::Or => Err(InterpretationError::Forbidden {
                        construct: "logic",
                        location,
                    }),
                    _ => Err(InterpretationError::Forbidden {
                        construct: "comparison",
                        location,
                    }),
                }
            }
            Expression::Length(length) => {
                let value = self.eval(&length.argument)?;
                match value {
                    KValue::IntArray(elements) => int_len(elements.len(), &length.location),
                    KValue::StrArray(elements) => int_len(elements.len(), &length.location),
                    other => Err(InterpretationError::LengthOnNonArray {
                        found: other.shape(),
                        location: length.location.clone(),
                    }),
                }
            }
            Expression::KnowledgeRef(reference) => {
                let base = &reference.base.name;
                let item = &reference.item.name;
                if !self.knowledge.has_base(base) {
                    return Err(InterpretationError::UndefinedKnowledgeBase {
                        name: base.clone(),
                        location: reference.location.clone(),
                    });
                }
                self.knowledge.item(base, item).cloned().ok_or_else(|| {
                    InterpretationError::UndefinedItem {
                        base: base.clone(),
                        item: item.clone(),
                        location: reference.location.clone(),
                    }
                })
            }
            Expression::Index(index) => {
                let array = self.eval(&index.array)?;
                let position = match self.eval(&index.index)? {
                    KValue::Int(n) => n,
                    KValue::Str(s) => string_to_int(&s).ok_or_else(|| {
                        InterpretationError::IndexNotNumber {
                            location: index.location.clone(),
                        }
                    })?,
                    _ => {
                        return Err(InterpretationError::IndexNotNumber {
                            location: index.location.clone(),
                        });
                    }
                };
                let length = match &array {
                    KValue::IntArray(elements) => elements.len(),
                    KValue::StrArray(elements) => elements.len(),
                    _ => 0,
                };
                let in_bounds =
                    position >= 0 && usize::try_from(position).is_ok_and(|p| p < length);
                if !in_bounds {
                    return Err(InterpretationError::IndexOutOfBounds {
                        index: position,
                        length,
                        location: index.location.clone(),
                    });
                }
                let position = usize::try_from(position).expect("bounds were just checked");
                Ok(match array {
                    KValue::IntArray(elements) => KValue::Int(elements[position]),
                    KValue::StrArray(elements) => KValue::Str(elements[position].clone()),
                    _ => unreachable!("non-arrays have length zero and never pass the bounds check"),
                })
            }
            Expression::Count(count) => Err(InterpretationError::Forbidden {
                construct: "count",
                location: count.location.clone(),
            }),
            Expression::Var(var) => Err(InterpretationError::Forbidden {
                construct: "variable reference",
                location: var.location.clone(),
            }),
            Expression::Tx(tx) => Err(InterpretationError::Forbidden {
                construct: "transaction attribute",
                location: tx.location.clone(),
            }),
            Expression::Contract(contract) => Err(InterpretationError::Forbidden {
                construct: "contract attribute",
                location: contract.location.clone(),
            }),
            Expression::Bool(boolean) => Err(InterpretationError::Forbidden {
                construct: "boolean",
                location: boolean.location.clone(),
            }),
            Expression::Not(not) => Err(InterpretationError::Forbidden {
                construct: "logic",
                location: not.location.clone(),
            }),
            Expression::Membership(membership) => Err(InterpretationError::Forbidden {
                construct: "membership",
                location: membership.location.clone(),
            }),
            Expression::Quantifier(quantifier) => Err(InterpretationError::Forbidden {
                construct: "quantifier",
                location: quantifier.location.clone(),
            }),
        }
    }

    /// Evaluates an arithmetic operand, converting convertible strings.
    fn eval_int(&self, expr: &Expression) -> Result<i64, InterpretationError> {
        let location = expr.location();
        match self.eval(expr)? {
            KValue::Int(n) => Ok(n),
            KValue::Str(s) => {
                string_to_int(&s).ok_or(InterpretationError::NotConvertible { value: s, location })
            }
            other => Err(InterpretationError::NotConvertible {
                value: other.to_string(),
                location,
            }),
        }
    }
}

fn normalize_string(token: &str) -> String {
    let lowered = token.to_lowercase();
    lowered
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(&lowered)
        .to_string()
}

fn int_len(len: usize, location: &Location) -> Result<KValue, InterpretationError> {
    i64::try_from(len)
        .map(KValue::Int)
        .map_err(|_| InterpretationError::ArithmeticOverflow {
            op: "length",
            location: location.clone(),
        })
}

fn arithmetic(
    op: OperatorKind,
    left: i64,
    right: i64,
    location: &Location,
) -> Result<KValue, InterpretationError> {
    let overflow = |op| InterpretationError::ArithmeticOverflow {
        op,
        location: location.clone(),
    };
    let result = match op {
        OperatorKind::Add => left.checked_add(right).ok_or(overflow("+"))?,
        OperatorKind::Sub => left.checked_sub(right).ok_or(overflow("-"))?,
        OperatorKind::Mul => left.checked_mul(right).ok_or(overflow("*"))?,
        OperatorKind::Div | OperatorKind::Mod => {
            if right == 0 {
                return Err(InterpretationError::DivisionByZero {
                    location: location.clone(),
                });
            }
            if op == OperatorKind::Div {
                left.checked_div(right).ok_or(overflow("/"))?
            } else {
                left.checked_rem(right).ok_or(overflow("%"))?
            }
        }
        OperatorKind::Pow => {
            if right < 0 {
                return Err(InterpretationError::NegativeExponent {
                    location: location.clone(),
                });
            }
            warn_on_huge_power(left, right);
            let exponent = u32::try_from(right).map_err(|_| overflow("^"))?;
            left.checked_pow(exponent).ok_or(overflow("^"))?
        }
        _ => unreachable!("arithmetic is only invoked on arithmetic operators"),
    };
    Ok(KValue::Int(result))
}

/// Advisory warning for power results whose exact magnitude would exceed
/// `10 ^ POWER_WARN_DIGITS`, reported on the non-fatal channel.
#[allow(clippy::cast_precision_loss)]
fn warn_on_huge_power(base: i64, exponent: i64) {
    if base.unsigned_abs() > 1 {
        let digits = exponent as f64 * (base.unsigned_abs() as f64).log10();
        if digits >= POWER_WARN_DIGITS {
            tracing::warn!(
                base,
                exponent,
                "power expression result exceeds 10^4300; \
                 you probably do not want a value this large"
            );
        }
    }
}

/// Applies `add`/`del` to an array, coercing both sides to strings when
/// their element kinds disagree. The receiver's order is preserved; added
/// elements follow in value order.
fn apply_alter(existing: &KValue, incoming: &KValue, op: AlterOp) -> KValue {
    // the incoming value list is a singleton or an array
    let incoming_ints: Option<Vec<i64>> = match incoming {
        KValue::Int(n) => Some(vec![*n]),
        KValue::IntArray(elements) => Some(elements.clone()),
        KValue::Str(_) | KValue::StrArray(_) => None,
    };
    let incoming_strs: Vec<String> = match incoming {
        KValue::Int(n) => vec![n.to_string()],
        KValue::Str(s) => vec![s.clone()],
        KValue::IntArray(elements) => elements.iter().map(ToString::to_string).collect(),
        KValue::StrArray(elements) => elements.clone(),
    };

    match (existing, incoming_ints) {
        // matching int kinds, or an empty receiver adopting the value kind
        (KValue::IntArray(elements), Some(values)) => {
            KValue::IntArray(alter_elements(elements, &values, op))
        }
        (KValue::IntArray(elements), None) if elements.is_empty() => {
            KValue::StrArray(alter_elements(&[], &incoming_strs, op))
        }
        (KValue::StrArray(elements), ints) => {
            if elements.is_empty() && ints.is_some() {
                let values = ints.expect("checked just above");
                KValue::IntArray(alter_elements(&[], &values, op))
            } else {
                KValue::StrArray(alter_elements(elements, &incoming_strs, op))
            }
        }
        // kinds disagree: stringify both sides element-wise
        (KValue::IntArray(elements), None) => {
            let stringified: Vec<String> = elements.iter().map(ToString::to_string).collect();
            KValue::StrArray(alter_elements(&stringified, &incoming_strs, op))
        }
        _ => unreachable!("alter is only applied to array values"),
    }
}

fn alter_elements<T: Clone + PartialEq>(existing: &[T], values: &[T], op: AlterOp) -> Vec<T> {
    let mut result = existing.to_vec();
    for value in values {
        match op {
            AlterOp::Add => {
                if !result.contains(value) {
                    result.push(value.clone());
                }
            }
            AlterOp::Del => {
                if let Some(position) = result.iter().position(|element| element == value) {
                    result.remove(position);
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use reglang_ast::builder::parse_program;

    fn interpret(source: &str) -> Result<KnowledgeMap, InterpretationError> {
        let program = parse_program(source).expect("source should parse");
        KnowledgeBaseInterpreter::new().interpret(&program)
    }

    #[test]
    fn add_and_del_preserve_order_and_deduplicate() {
        let map = interpret(
            "knowledgebase kb\n\
             knowledge foo = [1, 2, 3];\n\
             foo.add(4);\n\
             foo.del(2);\n\
             end",
        )
        .unwrap();
        assert_eq!(map.item("kb", "foo"), Some(&KValue::IntArray(vec![1, 3, 4])));
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let map = interpret(
            "knowledgebase kb\n\
             knowledge foo = [1];\n\
             foo.add([1]);\n\
             end",
        )
        .unwrap();
        assert_eq!(map.item("kb", "foo"), Some(&KValue::IntArray(vec![1])));
    }

    #[test]
    fn mixed_kinds_coerce_to_strings() {
        let map = interpret(
            "knowledgebase kb\n\
             knowledge a = [1];\n\
             a.add(\"2\");\n\
             knowledge b = [\"2\"];\n\
             b.add(1);\n\
             end",
        )
        .unwrap();
        assert_eq!(
            map.item("kb", "a"),
            Some(&KValue::StrArray(vec!["1".to_string(), "2".to_string()]))
        );
        assert_eq!(
            map.item("kb", "b"),
            Some(&KValue::StrArray(vec!["2".to_string(), "1".to_string()]))
        );
    }

    #[test]
    fn strings_are_lowercased_and_unquoted() {
        let map = interpret("knowledgebase kb knowledge s = \"BAR\"; end").unwrap();
        assert_eq!(map.item("kb", "s"), Some(&KValue::Str("bar".to_string())));
    }

    #[test]
    fn arithmetic_folds_with_convertible_strings() {
        let map = interpret(
            "knowledgebase kb\n\
             knowledge a = 1 + 2 * 3;\n\
             knowledge b = \"0x10\" + \"2\";\n\
             knowledge c = 7 / 2;\n\
             knowledge d = 7 % 2;\n\
             knowledge e = 2 ^ 10;\n\
             end",
        )
        .unwrap();
        assert_eq!(map.item("kb", "a"), Some(&KValue::Int(7)));
        assert_eq!(map.item("kb", "b"), Some(&KValue::Int(18)));
        assert_eq!(map.item("kb", "c"), Some(&KValue::Int(3)));
        assert_eq!(map.item("kb", "d"), Some(&KValue::Int(1)));
        assert_eq!(map.item("kb", "e"), Some(&KValue::Int(1024)));
    }

    #[test]
    fn non_convertible_strings_fail_arithmetic() {
        for source in [
            "knowledgebase k knowledge foo = \"bar\" + 1; end",
            "knowledgebase k knowledge foo = \"0x1\" + \"baz\"; end",
            "knowledgebase k knowledge foo = \"bar\" * \"1\"; end",
            "knowledgebase k knowledge foo = 10 * \"baz\"; end",
            "knowledgebase k knowledge foo = 2 ^ \"3.0\"; end",
            "knowledgebase k knowledge foo = \"2.0\" ^ 3; end",
        ] {
            assert!(
                matches!(
                    interpret(source),
                    Err(InterpretationError::NotConvertible { .. })
                ),
                "expected NotConvertible for {source}"
            );
        }
    }

    #[test]
    fn forbidden_constructs_are_rejected() {
        for source in [
            "knowledgebase t knowledge foo = bar; end",
            "knowledgebase t knowledge foo = tx.from; end",
            "knowledgebase t knowledge foo = tx.readset(bar).baz; end",
            "knowledgebase t knowledge foo = tx.args.bar; end",
            "knowledgebase t knowledge foo = contract(bar).name; end",
            "knowledgebase t knowledge foo = contract(bar).state.baz; end",
            "knowledgebase t knowledge foo = count(true, false); end",
        ] {
            assert!(
                matches!(interpret(source), Err(InterpretationError::Forbidden { .. })),
                "expected Forbidden for {source}"
            );
        }
    }

    #[test]
    fn alter_of_undefined_knowledge_fails() {
        let result = interpret(
            "knowledgebase kb\n\
             knowledge foo = 2;\n\
             bar.add(1);\n\
             end",
        );
        assert!(matches!(
            result,
            Err(InterpretationError::UndefinedKnowledge { .. })
        ));
    }

    #[test]
    fn alter_of_non_array_fails() {
        let result = interpret(
            "knowledgebase kb\n\
             knowledge foo = 2;\n\
             foo.add(1);\n\
             end",
        );
        assert!(matches!(
            result,
            Err(InterpretationError::AlterNonArray { .. })
        ));
    }

    #[test]
    fn cross_base_references_resolve_in_order() {
        let map = interpret(
            "knowledgebase first\n\
             knowledge foo = [1, 2, 3];\n\
             foo.add(4);\n\
             end\n\
             knowledgebase second\n\
             knowledge bar = knowledgebase(first).foo[3];\n\
             end",
        )
        .unwrap();
        assert_eq!(map.item("second", "bar"), Some(&KValue::Int(4)));
    }

    #[test]
    fn same_base_references_see_earlier_items() {
        let map = interpret(
            "knowledgebase kb\n\
             knowledge a = 1;\n\
             knowledge b = knowledgebase(kb).a + 1;\n\
             end",
        )
        .unwrap();
        assert_eq!(map.item("kb", "b"), Some(&KValue::Int(2)));
    }

    #[test]
    fn undefined_base_and_item_fail() {
        assert!(matches!(
            interpret(
                "knowledgebase foo knowledge bar = 1; end\n\
                 knowledgebase baz knowledge bar = knowledgebase(buz).bar; end"
            ),
            Err(InterpretationError::UndefinedKnowledgeBase { .. })
        ));
        assert!(matches!(
            interpret(
                "knowledgebase foo knowledge bar = 1; end\n\
                 knowledgebase baz knowledge bar = knowledgebase(foo).buz; end"
            ),
            Err(InterpretationError::UndefinedItem { .. })
        ));
    }

    #[test]
    fn index_errors() {
        assert!(matches!(
            interpret(
                "knowledgebase a knowledge foo = [1, 2, 3]; end\n\
                 knowledgebase b knowledge bar = knowledgebase(a).foo[3]; end"
            ),
            Err(InterpretationError::IndexOutOfBounds { .. })
        ));
        assert!(matches!(
            interpret(
                "knowledgebase a knowledge foo = [1, 2, 3]; end\n\
                 knowledgebase b knowledge bar = knowledgebase(a).foo[\"baz\"]; end"
            ),
            Err(InterpretationError::IndexNotNumber { .. })
        ));
    }

    #[test]
    fn string_index_converts() {
        let map = interpret(
            "knowledgebase a knowledge foo = [1, 2, 3]; end\n\
             knowledgebase b knowledge bar = knowledgebase(a).foo[\"0x2\"]; end",
        )
        .unwrap();
        assert_eq!(map.item("b", "bar"), Some(&KValue::Int(3)));
    }

    #[test]
    fn length_applies_to_arrays_only() {
        let map = interpret("knowledgebase kb knowledge n = length([1, 2, 3]); end").unwrap();
        assert_eq!(map.item("kb", "n"), Some(&KValue::Int(3)));

        assert!(matches!(
            interpret(
                "knowledgebase foo knowledge bar = length([1, 2, 3]); end\n\
                 knowledgebase baz knowledge buz = length(knowledgebase(foo).bar); end"
            ),
            Err(InterpretationError::LengthOnNonArray { .. })
        ));
    }

    #[test]
    fn oversized_power_overflows() {
        assert!(matches!(
            interpret("knowledgebase t knowledge large = \"10\" ^ 4300; end"),
            Err(InterpretationError::ArithmeticOverflow { .. })
        ));
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(matches!(
            interpret("knowledgebase t knowledge x = 1 / 0; end"),
            Err(InterpretationError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn reinit_replaces_and_interpreter_is_reusable() {
        let mut interpreter = KnowledgeBaseInterpreter::new();
        let first = parse_program("knowledgebase kb knowledge x = 1; knowledge x = 2; end")
            .expect("source should parse");
        let map = interpreter.interpret(&first).unwrap();
        assert_eq!(map.item("kb", "x"), Some(&KValue::Int(2)));

        let second = parse_program("knowledgebase other knowledge y = 3; end")
            .expect("source should parse");
        let map = interpreter.interpret(&second).unwrap();
        assert!(map.item("kb", "x").is_none());
        assert_eq!(map.item("other", "y"), Some(&KValue::Int(3)));
    }
}
