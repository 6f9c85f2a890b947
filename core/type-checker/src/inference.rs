//! The MSL type-inference pass.

use reglang_knowledge::value::KnowledgeMap;
use reglang_msl::nodes::Node;
use rustc_hash::FxHashMap;

use crate::type_info::TypeLabel;

/// Map from MSL nodes to their inferred types. Keys are node values, so
/// structurally identical subtrees share one entry; a type forced by
/// context replaces a weaker inferred one.
pub type TypeMap = FxHashMap<Node, TypeLabel>;

/// Infers types for the nodes of a rule transition body.
///
/// Not every node is visited; only those relevant to satisfiability
/// checking. Some node kinds have known types and propagate expectations to
/// their children (logical connectives take booleans, arithmetic takes
/// integers). Equality can hold integers or strings, so its operands are
/// visited first and the first known type is propagated to the other side.
/// A node with neither a known type nor helpful children (a plain variable
/// reference) gets its type from the context that uses it.
pub struct MslTypeInference {
    knowledge_types: FxHashMap<String, TypeLabel>,
    types: TypeMap,
}

impl MslTypeInference {
    /// Builds the pass with the types of the interpreted knowledge items,
    /// keyed by their flat `<base>_<item>` constant names.
    #[must_use]
    pub fn new(knowledge: &KnowledgeMap) -> Self {
        let knowledge_types = knowledge
            .flat()
            .map(|(name, value)| (name, TypeLabel::of_knowledge(value)))
            .collect();
        Self {
            knowledge_types,
            types: FxHashMap::default(),
        }
    }

    /// Runs inference over a transition body and returns the type map.
    ///
    /// # Panics
    ///
    /// Panics when `body` is not a transition body of rule statements as
    /// produced by the rule transformer; malformed shapes are programmer
    /// errors, not user errors.
    #[must_use]
    pub fn infer(mut self, body: &Node) -> TypeMap {
        let Node::TransitionBody(statements) = body else {
            panic!("type inference starts at a transition body");
        };
        for statement in statements {
            match statement {
                Node::Skip => {}
                Node::Assign(target, value) => self.infer_rule_statement(target, value),
                other => panic!("unexpected transition statement {other:?}"),
            }
        }
        self.types
    }

    /// Each rule statement is `output.value = guard ? chain : output.value`.
    /// The assignment forces integers on the outer conditional and booleans
    /// on every check guard of the chain.
    fn infer_rule_statement(&mut self, target: &Node, value: &Node) {
        assert!(
            matches!(target, Node::GetAttr(..)),
            "rule statements assign to output.value"
        );
        let Node::Conditional(guard, then_branch, else_branch) = value else {
            panic!("rule statements assign a conditional expression");
        };

        self.types.insert(target.clone(), TypeLabel::Int);
        self.types.insert(value.clone(), TypeLabel::Int);
        self.types.insert((**guard).clone(), TypeLabel::Bool);
        self.types.insert((**then_branch).clone(), TypeLabel::Int);
        self.types.insert((**else_branch).clone(), TypeLabel::Int);

        let mut conditions = vec![guard.as_ref()];
        let mut candidate = then_branch.as_ref();
        while let Node::Conditional(condition, _, rest) = candidate {
            conditions.push(condition.as_ref());
            candidate = rest.as_ref();
        }
        assert!(
            matches!(candidate, Node::GetAttr(..)),
            "check chains end at output.value"
        );

        for condition in conditions {
            self.types.insert(condition.clone(), TypeLabel::Bool);
            self.visit(condition);
        }
    }

    #[allow(clippy::too_many_lines)]
    fn visit(&mut self, node: &Node) -> TypeLabel {
        match node {
            Node::Not(operand) => {
                self.expect(operand, TypeLabel::Bool);
                TypeLabel::Bool
            }
            Node::And(left, right) | Node::Or(left, right) => {
                self.expect(left, TypeLabel::Bool);
                self.expect(right, TypeLabel::Bool);
                TypeLabel::Bool
            }
            Node::Compare(left, _, right) => {
                self.expect(left, TypeLabel::Int);
                self.expect(right, TypeLabel::Int);
                TypeLabel::Bool
            }
            Node::Equality(left, _, right) => {
                let left_type = self.visit(left);
                let right_type = self.visit(right);
                let unified = if left_type == TypeLabel::Int || right_type == TypeLabel::Int {
                    TypeLabel::Int
                } else if left_type == TypeLabel::Str || right_type == TypeLabel::Str {
                    TypeLabel::Str
                } else {
                    assert!(
                        left_type == TypeLabel::Unknown && right_type == TypeLabel::Unknown,
                        "equality operands must be int, string, or unknown: \
                         {left_type} != {right_type}"
                    );
                    TypeLabel::Int
                };
                self.types.insert((**left).clone(), unified);
                self.types.insert((**right).clone(), unified);
                TypeLabel::Bool
            }
            Node::Add(left, _, right) | Node::Mul(left, _, right) => {
                self.expect(left, TypeLabel::Int);
                self.expect(right, TypeLabel::Int);
                TypeLabel::Int
            }
            Node::Power(base, exponent) => {
                self.expect(base, TypeLabel::Int);
                self.expect(exponent, TypeLabel::Int);
                TypeLabel::Int
            }
            Node::Call(name, arguments) => self.visit_call(node, name, arguments),
            Node::Var(name) => {
                let var_type = self
                    .knowledge_types
                    .get(name)
                    .copied()
                    .unwrap_or(TypeLabel::Unknown);
                self.context_or(node, var_type)
            }
            // getitem objects are never visited recursively; a string index
            // marks a map access, anything else is an array position
            Node::GetItem(_, index) => {
                if !matches!(**index, Node::Str(_)) {
                    self.expect(index, TypeLabel::Int);
                }
                self.context_or(node, TypeLabel::Unknown)
            }
            Node::GetAttr(obj, attr) => {
                // output.value, tx.from/to/function, contract[addr].name/owner
                if attr == "value" && matches!(&**obj, Node::Var(name) if name == "output") {
                    return TypeLabel::Int;
                }
                if matches!(attr.as_str(), "from" | "to" | "function")
                    && matches!(&**obj, Node::Var(name) if name == "tx")
                {
                    return TypeLabel::Str;
                }
                if matches!(attr.as_str(), "name" | "owner")
                    && matches!(
                        &**obj,
                        Node::GetItem(base, _) if matches!(&**base, Node::Var(name) if name == "contract")
                    )
                {
                    return TypeLabel::Str;
                }
                self.context_or(node, TypeLabel::Unknown)
            }
            Node::Array(elements) => {
                assert!(!elements.is_empty(), "arrays are never empty");
                if elements.iter().all(|e| matches!(e, Node::Number(_))) {
                    return TypeLabel::IntArray;
                }
                if elements.iter().all(|e| matches!(e, Node::Str(_))) {
                    return TypeLabel::StrArray;
                }
                for element in elements {
                    self.types.insert(element.clone(), TypeLabel::Bool);
                    self.visit(element);
                }
                TypeLabel::BoolArray
            }
            Node::True | Node::False => TypeLabel::Bool,
            Node::Number(_) => TypeLabel::Int,
            Node::Str(_) => TypeLabel::Str,
            other => panic!("type inference does not visit {other:?}"),
        }
    }

    fn visit_call(&mut self, call: &Node, name: &str, arguments: &[Node]) -> TypeLabel {
        match name {
            "length" => {
                assert!(arguments.len() == 1, "length takes one argument");
                let mut array_type = self.visit(&arguments[0]);
                if !matches!(array_type, TypeLabel::IntArray | TypeLabel::StrArray) {
                    array_type = TypeLabel::AnyArray;
                }
                self.types.insert(arguments[0].clone(), array_type);
                self.context_or(call, TypeLabel::Int)
            }
            "reglang.count" => {
                assert!(arguments.len() == 1, "count takes one array argument");
                let Node::Array(elements) = &arguments[0] else {
                    panic!("count takes a boolean expression array");
                };
                for element in elements {
                    self.types.insert(element.clone(), TypeLabel::Bool);
                    self.visit(element);
                }
                self.context_or(call, TypeLabel::Int)
            }
            "reglang.count_member" => {
                assert!(arguments.len() == 2, "count_member takes two arguments");
                assert!(
                    matches!(arguments[0], Node::Var(_)),
                    "count_member counts within a knowledge array"
                );
                let knowledge_type = self.visit(&arguments[0]);
                assert!(
                    matches!(knowledge_type, TypeLabel::IntArray | TypeLabel::StrArray),
                    "count_member needs a typed knowledge array, got {knowledge_type}"
                );
                self.types.insert(arguments[1].clone(), knowledge_type);
                let array_type = self.visit(&arguments[1]);
                assert!(
                    array_type == knowledge_type || matches!(arguments[1], Node::GetItem(..)),
                    "count_member arguments must share an element kind"
                );
                self.context_or(call, TypeLabel::Int)
            }
            "reglang.contains" => {
                assert!(arguments.len() == 2, "contains takes two arguments");
                assert!(
                    matches!(arguments[0], Node::Var(_)),
                    "contains searches a knowledge array"
                );
                let knowledge_type = self.visit(&arguments[0]);
                assert!(
                    matches!(knowledge_type, TypeLabel::IntArray | TypeLabel::StrArray),
                    "contains needs a typed knowledge array, got {knowledge_type}"
                );
                let element_type = knowledge_type
                    .element()
                    .expect("array labels have element types");
                self.types.insert(arguments[1].clone(), element_type);
                self.visit(&arguments[1]);
                self.context_or(call, TypeLabel::Bool)
            }
            "reglang.count_eq" | "reglang.count_neq" | "reglang.count_le" | "reglang.count_ge"
            | "reglang.count_lt" | "reglang.count_gt" => {
                assert!(arguments.len() == 2, "counting helpers take two arguments");
                let array_type = self.visit(&arguments[0]);
                let element_type = self.visit(&arguments[1]);

                if matches!(element_type, TypeLabel::Int | TypeLabel::Str) {
                    self.types
                        .insert(arguments[0].clone(), TypeLabel::array_of(element_type));
                    self.types.insert(arguments[1].clone(), element_type);
                } else {
                    assert!(
                        matches!(array_type, TypeLabel::IntArray | TypeLabel::StrArray),
                        "at least one counting argument must have a known type"
                    );
                    self.types.insert(arguments[0].clone(), array_type);
                    self.types.insert(
                        arguments[1].clone(),
                        array_type.element().expect("array labels have element types"),
                    );
                }
                self.context_or(call, TypeLabel::Int)
            }
            other => panic!("unexpected function `{other}` in type inference"),
        }
    }

    /// Forces `label` on `node` and visits it with that expectation.
    fn expect(&mut self, node: &Node, label: TypeLabel) {
        self.types.insert(node.clone(), label);
        self.visit(node);
    }

    /// The context-assigned type of `node`, falling back to `inferred`.
    fn context_or(&self, node: &Node, inferred: TypeLabel) -> TypeLabel {
        self.types.get(node).copied().unwrap_or(inferred)
    }
}
