//! Lowers RegLang rule blocks into MSL transition statements.
//!
//! Each rule block becomes a single assignment
//! `output.value = scope ? (c1 ? E1 : (c2 ? E2 : ... output.value)) : output.value`
//! where the `Ei` start as placeholder literals and are substituted with the
//! rule's error codes in a second pass. `require` checks are normalized to
//! negated `prohibit` checks, so every conditional guard expresses "the
//! forbidden predicate holds".
//!
//! Quantifiers and membership lower to the `reglang.*` helper family, and
//! the [`TemplateInfo`] context records which helpers and which of the
//! `tx`/`contract` inputs the rules actually reference. That context drives
//! the emitted import list and the input-reading preamble.

use reglang_ast::nodes::{
    CheckKind, ContractAccess, Expression, Item, OperatorKind, Program, QuantifierKind, RuleBlock,
    TxAccess,
};
use reglang_knowledge::value::string_to_int;
use reglang_msl::nodes::{AddOp, CompareOp, EqualityOp, MulOp, Node};

use crate::errors::MaxRuleStatementError;

/// Error code of the first rule block.
pub const ERROR_CODE_BASE: i64 = 1000;
/// Error code distance between consecutive rule blocks.
pub const ERROR_CODE_STEP: i64 = 1000;

/// The predefined helper functions, in canonical import order.
pub const PREDEFINED_FUNCTIONS: [&str; 9] = [
    "reglang.contains",
    "reglang.count",
    "reglang.count_eq",
    "reglang.count_neq",
    "reglang.count_le",
    "reglang.count_ge",
    "reglang.count_lt",
    "reglang.count_gt",
    "reglang.count_member",
];

/// Records which predefined functions and special inputs are used by the
/// transformed rules.
#[derive(Default, Clone, Debug)]
pub struct TemplateInfo {
    pub has_tx_var: bool,
    pub has_contract_var: bool,
    used: [bool; PREDEFINED_FUNCTIONS.len()],
}

impl TemplateInfo {
    fn index_of(name: &str) -> usize {
        PREDEFINED_FUNCTIONS
            .iter()
            .position(|candidate| *candidate == name)
            .unwrap_or_else(|| panic!("unknown predefined function `{name}`"))
    }

    pub fn set_used(&mut self, name: &str, used: bool) {
        self.used[Self::index_of(name)] = used;
    }

    #[must_use]
    pub fn is_used(&self, name: &str) -> bool {
        self.used[Self::index_of(name)]
    }

    /// Used helpers in canonical import order.
    pub fn used_functions(&self) -> impl Iterator<Item = &'static str> {
        PREDEFINED_FUNCTIONS
            .iter()
            .zip(self.used)
            .filter_map(|(name, used)| used.then_some(*name))
    }

    pub fn reset(&mut self) {
        *self = TemplateInfo::default();
    }
}

/// Translates RegLang rules into an MSL transition body.
#[derive(Default)]
pub struct RuleTransitionBuilder {
    pub template_info: TemplateInfo,
}

impl RuleTransitionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowers every rule block of `program` into one statement each and
    /// assigns error codes.
    ///
    /// The usage context in [`template_info`](Self::template_info) is left
    /// populated for the template composer; the caller resets it between
    /// runs.
    ///
    /// # Errors
    ///
    /// Returns [`MaxRuleStatementError`] when a rule carries more checks
    /// than the error-code step permits.
    pub fn transform(&mut self, program: &Program) -> Result<Node, MaxRuleStatementError> {
        let mut statements = Vec::new();
        for item in &program.items {
            if let Item::Rule(block) = item {
                statements.push(self.lower_rule_block(block));
            }
        }
        assign_error_codes(&mut statements)?;
        Ok(Node::TransitionBody(statements))
    }

    fn lower_rule_block(&mut self, block: &RuleBlock) -> Node {
        // the scope is lowered first so helper and input usage is recorded
        // even when the rule has no checks and collapses to a skip
        let guard = self.lower_expression(&block.scope);
        if block.checks.is_empty() {
            return Node::Skip;
        }
        // innermost first: cN ? 1 : output.value, then wrap outwards
        let mut chain = output_value();
        for check in block.checks.iter().rev() {
            let condition = self.lower_check(check.kind, &check.condition);
            chain = Node::conditional(condition, error_code_placeholder(), chain);
        }
        Node::assign(
            output_value(),
            Node::conditional(guard, chain, output_value()),
        )
    }

    /// `require c` is treated as `prohibit (not c)`; a prohibit condition is
    /// used as the conditional guard directly.
    fn lower_check(&mut self, kind: CheckKind, condition: &Expression) -> Node {
        let lowered = self.lower_expression(condition);
        match kind {
            CheckKind::Require => Node::not(lowered),
            CheckKind::Prohibit => lowered,
        }
    }

    fn lower_expression(&mut self, expr: &Expression) -> Node {
        match expr {
            Expression::Number(number) => Node::Number(number.value.clone()),
            // MSL string literals keep their quotes and are lowercased
            Expression::Str(string) => Node::Str(string.value.to_lowercase()),
            Expression::Bool(boolean) => {
                if boolean.value {
                    Node::True
                } else {
                    Node::False
                }
            }
            Expression::Array(array) => {
                Node::Array(array.elements.iter().map(|e| self.lower_expression(e)).collect())
            }
            Expression::Var(var) => Node::Var(var.name.clone()),
            Expression::KnowledgeRef(reference) => Node::Var(format!(
                "{}_{}",
                reference.base.name, reference.item.name
            )),
            Expression::Binary(binary) => self.lower_binary(binary),
            Expression::Not(not) => Node::not(self.lower_expression(&not.operand)),
            Expression::Membership(membership) => {
                self.template_info.set_used("reglang.contains", true);
                let reference = self.lower_expression(&Expression::KnowledgeRef(
                    membership.reference.clone(),
                ));
                let element = self.lower_expression(&membership.element);
                Node::call("reglang.contains", vec![reference, element])
            }
            Expression::Count(count) => {
                self.template_info.set_used("reglang.count", true);
                let elements = count
                    .arguments
                    .iter()
                    .map(|argument| self.lower_expression(argument))
                    .collect();
                Node::call("reglang.count", vec![Node::Array(elements)])
            }
            Expression::Length(length) => {
                Node::call("length", vec![self.lower_expression(&length.argument)])
            }
            Expression::Index(index) => {
                let array = self.lower_expression(&index.array);
                let position = convert_string_to_number(self.lower_expression(&index.index));
                Node::getitem(array, position)
            }
            Expression::Quantifier(quantifier) => self.lower_quantifier(quantifier),
            Expression::Tx(tx) => self.lower_tx_access(&tx.access),
            Expression::Contract(contract) => self.lower_contract_access(&contract.access),
        }
    }

    fn lower_binary(&mut self, binary: &reglang_ast::nodes::BinaryExpression) -> Node {
        match binary.operator {
            OperatorKind::And => Node::and(
                self.lower_expression(&binary.left),
                self.lower_expression(&binary.right),
            ),
            OperatorKind::Or => Node::or(
                self.lower_expression(&binary.left),
                self.lower_expression(&binary.right),
            ),
            OperatorKind::Add | OperatorKind::Sub => {
                let left = convert_string_to_number(self.lower_expression(&binary.left));
                let right = convert_string_to_number(self.lower_expression(&binary.right));
                let op = if binary.operator == OperatorKind::Add {
                    AddOp::Add
                } else {
                    AddOp::Sub
                };
                Node::add(left, op, right)
            }
            OperatorKind::Mul | OperatorKind::Div | OperatorKind::Mod => {
                let left = convert_string_to_number(self.lower_expression(&binary.left));
                let right = convert_string_to_number(self.lower_expression(&binary.right));
                let op = match binary.operator {
                    OperatorKind::Mul => MulOp::Mul,
                    OperatorKind::Div => MulOp::Div,
                    _ => MulOp::Mod,
                };
                Node::mul(left, op, right)
            }
            OperatorKind::Pow => Node::power(
                convert_string_to_number(self.lower_expression(&binary.left)),
                convert_string_to_number(self.lower_expression(&binary.right)),
            ),
            OperatorKind::Eq
            | OperatorKind::Ne
            | OperatorKind::Lt
            | OperatorKind::Le
            | OperatorKind::Gt
            | OperatorKind::Ge => self.lower_comparison(binary),
        }
    }

    /// Comparisons need special treatment when one operand is a string
    /// literal. Only when both operands are strings and at least one of them
    /// cannot be converted to a number is the comparison kept as a string
    /// comparison; otherwise string literals are rewritten to numbers.
    fn lower_comparison(&mut self, binary: &reglang_ast::nodes::BinaryExpression) -> Node {
        let mut left = self.lower_expression(&binary.left);
        let mut right = self.lower_expression(&binary.right);

        let string_comparison = match (&left, &right) {
            (Node::Str(l), Node::Str(r)) => {
                string_to_int(l.trim_matches('"')).is_none()
                    || string_to_int(r.trim_matches('"')).is_none()
            }
            _ => false,
        };
        if !string_comparison {
            if is_numeric_shape(&right) && matches!(left, Node::Str(_)) {
                left = convert_string_to_number(left);
            }
            if is_numeric_shape(&left) && matches!(right, Node::Str(_)) {
                right = convert_string_to_number(right);
            }
        }

        match binary.operator {
            OperatorKind::Eq => Node::equality(left, EqualityOp::Eq, right),
            OperatorKind::Ne => Node::equality(left, EqualityOp::Ne, right),
            OperatorKind::Lt => Node::compare(left, CompareOp::Lt, right),
            OperatorKind::Le => Node::compare(left, CompareOp::Le, right),
            OperatorKind::Gt => Node::compare(left, CompareOp::Gt, right),
            OperatorKind::Ge => Node::compare(left, CompareOp::Ge, right),
            _ => unreachable!("lower_comparison is only invoked on comparison operators"),
        }
    }

    fn lower_quantifier(&mut self, quantifier: &reglang_ast::nodes::QuantifierExpression) -> Node {
        let func_call = self.lower_quantifier_condition(&quantifier.condition);
        match quantifier.kind {
            QuantifierKind::AtLeast | QuantifierKind::AtMost => {
                let bound = quantifier
                    .bound
                    .as_ref()
                    .expect("bounded quantifiers carry a bound");
                let bound = convert_string_to_number(self.lower_expression(bound));
                let op = if quantifier.kind == QuantifierKind::AtLeast {
                    CompareOp::Ge
                } else {
                    CompareOp::Le
                };
                Node::compare(func_call, op, bound)
            }
            QuantifierKind::Any => Node::compare(func_call, CompareOp::Ge, Node::number("1")),
            QuantifierKind::All => {
                let Node::Call(_, arguments) = &func_call else {
                    unreachable!("quantifier conditions lower to helper calls");
                };
                let array_argument = arguments
                    .first()
                    .expect("count helpers take the array first")
                    .clone();
                let length_call = Node::call("length", vec![array_argument]);
                Node::equality(func_call, EqualityOp::Eq, length_call)
            }
        }
    }

    /// Lowers a quantifier condition to the matching `reglang.count_*`
    /// helper. An element-wise comparison `array OP value` picks the
    /// operator-specific counter; a membership condition counts members.
    fn lower_quantifier_condition(&mut self, condition: &Expression) -> Node {
        let lowered = self.lower_expression(condition);
        let (name, arguments) = match lowered {
            Node::Equality(left, op, right) => {
                let name = match op {
                    EqualityOp::Eq => "reglang.count_eq",
                    EqualityOp::Ne => "reglang.count_neq",
                };
                (name, vec![*left, *right])
            }
            Node::Compare(left, op, right) => {
                let name = match op {
                    CompareOp::Le => "reglang.count_le",
                    CompareOp::Ge => "reglang.count_ge",
                    CompareOp::Lt => "reglang.count_lt",
                    CompareOp::Gt => "reglang.count_gt",
                };
                (name, vec![*left, *right])
            }
            Node::Call(name, arguments) if name == "reglang.contains" => {
                ("reglang.count_member", arguments)
            }
            other => panic!("unexpected quantifier condition {other:?}"),
        };
        self.template_info.set_used(name, true);
        Node::call(name, arguments)
    }

    fn lower_tx_access(&mut self, access: &TxAccess) -> Node {
        self.template_info.has_tx_var = true;
        let tx = Node::var("tx");
        match access {
            TxAccess::Basic(field) => Node::getattr(tx, field.to_string()),
            TxAccess::State { set, address, var } => {
                let address = self.lower_expression(address);
                let state = Node::getattr(tx, set.to_string());
                Node::getitem(Node::getitem(state, address), Node::quoted(&var.name))
            }
            TxAccess::Arg { var } => {
                Node::getitem(Node::getattr(tx, "args"), Node::quoted(&var.name))
            }
        }
    }

    fn lower_contract_access(&mut self, access: &ContractAccess) -> Node {
        self.template_info.has_contract_var = true;
        let contract = Node::var("contract");
        match access {
            ContractAccess::Basic { address, field } => {
                let address = self.lower_expression(address);
                Node::getattr(Node::getitem(contract, address), field.to_string())
            }
            ContractAccess::State { address, var } => {
                let address = self.lower_expression(address);
                let state = Node::getattr(Node::getitem(contract, address), "state");
                Node::getitem(state, Node::quoted(&var.name))
            }
        }
    }
}

fn output_value() -> Node {
    Node::getattr(Node::var("output"), "value")
}

/// The literal the numbering pass substitutes with the real error code.
fn error_code_placeholder() -> Node {
    Node::number("1")
}

fn is_numeric_shape(node: &Node) -> bool {
    matches!(
        node,
        Node::Number(_) | Node::Str(_) | Node::Power(..) | Node::Mul(..) | Node::Add(..)
    )
}

/// Rewrites a string literal node into a number literal by stripping its
/// quotes; other nodes pass through.
fn convert_string_to_number(node: Node) -> Node {
    match node {
        Node::Str(literal) => Node::Number(literal.trim_matches('"').to_string()),
        other => other,
    }
}

/// Substitutes the placeholder error codes with the real ones: rule blocks
/// are numbered from [`ERROR_CODE_BASE`] stepping [`ERROR_CODE_STEP`] per
/// non-empty block, and within one block the outermost check receives the
/// smallest code.
fn assign_error_codes(statements: &mut [Node]) -> Result<(), MaxRuleStatementError> {
    let mut prefix = ERROR_CODE_BASE;
    for statement in statements {
        let Node::Assign(_, value) = statement else {
            continue;
        };
        let Node::Conditional(_, chain, _) = value.as_mut() else {
            unreachable!("rule statements assign a conditional expression");
        };
        let depth = conditional_chain_depth(&**chain);
        let depth_code = i64::try_from(depth).unwrap_or(i64::MAX);
        if depth_code >= ERROR_CODE_STEP {
            return Err(MaxRuleStatementError { count: depth });
        }
        let mut codes: Vec<i64> = (1..=depth_code).map(|offset| prefix + offset).rev().collect();
        let mut current = chain.as_mut();
        while let Node::Conditional(_, code_slot, rest) = current {
            let code = codes.pop().expect("one code per chain link");
            **code_slot = Node::Number(code.to_string());
            current = rest.as_mut();
        }
        prefix += ERROR_CODE_STEP;
    }
    Ok(())
}

fn conditional_chain_depth(chain: &Node) -> usize {
    let mut depth = 0;
    let mut current = chain;
    while let Node::Conditional(_, _, rest) = current {
        depth += 1;
        current = rest;
    }
    depth
}
