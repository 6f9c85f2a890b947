//! Composes the final MSL automaton from the transformed rules.
//!
//! The automaton always declares a `tx_input` and a `contract_input` port
//! and a single `output` port. The read-input preamble depends on which
//! inputs the rules reference: an unreferenced input is never requested, and
//! when neither is referenced the automaton goes straight to checking.

use reglang_ast::nodes::Program;
use reglang_msl::serializer::serialize;

use crate::errors::MaxRuleStatementError;
use crate::transformer::{RuleTransitionBuilder, TemplateInfo};

/// Translates the rules of a RegLang program into the import header and the
/// automaton definition of the emitted MSL module.
#[derive(Default)]
pub struct RuleTranslator {
    transition_builder: RuleTransitionBuilder,
}

impl RuleTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `(imports, automaton)` segments for `program`.
    ///
    /// # Errors
    ///
    /// Returns [`MaxRuleStatementError`] when a rule carries more checks
    /// than the error-code step permits.
    pub fn translate(&mut self, program: &Program) -> Result<(String, String), MaxRuleStatementError> {
        let body = self.transition_builder.transform(program)?;
        let rules_segment = serialize(&body);

        // reglang.contains may have been marked by a membership that was
        // later rewritten into reglang.count_member; prune the import when
        // the serialized rules never call it
        if !rules_segment.contains("reglang.contains(") {
            self.transition_builder
                .template_info
                .set_used("reglang.contains", false);
        }

        let imports = import_dependencies(&self.transition_builder.template_info);
        let read_input = construct_read_input(&self.transition_builder.template_info);
        let automaton = automaton_definition(&read_input, &rules_segment);
        self.transition_builder.template_info.reset();

        Ok((imports, automaton))
    }
}

/// One import line per used predefined function, followed by the record
/// type imports every module needs.
fn import_dependencies(template_info: &TemplateInfo) -> String {
    let mut imports = String::new();
    for function in template_info.used_functions() {
        imports.push_str(&format!("import {function}\n"));
    }
    imports.push_str("import reglang.Contract as Contract\nimport reglang.Tx as Tx\n\n");
    imports
}

/// The transitions that read requested inputs before checking starts.
fn construct_read_input(template_info: &TemplateInfo) -> String {
    if !template_info.has_tx_var && !template_info.has_contract_var {
        return "        !checking -> checking = true;".to_string();
    }

    let mut requests = String::new();
    let mut conditions = vec!["!checking".to_string()];
    let mut ports = Vec::new();
    let mut assignments = Vec::new();

    if template_info.has_tx_var {
        requests.push_str("!checking && !tx_input.reqRead -> tx_input.reqRead = true;\n");
        conditions.push("(tx_input.reqRead && tx_input.reqWrite)".to_string());
        ports.push("tx_input");
        assignments.push("tx = tx_input.value;");
    }
    if template_info.has_contract_var {
        requests
            .push_str("!checking && !contract_input.reqRead -> contract_input.reqRead = true;\n");
        conditions.push("(contract_input.reqRead && contract_input.reqWrite)".to_string());
        ports.push("contract_input");
        assignments.push("contract = contract_input.value;");
    }

    let guard = conditions.join(" && ");
    let sync_ports = format!("sync {};", ports.join(", "));
    let read_values = indent(&assignments.join("\n"), "    ");
    let block =
        format!("{requests}{guard} -> {{\n    {sync_ports}\n{read_values}\n    checking = true;\n}}");

    indent(&block, "        ")
}

fn automaton_definition(read_input: &str, rules_segment: &str) -> String {
    let rules = if rules_segment.is_empty() {
        String::new()
    } else {
        format!("{}\n", indent(rules_segment, "            "))
    };
    format!(
        r"automaton Rule (
    tx_input: in Tx,
    contract_input: in Contract,
    output: out int
) {{
    states {{
        bool pass = true;
        bool checking = false;
        Tx tx = null;
        Contract contract = null;
    }}
    transitions {{
{read_input}
        checking -> {{
            output.value = 0;
{rules}            pass = (output.value == 0);
            checking = false;
            sync output;
        }}
    }}
}}
"
    )
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

#[cfg(test)]
mod tests {
    use super::*;
    use reglang_ast::builder::parse_program;

    fn translate(source: &str) -> (String, String) {
        let program = parse_program(source).expect("source should parse");
        RuleTranslator::new()
            .translate(&program)
            .expect("translate should succeed")
    }

    #[test]
    fn no_input_references_yield_the_trivial_preamble() {
        let (imports, automaton) = translate("rule r when x == 1; prohibit y == 2; end");
        assert!(automaton.contains("        !checking -> checking = true;\n"));
        assert!(!automaton.contains("tx_input.reqRead = true"));
        assert_eq!(
            imports,
            "import reglang.Contract as Contract\nimport reglang.Tx as Tx\n\n"
        );
    }

    #[test]
    fn tx_reference_requests_the_tx_port_only() {
        let (_, automaton) = translate("rule r when tx.from == \"0xabc\"; end");
        assert!(
            automaton
                .contains("        !checking && !tx_input.reqRead -> tx_input.reqRead = true;")
        );
        assert!(!automaton.contains("contract_input.reqRead = true"));
        assert!(automaton.contains(
            "        !checking && (tx_input.reqRead && tx_input.reqWrite) -> {\n\
             \x20           sync tx_input;\n\
             \x20           tx = tx_input.value;\n\
             \x20           checking = true;\n\
             \x20       }"
        ));
    }

    #[test]
    fn both_inputs_sync_together() {
        let (_, automaton) = translate(
            "rule r when tx.from == contract(tx.to).owner; prohibit tx.args.x == 1; end",
        );
        assert!(automaton.contains("sync tx_input, contract_input;"));
        assert!(automaton.contains("tx = tx_input.value;"));
        assert!(automaton.contains("contract = contract_input.value;"));
        assert!(automaton.contains(
            "!checking && (tx_input.reqRead && tx_input.reqWrite) && \
             (contract_input.reqRead && contract_input.reqWrite) -> {"
        ));
    }

    #[test]
    fn used_helpers_are_imported_in_canonical_order() {
        let (imports, _) = translate(
            "rule r when true;\n\
             require any (tx.from in knowledgebase(kb).allowed);\n\
             require at least 1 (knowledgebase(kb).risk >= 5);\n\
             end",
        );
        let expected = "import reglang.count_ge\n\
                        import reglang.count_member\n\
                        import reglang.Contract as Contract\n\
                        import reglang.Tx as Tx\n\n";
        assert_eq!(imports, expected);
    }

    #[test]
    fn contains_import_survives_direct_membership() {
        let (imports, _) =
            translate("rule r when true; prohibit tx.from in knowledgebase(kb).banned; end");
        assert!(imports.contains("import reglang.contains\n"));
    }

    #[test]
    fn rules_transition_wraps_the_serialized_rules() {
        let (_, automaton) = translate("rule r when true; prohibit x == 1; end");
        assert!(automaton.contains("checking -> {\n            output.value = 0;\n"));
        assert!(automaton.contains("? 1001"));
        assert!(automaton.contains("pass = (output.value == 0);"));
        assert!(automaton.contains("sync output;"));
        assert!(automaton.ends_with("}\n"));
    }

    #[test]
    fn translator_is_reusable_across_programs() {
        let mut translator = RuleTranslator::new();
        let tx_program = parse_program("rule r when tx.from == \"a\"; end").unwrap();
        let (_, automaton) = translator.translate(&tx_program).unwrap();
        assert!(automaton.contains("tx_input.reqRead = true"));

        // the usage context was reset, so the next program starts clean
        let plain_program = parse_program("rule r when x == 1; end").unwrap();
        let (_, automaton) = translator.translate(&plain_program).unwrap();
        assert!(!automaton.contains("tx_input.reqRead = true"));
    }
}
