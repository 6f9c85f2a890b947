use crate::utils::{compile, parse};

#[test]
fn knowledge_base_program_emits_constants_and_a_trivial_automaton() {
    let msl = compile(
        "knowledgebase kb\n\
         knowledge foo = [1, 2, 3];\n\
         foo.add(4);\n\
         foo.del(2);\n\
         end",
    );
    assert!(msl.contains("const [1, 3, 4] as kb_foo;"), "got: {msl}");
    // no rules reference tx or contract, so the automaton goes straight to
    // checking and requests no ports
    assert!(msl.contains("!checking -> checking = true;"), "got: {msl}");
    assert!(!msl.contains("reqRead"));
    assert!(msl.starts_with(
        "import reglang.Contract as Contract\nimport reglang.Tx as Tx\n\n"
    ));
}

#[test]
fn mixed_kind_arrays_are_emitted_as_strings() {
    let msl = compile(
        "knowledgebase kb\n\
         knowledge a = [1];\n\
         a.add(\"2\");\n\
         end",
    );
    assert!(msl.contains("const [\"1\", \"2\"] as kb_a;"), "got: {msl}");
}

#[test]
fn prohibited_sender_rule_gets_code_1001() {
    let msl = compile("rule sender when true; prohibit tx.from == \"0xabc\"; end");
    assert!(
        msl.contains("((tx.from == \"0xabc\") ? 1001 : output.value)"),
        "got: {msl}"
    );
    assert!(msl.contains("output.value = 0;"));
    assert!(msl.contains("pass = (output.value == 0);"));
}

#[test]
fn membership_emits_the_contains_import_only_when_used() {
    let with_membership =
        compile("rule r when true; prohibit tx.from in knowledgebase(kb).banned; end\n\
                 knowledgebase kb knowledge banned = [\"0xbad\"]; end");
    assert!(with_membership.contains("import reglang.contains\n"));

    let without_membership = compile("rule r when true; prohibit tx.from == \"0xbad\"; end");
    assert!(!without_membership.contains("import reglang.contains"));
}

#[test]
fn segments_are_ordered_imports_constants_automaton() {
    let msl = compile(
        "knowledgebase kb knowledge banned = [\"0xbad\"]; end\n\
         rule r when true; prohibit tx.from in knowledgebase(kb).banned; end",
    );
    let imports = msl.find("import reglang.contains").expect("imports come first");
    let constants = msl.find("const [\"0xbad\"] as kb_banned;").expect("constants follow");
    let automaton = msl.find("automaton Rule (").expect("the automaton closes the module");
    assert!(imports < constants && constants < automaton, "got: {msl}");
}

#[test]
fn reading_both_inputs_synchronizes_both_ports() {
    let msl = compile(
        "rule owner when tx.from == contract(tx.to).owner;\n\
         prohibit contract(tx.to).state.frozen == 1;\n\
         end",
    );
    assert!(msl.contains("!checking && !tx_input.reqRead -> tx_input.reqRead = true;"));
    assert!(
        msl.contains("!checking && !contract_input.reqRead -> contract_input.reqRead = true;")
    );
    assert!(msl.contains("sync tx_input, contract_input;"));
    assert!(msl.contains("contract[tx.to].state[\"frozen\"]"));
}

#[test]
fn empty_rules_compile_to_a_skip_statement() {
    let msl = compile("rule empty when tx.from == \"0xabc\"; end");
    assert!(msl.contains("checking -> {\n            output.value = 0;\n            ;\n"));
}

#[test]
fn parsed_programs_serialize_to_json_for_inspection() {
    let program = parse("knowledgebase kb knowledge foo = 1; end");
    let dump = serde_json::to_string_pretty(&*program).expect("AST should serialize");
    assert!(dump.contains("KnowledgeBase"));
    assert!(dump.contains("\"foo\""));
}
