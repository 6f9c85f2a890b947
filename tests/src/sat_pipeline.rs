use reglang_sat::solver::{RecordingSolver, SatResult};
use reglang_sat::term::Sort;

use crate::utils::parse;

#[test]
fn check_rules_asserts_one_formula_per_non_empty_rule() {
    let program = parse(
        "knowledgebase kb knowledge banned = [\"0xbad\"]; end\n\
         rule a when true; prohibit tx.from in knowledgebase(kb).banned; end\n\
         rule empty when true; end\n\
         rule b when tx.function == \"mint\"; require tx.args.amount > 0; end",
    );
    let mut solver = RecordingSolver::new();
    // the recording solver stands in for the external SMT solver
    let result = check_with(&program, &mut solver);
    assert_eq!(result, SatResult::Unknown);
    assert_eq!(solver.assertions.len(), 2);
}

#[test]
fn declared_sorts_match_inferred_types() {
    let program = parse(
        "rule b when tx.function == \"mint\"; require tx.args.amount > 0; end",
    );
    let mut solver = RecordingSolver::new();
    check_with(&program, &mut solver);

    let sorts: Vec<(&str, &Sort)> = solver
        .declarations
        .iter()
        .map(|(name, sort)| (name.as_str(), sort))
        .collect();
    assert!(sorts.contains(&("tx.function", &Sort::Str)));
    assert!(sorts.contains(&("tx.args[\"amount\"]", &Sort::Int)));
}

#[test]
fn knowledge_literals_never_become_symbols() {
    let program = parse(
        "knowledgebase kb knowledge limit = 100; end\n\
         rule a when true; prohibit tx.args.amount > knowledgebase(kb).limit; end",
    );
    let mut solver = RecordingSolver::new();
    check_with(&program, &mut solver);

    assert!(
        solver
            .declarations
            .iter()
            .all(|(name, _)| name != "kb_limit"),
        "knowledge references are replaced by literal terms"
    );
    let rendered = format!("{:?}", solver.assertions[0]);
    assert!(rendered.contains("Int(100)"), "got: {rendered}");
}

/// Runs the sat pipeline against a borrowed solver so assertions can be
/// inspected afterwards.
fn check_with(program: &reglang_ast::nodes::Program, solver: &mut RecordingSolver) -> SatResult {
    reglang2msl::check_rules(program, solver).expect("checking should succeed")
}
