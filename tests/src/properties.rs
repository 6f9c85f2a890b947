use crate::utils::{compile, error_codes};

const MULTI_RULE: &str = "\
knowledgebase kb
knowledge banned = [\"0xbad\", \"0xworse\"];
end
rule transfers when tx.function == \"transfer\";
require tx.args.amount > 0;
prohibit tx.to in knowledgebase(kb).banned;
end
rule ownership when contract(tx.to).owner == tx.from;
prohibit contract(tx.to).state.locked == 1;
end
";

#[test]
fn compilation_is_deterministic() {
    let first = compile(MULTI_RULE);
    for _ in 0..3 {
        assert_eq!(first, compile(MULTI_RULE));
    }
}

#[test]
fn redeclaring_an_existing_element_is_idempotent() {
    let plain = compile("knowledgebase kb knowledge x = [1, 2]; end");
    let readded = compile("knowledgebase kb knowledge x = [1, 2]; x.add([1, 2]); end");
    assert_eq!(plain, readded);
}

#[test]
fn error_codes_are_monotonic_within_rules_and_disjoint_across_rules() {
    let msl = compile(MULTI_RULE);
    let codes = error_codes(&msl);
    assert_eq!(codes, vec![1001, 1002, 2001]);
}

#[test]
fn three_rule_ranges_stay_contiguous() {
    let msl = compile(
        "rule a when true; prohibit x == 1; prohibit x == 2; prohibit x == 3; end\n\
         rule b when true; prohibit y == 1; end\n\
         rule c when true; prohibit z == 1; prohibit z == 2; end",
    );
    let codes = error_codes(&msl);
    assert_eq!(codes, vec![1001, 1002, 1003, 2001, 3001, 3002]);
}

#[test]
fn knowledge_constants_keep_declaration_order() {
    let msl = compile(
        "knowledgebase zeta knowledge last = 1; end\n\
         knowledgebase alpha knowledge first = 2; end",
    );
    let zeta = msl.find("as zeta_last;").expect("zeta is declared first");
    let alpha = msl.find("as alpha_first;").expect("alpha follows");
    assert!(zeta < alpha, "got: {msl}");
}
