//! Integration tests for the RegLang compiler CLI.
//!
//! These tests spawn the compiled `reglang2msl` binary and validate its
//! behavior through the produced output file, stderr, and exit codes. Each
//! test writes its input into a temporary directory, so tests run in
//! parallel without interfering.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const EXAMPLE: &str = "\
knowledgebase kb
knowledge foo = [1, 2, 3];
foo.add(4);
foo.del(2);
end
rule sender_check when tx.from == \"0xABC\";
prohibit tx.to in knowledgebase(kb).foo;
end
";

fn compiler() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("reglang2msl"))
}

#[test]
fn compiles_a_program_to_msl() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("rules.rl");
    input.write_str(EXAMPLE).unwrap();
    let output = temp.child("rules.msl");

    compiler()
        .arg(input.path())
        .arg(output.path())
        .assert()
        .success();

    output.assert(predicate::str::contains("const [1, 3, 4] as kb_foo;"));
    output.assert(predicate::str::contains("import reglang.contains"));
    output.assert(predicate::str::contains("automaton Rule ("));
    output.assert(predicate::str::contains("1001"));
}

#[test]
fn fails_when_file_missing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = temp.child("rules.msl");

    compiler()
        .arg("this-file-does-not-exist.rl")
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("input path not found"));
}

#[test]
fn fails_on_syntax_errors() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("broken.rl");
    input.write_str("knowledgebase\nend\n").unwrap();
    let output = temp.child("broken.msl");

    compiler()
        .arg(input.path())
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));
}

#[test]
fn fails_on_interpretation_errors() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("bad_arith.rl");
    input
        .write_str("knowledgebase k knowledge foo = \"bar\" + 1; end\n")
        .unwrap();
    let output = temp.child("bad_arith.msl");

    compiler()
        .arg(input.path())
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be converted to a number"));
}

#[test]
fn prints_usage_without_arguments() {
    compiler()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
