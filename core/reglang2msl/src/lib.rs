#![warn(clippy::pedantic)]
//! Orchestration crate for the RegLang→MSL compiler.
//!
//! RegLang programs declare knowledge bases (named collections of constants
//! and arrays) and rules (regulatory predicates over transactions and
//! contracts). This crate wires the pipeline that compiles them into an MSL
//! automaton:
//!
//! ```text
//! RegLang text → parse → RegLang AST
//!                          ├─ knowledge interpreter → const definitions
//!                          ├─ rule transformer      → MSL AST → serializer
//!                          └─ template composer     → final MSL program
//! ```
//!
//! The MSL AST additionally feeds the type-inference pass and the
//! satisfiability checker, which asks an external SMT solver whether each
//! rule can pass without emitting an error code.
//!
//! ## Quick start
//!
//! ```no_run
//! fn compile(source: &str) -> anyhow::Result<String> {
//!     let program = reglang2msl::parse(source)?;
//!     let mut generator = reglang2msl::CodeGenerator::new();
//!     generator.generate(&program)
//! }
//! ```
//!
//! Each phase is also exposed by its own crate (`reglang-ast`,
//! `reglang-knowledge`, `reglang-codegen`, `reglang-type-checker`,
//! `reglang-sat`) for callers that need only part of the pipeline.

use std::rc::Rc;

use reglang_ast::builder;
use reglang_ast::nodes::Program;
use reglang_codegen::template::RuleTranslator;
use reglang_codegen::transformer::RuleTransitionBuilder;
use reglang_knowledge::emitter::emit_constants;
use reglang_knowledge::interpreter::KnowledgeBaseInterpreter;
use reglang_sat::checker::RuleSatChecker;
use reglang_sat::solver::{SatResult, Solver};

/// Parses RegLang source text into an AST.
///
/// The grammar is packaged with the compiler; no external grammar file is
/// consulted at run time.
///
/// # Errors
///
/// Returns an error when the source text is rejected by the grammar. The
/// message carries the rendered parser diagnostic with line and column
/// markers.
pub fn parse(source: &str) -> anyhow::Result<Rc<Program>> {
    Ok(builder::parse_program(source)?)
}

/// Translates parsed RegLang programs into complete MSL modules.
///
/// The generator owns the knowledge interpreter and the rule translator and
/// resets their per-run state between calls, so one instance can compile
/// many programs serially.
#[derive(Default)]
pub struct CodeGenerator {
    kb_interpreter: KnowledgeBaseInterpreter,
    rule_translator: RuleTranslator,
}

impl CodeGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the full MSL source for a pre-parsed program: the import
    /// header, the knowledge constant definitions, and the automaton.
    ///
    /// # Errors
    ///
    /// Returns an error when a knowledge definition cannot be interpreted
    /// or a rule carries more checks than the error-code step permits.
    pub fn generate(&mut self, program: &Program) -> anyhow::Result<String> {
        let knowledge = self.kb_interpreter.interpret(program)?;
        let const_definitions = emit_constants(&knowledge);
        let (imports, automaton) = self.rule_translator.translate(program)?;
        Ok(format!("{imports}{const_definitions}{automaton}"))
    }
}

/// Compiles RegLang source text into MSL source text.
///
/// # Errors
///
/// Returns an error when parsing, knowledge interpretation, or rule
/// transformation fails.
pub fn compile(source: &str) -> anyhow::Result<String> {
    let program = parse(source)?;
    CodeGenerator::new().generate(&program)
}

/// Lowers the program's rules into SMT formulas, asserts them into
/// `solver`, and checks satisfiability: can each rule pass without emitting
/// an error code?
///
/// # Errors
///
/// Returns an error when knowledge interpretation or rule transformation
/// fails.
pub fn check_rules<S: Solver>(program: &Program, solver: S) -> anyhow::Result<SatResult> {
    let knowledge = KnowledgeBaseInterpreter::new().interpret(program)?;
    let body = RuleTransitionBuilder::new().transform(program)?;
    let mut checker = RuleSatChecker::new(solver, knowledge);
    Ok(checker.check(&body))
}
