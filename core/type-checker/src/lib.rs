#![warn(clippy::pedantic)]
//! Type inference for MSL rule transition bodies.
//!
//! The pass assigns a [`TypeLabel`](type_info::TypeLabel) to the MSL nodes
//! that matter for satisfiability checking. It is a mixed bottom-up /
//! top-down propagation: types forced by context are recorded first (the
//! output value is an integer, conditional guards are booleans), then
//! children are visited with those expectations.
//!
//! Use [`MslTypeInference`](inference::MslTypeInference) on a transition
//! body produced by the rule transformer.

pub mod inference;
pub mod type_info;
