//! Rule compilation for piisieve.
//!
//! A [`RuleTable`](crate::config::RuleTable) holds column-agnostic templates.
//! This module expands those templates against the columns of the input schema
//! and produces a [`RuleSet`]: an immutable, ordered collection of concrete
//! rules that every later stage borrows from. The evaluator reads predicates
//! from it, the router reads rule order from it and the selector reads
//! redactions from it. Nothing downstream copies a rule.

pub mod compiler;

pub use compiler::{compile_rules, quote_ident, CompiledRule, RuleSet};
