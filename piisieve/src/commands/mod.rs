//! Implementations of the piisieve subcommands.

use anyhow::{Context, Result};
use log::info;

use piisieve_core::{compile_rules, RuleSet, RuleTable};

use crate::cli::RuleArgs;

pub mod metrics;
pub mod reprocess;
pub mod rules;
pub mod run;

/// Loads the rule table named by `--rules`, or the built-in one.
pub fn load_rule_table(args: &RuleArgs) -> Result<RuleTable> {
    match &args.rules {
        Some(path) => RuleTable::load_from_file(path),
        None => RuleTable::load_default(),
    }
}

/// Picks explicit columns over inferred ones.
pub fn resolve_columns(args: &RuleArgs, inferred: Option<Vec<String>>) -> Vec<String> {
    if !args.columns.is_empty() {
        return args.columns.clone();
    }
    let columns = inferred.unwrap_or_default();
    info!("Using inferred columns: {}", columns.join(", "));
    columns
}

/// Compiles the selected rule table against `columns`.
pub fn build_rule_set(args: &RuleArgs, columns: &[String]) -> Result<RuleSet> {
    let table = load_rule_table(args)?;
    compile_rules(&table, columns).context("Failed to compile rule table")
}
