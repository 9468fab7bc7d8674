//! Predicate evaluation.
//!
//! Evaluates every compiled predicate against one record and produces an
//! [`EvaluationVector`]. Evaluation is pure: the record is only read, nothing
//! is logged above `debug`, and the same record and rule set always produce
//! the same vector. A rule that cannot be evaluated (malformed expression,
//! absent column) yields [`Verdict::Error`], which routing treats as a failure.

use log::debug;

use crate::record::Record;
use crate::rules::RuleSet;
use crate::sensitive::loggable;

/// Outcome of one rule against one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// The rule could not be evaluated. Carries the rendered error.
    Error(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Per-record verdicts, in rule-set order. Rule names are borrowed from the
/// rule set, so a vector never outlives the rules it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationVector<'r> {
    entries: Vec<(&'r str, Verdict)>,
}

impl<'r> EvaluationVector<'r> {
    pub fn iter(&self) -> impl Iterator<Item = (&'r str, &Verdict)> + '_ {
        self.entries.iter().map(|(name, v)| (*name, v))
    }

    pub fn get(&self, rule: &str) -> Option<&Verdict> {
        self.entries.iter().find(|(name, _)| *name == rule).map(|(_, v)| v)
    }

    /// Verdict of the rule at position `idx` in the rule set.
    pub fn at(&self, idx: usize) -> Option<&Verdict> {
        self.entries.get(idx).map(|(_, v)| v)
    }

    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.passed())
    }

    /// Names of rules that did not pass, in rule-set order.
    pub fn failed(&self) -> impl Iterator<Item = &'r str> + '_ {
        self.entries.iter().filter(|(_, v)| !v.passed()).map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluates all rules of `rules` against `record`.
pub fn evaluate<'r>(record: &Record, rules: &'r RuleSet) -> EvaluationVector<'r> {
    let entries = rules
        .rules()
        .iter()
        .map(|rule| {
            let verdict = match rule.check(record) {
                Ok(true) => Verdict::Pass,
                Ok(false) => {
                    if let Some(value) = record.get(&rule.target_column) {
                        debug!(
                            target: "piisieve_core::evaluator",
                            "Rule '{}' failed on value {}",
                            rule.name,
                            loggable(&value.to_string())
                        );
                    }
                    Verdict::Fail
                }
                Err(e) => {
                    debug!(target: "piisieve_core::evaluator", "{}", e);
                    Verdict::Error(e.to_string())
                }
            };
            (rule.name.as_str(), verdict)
        })
        .collect();
    EvaluationVector { entries }
}
