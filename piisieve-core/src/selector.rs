//! Redaction selection.
//!
//! Redactions are chosen from history, not from the record at hand: a rule's
//! action is selected once that rule has failed at least once in any recorded
//! window. The failed set only grows during a run. A record can therefore be
//! redacted for a rule it did not fail itself, and a record that failed a rule
//! whose failure has not been aggregated yet is emitted without that
//! redaction. Callers control how wide that window is by choosing when to
//! recompute the selection.

use std::collections::HashSet;

use log::debug;

use crate::metrics::EvaluationEvent;
use crate::rules::{CompiledRule, RuleSet};

/// Names of rules whose summed failure count is at least one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedRuleSet {
    names: HashSet<String>,
}

impl FailedRuleSet {
    pub fn contains(&self, rule: &str) -> bool {
        self.names.contains(rule)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_superset(&self, other: &FailedRuleSet) -> bool {
        self.names.is_superset(&other.names)
    }

    /// Names in sorted order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Computes the failed set from a history snapshot.
pub fn failed_rule_set(history: &[EvaluationEvent]) -> FailedRuleSet {
    let names = history
        .iter()
        .filter(|e| e.failed >= 1)
        .map(|e| e.rule_name.clone())
        .collect();
    FailedRuleSet { names }
}

/// Ordered redactions to apply to quarantined records.
#[derive(Debug, Clone, Default)]
pub struct RedactionPlan<'r> {
    rules: Vec<&'r CompiledRule>,
}

impl<'r> RedactionPlan<'r> {
    pub fn rules(&self) -> &[&'r CompiledRule] {
        &self.rules
    }

    pub fn names(&self) -> impl Iterator<Item = &'r str> + '_ {
        self.rules.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// An empty plan leaves quarantined records untouched.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Names in the failed set that `rules` does not know, sorted.
pub fn unknown_rules<'f>(failed: &'f FailedRuleSet, rules: &RuleSet) -> Vec<&'f str> {
    failed.sorted().into_iter().filter(|n| rules.get(n).is_none()).collect()
}

/// Picks the redaction of every failed rule, in rule-set order. Names in the
/// failed set that the rule set does not know are ignored.
pub fn plan_for<'r>(failed: &FailedRuleSet, rules: &'r RuleSet) -> RedactionPlan<'r> {
    for unknown in unknown_rules(failed, rules) {
        debug!(target: "piisieve_core::selector", "Ignoring failures of unknown rule '{}'.", unknown);
    }
    let plan = RedactionPlan {
        rules: rules.rules().iter().filter(|r| failed.contains(&r.name)).collect(),
    };
    debug!(target: "piisieve_core::selector", "Selected {} redaction(s).", plan.len());
    plan
}

/// Failed set plus plan in one step.
pub fn select_redactions<'r>(history: &[EvaluationEvent], rules: &'r RuleSet) -> RedactionPlan<'r> {
    plan_for(&failed_rule_set(history), rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleTable;
    use crate::rules::compile_rules;
    use chrono::{TimeZone, Utc};

    fn event(secs: i64, rule: &str, failed: u64) -> EvaluationEvent {
        EvaluationEvent {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            step: "clean".into(),
            rule_name: rule.into(),
            passed: 1,
            failed,
        }
    }

    #[test]
    fn test_no_failures_means_empty_plan() {
        let set = compile_rules(&RuleTable::load_default().unwrap(), &["a".into()]).unwrap();
        let plan = select_redactions(&[event(1, "a may contain ssn", 0)], &set);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_uses_rule_order_and_deduplicates() {
        let set = compile_rules(&RuleTable::load_default().unwrap(), &["a".into()]).unwrap();
        let history = vec![
            event(1, "a may contain ipv4", 1),
            event(2, "a may contain creditcard", 2),
            event(3, "a may contain ipv4", 4),
            event(4, "gone may contain ssn", 1),
        ];
        let plan = select_redactions(&history, &set);
        assert_eq!(
            plan.names().collect::<Vec<_>>(),
            vec!["a may contain creditcard", "a may contain ipv4"]
        );
    }

    #[test]
    fn test_unknown_rules_are_listed_sorted() {
        let set = compile_rules(&RuleTable::load_default().unwrap(), &["a".into()]).unwrap();
        let history = vec![
            event(1, "old may contain ssn", 1),
            event(2, "a may contain ssn", 1),
            event(3, "gone may contain ipv4", 2),
        ];
        let failed = failed_rule_set(&history);
        assert_eq!(
            unknown_rules(&failed, &set),
            vec!["gone may contain ipv4", "old may contain ssn"]
        );
    }

    #[test]
    fn test_failed_set_only_grows() {
        let mut history = vec![event(1, "r1", 1), event(1, "r2", 0)];
        let before = failed_rule_set(&history);
        history.push(event(2, "r1", 0));
        history.push(event(2, "r2", 3));
        let after = failed_rule_set(&history);
        assert!(after.is_superset(&before));
        assert_eq!(after.sorted(), vec!["r1", "r2"]);
    }
}
