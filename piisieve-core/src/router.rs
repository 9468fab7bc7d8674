//! Stream routing.
//!
//! A record whose evaluation vector is all passes goes to the clean stream
//! untouched. Anything else becomes a [`QuarantinedRecord`] tagged with the
//! names of the rules it did not pass, in rule-set order. Routing is terminal:
//! there is no retry from here.

use serde::{Deserialize, Serialize};

use crate::evaluator::{evaluate, EvaluationVector};
use crate::record::Record;
use crate::rules::RuleSet;

/// A record held back for potentially containing PII.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedRecord {
    pub record: Record,
    pub failed_rules: Vec<String>,
}

/// Where a record ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Clean(Record),
    Quarantined(QuarantinedRecord),
}

/// Routes a record according to its evaluation vector.
pub fn route(record: Record, vector: &EvaluationVector<'_>) -> Routed {
    if vector.all_passed() {
        return Routed::Clean(record);
    }
    Routed::Quarantined(QuarantinedRecord {
        record,
        failed_rules: vector.failed().map(str::to_string).collect(),
    })
}

/// Passed/failed record counts for one rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTally {
    pub passed: u64,
    pub failed: u64,
}

/// Result of routing a group of records: both streams plus per-rule tallies
/// indexed by rule-set position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutedBatch {
    pub clean: Vec<Record>,
    pub quarantined: Vec<QuarantinedRecord>,
    pub tallies: Vec<RuleTally>,
}

impl RoutedBatch {
    pub fn new(rule_count: usize) -> Self {
        Self {
            clean: Vec::new(),
            quarantined: Vec::new(),
            tallies: vec![RuleTally::default(); rule_count],
        }
    }

    /// Folds another partition's output into this one.
    pub fn merge(&mut self, other: RoutedBatch) {
        self.clean.extend(other.clean);
        self.quarantined.extend(other.quarantined);
        if self.tallies.len() < other.tallies.len() {
            self.tallies.resize(other.tallies.len(), RuleTally::default());
        }
        for (mine, theirs) in self.tallies.iter_mut().zip(other.tallies) {
            mine.passed += theirs.passed;
            mine.failed += theirs.failed;
        }
    }

    pub fn record_count(&self) -> usize {
        self.clean.len() + self.quarantined.len()
    }
}

/// Evaluates and routes every record. Records are independent, so callers
/// may split a batch arbitrarily and [`merge`](RoutedBatch::merge) the parts.
pub fn route_all(records: Vec<Record>, rules: &RuleSet) -> RoutedBatch {
    let mut out = RoutedBatch::new(rules.len());
    for record in records {
        let vector = evaluate(&record, rules);
        for (tally, (_, verdict)) in out.tallies.iter_mut().zip(vector.iter()) {
            if verdict.passed() {
                tally.passed += 1;
            } else {
                tally.failed += 1;
            }
        }
        match route(record, &vector) {
            Routed::Clean(r) => out.clean.push(r),
            Routed::Quarantined(q) => out.quarantined.push(q),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleTable;
    use crate::rules::compile_rules;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn default_set(columns: &[&str]) -> RuleSet {
        let cols: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        compile_rules(&RuleTable::load_default().unwrap(), &cols).unwrap()
    }

    #[test]
    fn test_clean_record_is_unchanged() {
        let set = default_set(&["name", "city"]);
        let r = rec(json!({"name": "Grace", "city": "Arlington"}));
        let v = evaluate(&r, &set);
        assert_eq!(route(r.clone(), &v), Routed::Clean(r));
    }

    #[test]
    fn test_failed_rules_follow_rule_order() {
        let set = default_set(&["card", "ip"]);
        let r = rec(json!({"card": "4111111111111111", "ip": "192.168.0.1"}));
        let v = evaluate(&r, &set);
        match route(r, &v) {
            Routed::Quarantined(q) => assert_eq!(
                q.failed_rules,
                vec!["card may contain creditcard", "ip may contain ipv4"]
            ),
            other => panic!("expected quarantine, got {:?}", other),
        }
    }

    #[test]
    fn test_route_all_tallies_and_merge() {
        let set = default_set(&["ssn"]);
        let first = route_all(vec![rec(json!({"ssn": "123-45-6789"}))], &set);
        let second = route_all(vec![rec(json!({"ssn": "n/a"})), rec(json!({"ssn": "000-00-0000"}))], &set);
        let mut merged = first;
        merged.merge(second);
        assert_eq!(merged.clean.len(), 1);
        assert_eq!(merged.quarantined.len(), 2);
        let ssn = set.position("ssn may contain ssn").unwrap();
        assert_eq!(merged.tallies[ssn], RuleTally { passed: 1, failed: 2 });
        assert_eq!(merged.record_count(), 3);
    }
}
