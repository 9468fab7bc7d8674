//! compiler.rs - Expands rule templates into one concrete rule per column.
//!
//! For every input column and every template (columns outer, templates inner)
//! the placeholder is substituted textually: the bare column name goes into the
//! rule name, and a backtick-quoted identifier goes into the constraint and the
//! action. The substituted text is then parsed once into typed expression trees.
//!
//! A template that fails to parse does not stop compilation. The parse error is
//! kept on the rule and resurfaces every time the rule is evaluated or applied,
//! so a bad template degrades to "always quarantine" for its columns instead of
//! taking the whole pipeline down. Rule name collisions are the one compile
//! failure that is fatal.
//!
//! License: MIT OR APACHE 2.0

use std::collections::HashMap;

use log::{debug, warn};
use serde_json::Value;

use crate::config::{RuleTable, RuleTemplate, PLACEHOLDER};
use crate::errors::{ExprError, PipelineError};
use crate::expr::{parse_predicate, parse_redaction, Predicate, Redaction};
use crate::record::Record;

/// One template bound to one column.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Unique rule name, e.g. `card may contain creditcard`.
    pub name: String,
    /// The column the template was expanded for.
    pub target_column: String,
    /// Name of the template this rule came from, placeholder intact.
    pub template: String,
    /// Substituted constraint text.
    pub constraint: String,
    /// Substituted action text.
    pub action: String,
    predicate: Result<Predicate, ExprError>,
    redaction: Result<Redaction, ExprError>,
}

impl CompiledRule {
    fn expand(template: &RuleTemplate, column: &str) -> Self {
        let quoted = quote_ident(column);
        let constraint = template.constraint.replace(PLACEHOLDER, &quoted);
        let action = template.action.replace(PLACEHOLDER, &quoted);
        Self {
            name: template.name.replace(PLACEHOLDER, column),
            target_column: column.to_string(),
            template: template.name.clone(),
            predicate: parse_predicate(&constraint),
            redaction: parse_redaction(&action),
            constraint,
            action,
        }
    }

    /// Evaluates the rule's constraint. `Ok(true)` means the record passes.
    pub fn check(&self, record: &Record) -> Result<bool, PipelineError> {
        let predicate = self.predicate.as_ref().map_err(|e| self.evaluation_error(e.clone()))?;
        predicate.holds(record).map_err(|e| self.evaluation_error(e))
    }

    /// Computes the value the rule's action writes, without touching the record.
    /// Returns the target column together with the new value.
    pub fn redact(&self, record: &Record) -> Result<(&str, Value), PipelineError> {
        let redaction = self.redaction.as_ref().map_err(|e| PipelineError::Redaction {
            rule: self.name.clone(),
            source: e.clone(),
        })?;
        let value = redaction.evaluate(record).map_err(|source| PipelineError::Redaction {
            rule: self.name.clone(),
            source,
        })?;
        Ok((redaction.target.as_str(), value))
    }

    pub fn predicate(&self) -> Result<&Predicate, &ExprError> {
        self.predicate.as_ref()
    }

    pub fn redaction(&self) -> Result<&Redaction, &ExprError> {
        self.redaction.as_ref()
    }

    /// True when both the constraint and the action parsed.
    pub fn is_valid(&self) -> bool {
        self.predicate.is_ok() && self.redaction.is_ok()
    }

    /// Parse failures of this rule, as pipeline errors naming the rule.
    pub fn expression_errors(&self) -> Vec<PipelineError> {
        [self.predicate.as_ref().err(), self.redaction.as_ref().err()]
            .into_iter()
            .flatten()
            .map(|e| PipelineError::Expression { rule: self.name.clone(), source: e.clone() })
            .collect()
    }

    fn evaluation_error(&self, source: ExprError) -> PipelineError {
        PipelineError::Evaluation { rule: self.name.clone(), source }
    }
}

/// The compiled, ordered rule set. Immutable once built and shared by
/// reference (usually behind an `Arc`) between all stages and partitions.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    index: HashMap<String, usize>,
    columns: Vec<String>,
}

impl RuleSet {
    /// Rules in compile order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// The schema columns the set was compiled against.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&CompiledRule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    /// Position of a rule in compile order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// The `rule_name -> predicate` view, in compile order.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, Result<&Predicate, &ExprError>)> {
        self.rules.iter().map(|r| (r.name.as_str(), r.predicate()))
    }

    /// The `rule_name -> redaction` view, in compile order.
    pub fn redactions(&self) -> impl Iterator<Item = (&str, Result<&Redaction, &ExprError>)> {
        self.rules.iter().map(|r| (r.name.as_str(), r.redaction()))
    }

    /// Rules whose constraint or action failed to parse.
    pub fn invalid_rules(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(|r| !r.is_valid())
    }
}

/// Quotes a column name for use inside an expression. Embedded backticks are doubled.
pub fn quote_ident(column: &str) -> String {
    format!("`{}`", column.replace('`', "``"))
}

/// Expands every template against every column.
///
/// The output order is columns outer, templates inner, and is identical for
/// identical input. Two expansions producing the same rule name is an error.
pub fn compile_rules(table: &RuleTable, columns: &[String]) -> Result<RuleSet, PipelineError> {
    debug!(
        target: "piisieve_core::compiler",
        "Compiling {} template(s) against {} column(s).",
        table.rules.len(),
        columns.len()
    );

    let mut rules = Vec::with_capacity(table.rules.len() * columns.len());
    let mut index = HashMap::with_capacity(rules.capacity());

    for column in columns {
        for template in &table.rules {
            let rule = CompiledRule::expand(template, column);
            if index.contains_key(&rule.name) {
                return Err(PipelineError::DuplicateRuleName {
                    name: rule.name,
                    template: template.name.clone(),
                    column: column.clone(),
                });
            }
            for err in rule.expression_errors() {
                warn!(target: "piisieve_core::compiler", "{}", err);
            }
            debug!(target: "piisieve_core::compiler", "Compiled rule '{}'.", rule.name);
            index.insert(rule.name.clone(), rules.len());
            rules.push(rule);
        }
    }

    if rules.is_empty() {
        warn!(target: "piisieve_core::compiler", "No rules were compiled; every record will be routed clean.");
    }

    Ok(RuleSet { rules, index, columns: columns.to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn table(rows: &[(&str, &str, &str)]) -> RuleTable {
        RuleTable {
            rules: rows.iter().map(|(n, c, a)| RuleTemplate::new(*n, *c, *a)).collect(),
        }
    }

    #[test]
    fn test_expansion_order_is_columns_then_templates() {
        let t = table(&[
            ("{} may contain a", "{} NOT REGEXP 'a'", "'A' AS {}"),
            ("{} may contain b", "{} NOT REGEXP 'b'", "'B' AS {}"),
        ]);
        let set = compile_rules(&t, &cols(&["x", "y"])).unwrap();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(
            names,
            vec!["x may contain a", "x may contain b", "y may contain a", "y may contain b"]
        );
        assert_eq!(set.position("y may contain a"), Some(2));
        assert_eq!(set.get("x may contain b").unwrap().target_column, "x");
    }

    #[test]
    fn test_placeholder_is_quoted_in_expressions() {
        let t = table(&[("{} r", "{} NOT REGEXP 'a'", "'A' AS {}")]);
        let set = compile_rules(&t, &cols(&["odd`name"])).unwrap();
        let rule = &set.rules()[0];
        assert_eq!(rule.name, "odd`name r");
        assert_eq!(rule.constraint, "`odd``name` NOT REGEXP 'a'");
        assert_eq!(rule.redaction().unwrap().target, "odd`name");
    }

    #[test]
    fn test_duplicate_rule_name_is_fatal() {
        let t = table(&[
            ("{} may contain a", "{} NOT REGEXP 'a'", "'A' AS {}"),
            ("{} may contain a", "{} NOT REGEXP 'b'", "'B' AS {}"),
        ]);
        let err = compile_rules(&t, &cols(&["x"])).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateRuleName { ref name, .. } if name == "x may contain a"));
    }

    #[test]
    fn test_malformed_template_compiles_and_fails_lazily() {
        let t = table(&[("{} broken", "{} NOT REGEXP '('", "'A' AS {}")]);
        let set = compile_rules(&t, &cols(&["x"])).unwrap();
        assert_eq!(set.invalid_rules().count(), 1);
        let record = json!({"x": "hello"}).as_object().cloned().unwrap();
        let err = set.rules()[0].check(&record).unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { .. }));
    }

    #[test]
    fn test_default_table_card_rule() {
        let t = RuleTable::load_default().unwrap();
        let set = compile_rules(&t, &cols(&["card"])).unwrap();
        assert_eq!(set.len(), 6);
        assert_eq!(set.invalid_rules().count(), 0);
        let rule = set.get("card may contain creditcard").unwrap();
        let record = json!({"card": "4111111111111111"}).as_object().cloned().unwrap();
        assert!(!rule.check(&record).unwrap());
        let (target, value) = rule.redact(&record).unwrap();
        assert_eq!(target, "card");
        assert_eq!(value, json!(format!("{}111", "X".repeat(16))));
    }

    #[test]
    fn test_no_columns_yields_empty_set() {
        let t = RuleTable::load_default().unwrap();
        assert!(compile_rules(&t, &[]).unwrap().is_empty());
    }
}
