//! Rule table management for `piisieve-core`.
//!
//! A rule table is a list of templates, one row per PII family, each row
//! holding a `name`, a `constraint` and an `action`. Every field may contain
//! the [`PLACEHOLDER`] token, which the compiler replaces with a concrete
//! column. This module handles loading tables from YAML (or the embedded
//! default table) and validating them before compilation.
//!
//! License: MIT OR Apache-2.0

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The token substituted with a column identifier.
pub const PLACEHOLDER: &str = "{}";

/// Maximum allowed length for a constraint or action.
pub const MAX_EXPRESSION_LENGTH: usize = 2000;

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RuleTemplate {
    /// Rule name template, e.g. `"{} may contain ssn"`.
    pub name: String,
    /// Predicate template. Records pass when it holds.
    pub constraint: String,
    /// Redaction template applied to quarantined records once the rule has failed.
    pub action: String,
}

impl RuleTemplate {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
            action: action.into(),
        }
    }
}

/// The full rule table, in file order. Order matters: it fixes rule
/// evaluation order, `failed_rules` order and redaction order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleTable {
    pub rules: Vec<RuleTemplate>,
}

impl RuleTable {
    /// Loads a rule table from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading rule table from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule table {}", path.display()))?;
        let table = Self::from_yaml(&text)
            .with_context(|| format!("Failed to load rule table {}", path.display()))?;
        info!("Loaded {} rule templates from {}.", table.rules.len(), path.display());
        Ok(table)
    }

    /// Parses and validates a rule table from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let table: RuleTable = serde_yml::from_str(text).context("Failed to parse rule table YAML")?;
        validate_templates(&table.rules)?;
        Ok(table)
    }

    /// Loads the embedded default table covering credit cards, SSNs, expiry
    /// dates, security codes, email addresses and IPv4 addresses.
    pub fn load_default() -> Result<Self> {
        debug!("Loading default rule table from embedded string...");
        let default_yaml = include_str!("../config/pii_rules.yaml");
        let table = Self::from_yaml(default_yaml).context("Failed to parse default rule table")?;
        debug!("Loaded {} default rule templates.", table.rules.len());
        Ok(table)
    }
}

/// Validates template integrity before compilation.
fn validate_templates(rules: &[RuleTemplate]) -> Result<()> {
    let mut names = HashSet::new();
    let mut errors = Vec::new();

    if rules.is_empty() {
        errors.push("The rule table contains no rules.".to_string());
    }

    for rule in rules {
        if rule.name.trim().is_empty() {
            errors.push("A rule has an empty `name` field.".to_string());
            continue;
        }
        if !names.insert(rule.name.as_str()) {
            errors.push(format!("Duplicate rule name found: '{}'.", rule.name));
        }
        if rule.constraint.trim().is_empty() {
            errors.push(format!("Rule '{}' has an empty `constraint` field.", rule.name));
        }
        if rule.action.trim().is_empty() {
            errors.push(format!("Rule '{}' has an empty `action` field.", rule.name));
        }
        for (field, text) in [("constraint", &rule.constraint), ("action", &rule.action)] {
            if text.len() > MAX_EXPRESSION_LENGTH {
                errors.push(format!(
                    "Rule '{}': {} length ({}) exceeds maximum allowed ({}).",
                    rule.name,
                    field,
                    text.len(),
                    MAX_EXPRESSION_LENGTH
                ));
            }
        }
        // A name without the placeholder collapses to one name for every column.
        if rule.constraint.contains(PLACEHOLDER) && !rule.name.contains(PLACEHOLDER) {
            errors.push(format!(
                "Rule '{}' targets a column but its name has no '{}' placeholder.",
                rule.name, PLACEHOLDER
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Rule table validation failed:\n{}", errors.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_has_six_families() {
        let table = RuleTable::load_default().unwrap();
        assert_eq!(table.rules.len(), 6);
        assert_eq!(table.rules[0].name, "{} may contain creditcard");
        assert!(table.rules.iter().all(|r| r.name.contains(PLACEHOLDER)));
    }

    #[test]
    fn test_validation_rejects_duplicates_and_empty_fields() {
        let yaml = r#"
rules:
  - name: "{} a"
    constraint: "{} NOT REGEXP 'x'"
    action: "'y' AS {}"
  - name: "{} a"
    constraint: ""
    action: "'y' AS {}"
"#;
        let err = RuleTable::from_yaml(yaml).unwrap_err().to_string();
        assert!(err.contains("validation failed"), "{}", err);
    }

    #[test]
    fn test_validation_rejects_name_without_placeholder() {
        let yaml = r#"
rules:
  - name: "contains ssn"
    constraint: "{} NOT REGEXP 'x'"
    action: "'y' AS {}"
"#;
        assert!(RuleTable::from_yaml(yaml).is_err());
    }
}
