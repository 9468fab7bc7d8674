//! Redaction application.
//!
//! Applies a [`RedactionPlan`] to a quarantined record, producing the
//! clean-processed form. Each selected redaction rewrites its target column on
//! a copy of the record, in plan order; later redactions see the output of
//! earlier ones. If any redaction fails, the whole record is emitted
//! un-redacted with [`RedactionStatus::Failed`] so the failure is visible
//! downstream instead of the record silently disappearing.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::router::QuarantinedRecord;
use crate::selector::RedactionPlan;

/// Outcome marker carried by every clean-processed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedactionStatus {
    Applied { rules: Vec<String> },
    Failed { rule: String, reason: String },
}

/// A quarantined record after redaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub record: Record,
    pub failed_rules: Vec<String>,
    pub redaction: RedactionStatus,
}

impl ProcessedRecord {
    pub fn is_redacted(&self) -> bool {
        matches!(self.redaction, RedactionStatus::Applied { .. })
    }
}

/// Rewrites `record` with every redaction of `plan`.
pub fn redact_record(record: &Record, plan: &RedactionPlan<'_>) -> Result<Record, (String, String)> {
    let mut out = record.clone();
    for rule in plan.rules() {
        let (target, value) = rule
            .redact(&out)
            .map_err(|e| (rule.name.clone(), e.to_string()))?;
        out.insert(target.to_string(), value);
    }
    Ok(out)
}

/// Produces the clean-processed form of a quarantined record.
pub fn apply(quarantined: &QuarantinedRecord, plan: &RedactionPlan<'_>) -> ProcessedRecord {
    match redact_record(&quarantined.record, plan) {
        Ok(record) => ProcessedRecord {
            record,
            failed_rules: quarantined.failed_rules.clone(),
            redaction: RedactionStatus::Applied { rules: plan.names().map(str::to_string).collect() },
        },
        Err((rule, reason)) => {
            warn!(target: "piisieve_core::applier", "Passing record through un-redacted: {}", reason);
            ProcessedRecord {
                record: quarantined.record.clone(),
                failed_rules: quarantined.failed_rules.clone(),
                redaction: RedactionStatus::Failed { rule, reason },
            }
        }
    }
}
