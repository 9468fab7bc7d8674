// piisieve-core/src/headless.rs

//! `headless.rs`
//! One-shot, in-memory run of every stage over a list of records, with no
//! table root, checkpoint or async runtime involved. Useful for embedding and
//! for checking a rule table against sample data.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::applier::{apply, ProcessedRecord};
use crate::config::RuleTable;
use crate::metrics::{aggregate, EvaluationEvent, ProgressLogEntry};
use crate::pipeline::CLEAN_DATASET;
use crate::record::{columns_of, Record};
use crate::router::{route_all, QuarantinedRecord};
use crate::rules::compile_rules;
use crate::selector::select_redactions;

/// Everything a headless run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessOutput {
    pub clean: Vec<Record>,
    pub quarantined: Vec<QuarantinedRecord>,
    pub processed: Vec<ProcessedRecord>,
    pub events: Vec<EvaluationEvent>,
}

/// Compiles `table`, routes `records` as a single batch, aggregates that
/// batch's metrics and applies the resulting redactions to the quarantine.
///
/// # Arguments
///
/// * `table` - The rule table to compile.
/// * `columns` - Schema columns. When `None`, the columns of the first record are used.
/// * `records` - The batch to process.
pub fn process_records(
    table: &RuleTable,
    columns: Option<&[String]>,
    records: Vec<Record>,
) -> Result<HeadlessOutput> {
    let columns = match columns {
        Some(c) => c.to_vec(),
        None => records.first().map(columns_of).unwrap_or_default(),
    };
    let rules = compile_rules(table, &columns).context("Failed to compile rule table")?;

    let routed = route_all(records, &rules);
    let entry = ProgressLogEntry::flow_progress(Utc::now(), CLEAN_DATASET, &rules, &routed.tallies);
    let events = aggregate(std::slice::from_ref(&entry));
    let plan = select_redactions(&events, &rules);
    let processed = routed.quarantined.iter().map(|q| apply(q, &plan)).collect();

    Ok(HeadlessOutput {
        clean: routed.clean,
        quarantined: routed.quarantined,
        processed,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headless_ssn_scenario() {
        let table = RuleTable::load_default().unwrap();
        let records = vec![
            json!({"name": "Ada", "ssn": "123-45-6789"}).as_object().cloned().unwrap(),
            json!({"name": "Grace", "ssn": "unknown"}).as_object().cloned().unwrap(),
        ];
        let out = process_records(&table, None, records).unwrap();
        assert_eq!(out.clean.len(), 1);
        assert_eq!(out.quarantined[0].failed_rules, vec!["ssn may contain ssn"]);
        assert_eq!(out.processed[0].record["ssn"], json!("[REDACTED]"));
        assert_eq!(out.processed[0].record["name"], json!("Ada"));
        assert_eq!(out.events.len(), 12);
    }

    #[test]
    fn test_headless_empty_input() {
        let out = process_records(&RuleTable::load_default().unwrap(), None, Vec::new()).unwrap();
        assert_eq!(out, HeadlessOutput::default());
    }
}
