//! metrics.rs - Turns batch-progress log entries into per-rule evaluation events.
//!
//! Every processed batch leaves one `flow_progress` entry in the event log.
//! Its `details` carry, per rule, how many records of the batch passed and
//! failed:
//!
//! ```json
//! {"flow_progress": {"data_quality": {"expectations": [
//!     {"name": "ssn may contain ssn", "dataset": "clean",
//!      "passed_records": 41, "failed_records": 1}
//! ]}}}
//! ```
//!
//! [`parse_entry`] unpacks one entry into [`EvaluationEvent`]s or reports why
//! it could not. [`aggregate`] runs it over a whole log and drops malformed
//! entries through [`discard_malformed`], so a bad line costs exactly that
//! line. An entry is all or nothing: if any rule inside it is malformed, the
//! entry contributes no events.
//!
//! [`MetricsHistory`] is the in-memory, append-only view of all events seen in
//! a run. Writers append whole batches under a single lock and readers take
//! cloned snapshots, so a reader never sees half a batch.
//!
//! License: MIT OR APACHE 2.0

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::router::RuleTally;
use crate::rules::RuleSet;

/// The only event type the aggregator reads.
pub const FLOW_PROGRESS: &str = "flow_progress";

/// One raw row of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressLogEntry {
    #[serde(default)]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    /// Either a JSON object or a string holding serialized JSON.
    #[serde(default)]
    pub details: Value,
}

impl ProgressLogEntry {
    /// Builds the `flow_progress` entry for one processed batch. `tallies` is
    /// indexed by rule-set position.
    pub fn flow_progress(
        timestamp: DateTime<Utc>,
        dataset: &str,
        rules: &RuleSet,
        tallies: &[RuleTally],
    ) -> Self {
        let expectations: Vec<Value> = rules
            .names()
            .zip(tallies)
            .map(|(name, tally)| {
                json!({
                    "name": name,
                    "dataset": dataset,
                    "passed_records": tally.passed,
                    "failed_records": tally.failed,
                })
            })
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            event_type: FLOW_PROGRESS.to_string(),
            details: json!({
                FLOW_PROGRESS: {
                    "status": "COMPLETED",
                    "data_quality": { "expectations": expectations }
                }
            }),
        }
    }

    pub fn is_flow_progress(&self) -> bool {
        self.event_type == FLOW_PROGRESS
    }
}

/// Pass/fail counts of one rule within one log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationEvent {
    pub timestamp: DateTime<Utc>,
    /// Dataset the rule was evaluated for.
    pub step: String,
    pub rule_name: String,
    pub passed: u64,
    pub failed: u64,
}

/// Unpacks one log entry. Fails if the entry lacks the expected structure.
pub fn parse_entry(entry: &ProgressLogEntry) -> Result<Vec<EvaluationEvent>, PipelineError> {
    let malformed = |what: &str| {
        PipelineError::Aggregation(format!("entry '{}' at {}: {}", entry.id, entry.timestamp, what))
    };

    let parsed;
    let details = match &entry.details {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text)
                .map_err(|e| malformed(&format!("details are not valid JSON ({})", e)))?;
            &parsed
        }
        other => other,
    };

    let expectations = details
        .get(FLOW_PROGRESS)
        .ok_or_else(|| malformed("missing 'flow_progress'"))?
        .get("data_quality")
        .ok_or_else(|| malformed("missing 'data_quality'"))?
        .get("expectations")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing 'expectations' array"))?;

    expectations
        .iter()
        .map(|exp| {
            let text = |key: &str| {
                exp.get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| malformed(&format!("expectation without string '{}'", key)))
            };
            let count = |key: &str| {
                exp.get(key)
                    .and_then(Value::as_u64)
                    .ok_or_else(|| malformed(&format!("expectation without count '{}'", key)))
            };
            Ok(EvaluationEvent {
                timestamp: entry.timestamp,
                step: text("dataset")?,
                rule_name: text("name")?,
                passed: count("passed_records")?,
                failed: count("failed_records")?,
            })
        })
        .collect()
}

/// Drops a failed parse, logging it. This is the single place where
/// aggregation errors are suppressed.
pub fn discard_malformed<T>(result: Result<T, PipelineError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(target: "piisieve_core::metrics", "Skipping log entry: {}", e);
            None
        }
    }
}

/// Unpacks every `flow_progress` entry of a log, skipping malformed ones.
pub fn aggregate<'a, I>(entries: I) -> Vec<EvaluationEvent>
where
    I: IntoIterator<Item = &'a ProgressLogEntry>,
{
    let events: Vec<EvaluationEvent> = entries
        .into_iter()
        .filter(|e| e.is_flow_progress())
        .map(parse_entry)
        .filter_map(discard_malformed)
        .flatten()
        .collect();
    debug!(target: "piisieve_core::metrics", "Aggregated {} evaluation event(s).", events.len());
    events
}

/// Summed counts for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTotals {
    pub rule_name: String,
    pub passed: u64,
    pub failed: u64,
}

/// Summed counts for one rule within one time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTotals {
    pub window_start: DateTime<Utc>,
    pub rule_name: String,
    pub passed: u64,
    pub failed: u64,
}

/// Sums events per rule, in first-seen rule order.
pub fn totals(events: &[EvaluationEvent]) -> Vec<RuleTotals> {
    let mut out: Vec<RuleTotals> = Vec::new();
    for event in events {
        match out.iter_mut().find(|t| t.rule_name == event.rule_name) {
            Some(t) => {
                t.passed += event.passed;
                t.failed += event.failed;
            }
            None => out.push(RuleTotals {
                rule_name: event.rule_name.clone(),
                passed: event.passed,
                failed: event.failed,
            }),
        }
    }
    out
}

/// Groups events into fixed windows of length `window` aligned to the Unix
/// epoch, summing per rule. Windows come out in time order; rules within a
/// window in first-seen order. A non-positive window groups by exact timestamp.
pub fn window_totals(events: &[EvaluationEvent], window: Duration) -> Vec<WindowTotals> {
    let secs = window.num_seconds();
    let mut windows: BTreeMap<DateTime<Utc>, Vec<RuleTotals>> = BTreeMap::new();
    for event in events {
        let start = if secs > 0 {
            let ts = event.timestamp.timestamp();
            DateTime::<Utc>::from_timestamp(ts - ts.rem_euclid(secs), 0).unwrap_or(event.timestamp)
        } else {
            event.timestamp
        };
        let bucket = windows.entry(start).or_default();
        match bucket.iter_mut().find(|t| t.rule_name == event.rule_name) {
            Some(t) => {
                t.passed += event.passed;
                t.failed += event.failed;
            }
            None => bucket.push(RuleTotals {
                rule_name: event.rule_name.clone(),
                passed: event.passed,
                failed: event.failed,
            }),
        }
    }
    windows
        .into_iter()
        .flat_map(|(window_start, rules)| {
            rules.into_iter().map(move |t| WindowTotals {
                window_start,
                rule_name: t.rule_name,
                passed: t.passed,
                failed: t.failed,
            })
        })
        .collect()
}

/// Append-only store of evaluation events shared across concurrent batches.
#[derive(Debug, Default)]
pub struct MetricsHistory {
    events: RwLock<Vec<EvaluationEvent>>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<EvaluationEvent>) -> Self {
        Self { events: RwLock::new(events) }
    }

    /// Appends all events of one batch atomically with respect to readers.
    pub fn append_batch(&self, batch: Vec<EvaluationEvent>) {
        if batch.is_empty() {
            return;
        }
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.extend(batch);
    }

    /// A consistent copy of the history as of the last completed append.
    pub fn snapshot(&self) -> Vec<EvaluationEvent> {
        self.events.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
