// piisieve-core/src/lib.rs
//! # piisieve Core Library
//!
//! `piisieve-core` detects, quarantines and redacts personally identifiable
//! information in a stream of records. One table of rule templates, keyed by
//! column, drives a fixed four-stage flow: stage, validate, quarantine and
//! re-process.
//!
//! ## Modules
//!
//! * `config`: Rule templates and the embedded default rule table.
//! * `expr`: The expression language used by constraints and actions.
//! * `rules`: Expands templates into one concrete rule per column.
//! * `evaluator`: Evaluates every rule against a record.
//! * `router`: Splits records into clean and quarantined streams.
//! * `metrics`: Unpacks batch-progress log entries into per-rule events.
//! * `selector`: Chooses redactions from the failure history.
//! * `applier`: Applies the chosen redactions to quarantined records.
//! * `storage`: NDJSON tables, checkpoint and record sources.
//! * `pipeline`: The batch runner tying the stages together.
//! * `headless`: A one-shot, in-memory run of all stages.
//!
//! ## Usage Example
//!
//! ```rust
//! use piisieve_core::{process_records, RuleTable};
//! use serde_json::json;
//!
//! fn main() -> anyhow::Result<()> {
//!     let table = RuleTable::load_default()?;
//!     let record = json!({"card": "4111111111111111"}).as_object().cloned().unwrap();
//!
//!     let out = process_records(&table, None, vec![record])?;
//!
//!     assert_eq!(out.quarantined[0].failed_rules, vec!["card may contain creditcard"]);
//!     assert_eq!(out.processed[0].record["card"], "XXXXXXXXXXXXXXXX111");
//!     Ok(())
//! }
//! ```
//!
//! License: MIT OR APACHE 2.0

pub mod applier;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod expr;
pub mod headless;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod router;
pub mod rules;
pub mod selector;
pub mod sensitive;
pub mod storage;

pub use applier::{apply, ProcessedRecord, RedactionStatus};
pub use config::{RuleTable, RuleTemplate, PLACEHOLDER};
pub use errors::{ExprError, PipelineError};
pub use evaluator::{evaluate, EvaluationVector, Verdict};
pub use headless::{process_records, HeadlessOutput};
pub use metrics::{aggregate, parse_entry, EvaluationEvent, MetricsHistory, ProgressLogEntry};
pub use pipeline::{BatchReport, PipelineOptions, PipelineRunner, RedactionRefresh, RunSummary};
pub use record::Record;
pub use router::{route, QuarantinedRecord, Routed, RoutedBatch};
pub use rules::{compile_rules, CompiledRule, RuleSet};
pub use selector::{failed_rule_set, select_redactions, unknown_rules, FailedRuleSet, RedactionPlan};
pub use storage::{Checkpoint, DirectorySource, RecordSource, TableLayout, VecSource};
