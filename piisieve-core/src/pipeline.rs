//! pipeline.rs - Drives batches through stage, validate, quarantine and re-process.
//!
//! [`PipelineRunner`] owns the compiled rules, a [`RecordSource`], the table
//! layout and the metrics history. Each batch runs in two phases:
//!
//! 1. Routing: records are evaluated and split into clean and quarantine, in
//!    parallel partitions. The per-rule tallies become a `flow_progress` log
//!    entry, which is aggregated into the metrics history.
//! 2. Re-processing: the redaction plan is derived from the history and
//!    applied to the batch's quarantined records.
//!
//! All output parts of a batch are written before its id is committed to the
//! checkpoint, so a stopped run is consistent as of its last committed batch.
//!
//! License: MIT OR APACHE 2.0

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::task::JoinSet;

use crate::applier::{apply, ProcessedRecord};
use crate::errors::{PipelineError, Result};
use crate::metrics::{aggregate, EvaluationEvent, MetricsHistory, ProgressLogEntry};
use crate::record::Record;
use crate::router::{route_all, RoutedBatch};
use crate::rules::RuleSet;
use crate::selector::{failed_rule_set, plan_for, unknown_rules, FailedRuleSet};
use crate::storage::{Checkpoint, InputBatch, RecordSource, TableLayout};

/// Dataset name reported in progress entries for the routing stage.
pub const CLEAN_DATASET: &str = "clean";

/// When the redaction plan is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactionRefresh {
    /// After every batch's metrics are aggregated. A batch's own failures are
    /// already visible to its redaction.
    #[default]
    PerBatch,
    /// Once, from the history present when the runner opens.
    Frozen,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of partitions a batch is split into for routing.
    pub partitions: usize,
    pub refresh: RedactionRefresh,
    /// Timestamp stamped on every progress entry instead of the wall clock.
    pub fixed_timestamp: Option<DateTime<Utc>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            partitions: std::thread::available_parallelism().map_or(4, |n| n.get()),
            refresh: RedactionRefresh::default(),
            fixed_timestamp: None,
        }
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: u64,
    pub source_id: String,
    pub records: usize,
    pub clean: usize,
    pub quarantined: usize,
    /// Quarantined records whose redaction succeeded.
    pub redacted: usize,
    /// Quarantined records passed through un-redacted because a redaction failed.
    pub redaction_failures: usize,
    /// Rules whose redaction was applied, in rule order.
    pub selected_redactions: Vec<String>,
}

/// Totals of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: Vec<BatchReport>,
    /// Failed rules as of the end of the run, sorted.
    pub failed_rules: Vec<String>,
}

impl RunSummary {
    pub fn records(&self) -> usize {
        self.batches.iter().map(|b| b.records).sum()
    }

    pub fn clean(&self) -> usize {
        self.batches.iter().map(|b| b.clean).sum()
    }

    pub fn quarantined(&self) -> usize {
        self.batches.iter().map(|b| b.quarantined).sum()
    }

    pub fn redacted(&self) -> usize {
        self.batches.iter().map(|b| b.redacted).sum()
    }

    pub fn redaction_failures(&self) -> usize {
        self.batches.iter().map(|b| b.redaction_failures).sum()
    }
}

/// Evaluates and routes `records` across up to `partitions` blocking tasks.
/// Partition outputs are merged in partition order.
pub async fn route_parallel(
    records: Vec<Record>,
    rules: Arc<RuleSet>,
    partitions: usize,
) -> Result<RoutedBatch> {
    let partitions = partitions.max(1);
    if records.is_empty() {
        return Ok(RoutedBatch::new(rules.len()));
    }
    let chunk_size = records.len().div_ceil(partitions);

    let mut tasks = JoinSet::new();
    let mut records = records.into_iter();
    let mut idx = 0usize;
    loop {
        let chunk: Vec<Record> = records.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        let rules = Arc::clone(&rules);
        tasks.spawn_blocking(move || (idx, route_all(chunk, &rules)));
        idx += 1;
    }
    debug!(target: "piisieve_core::pipeline", "Routing batch in {} partition(s).", idx);

    let mut parts = Vec::with_capacity(idx);
    while let Some(joined) = tasks.join_next().await {
        let part = joined.map_err(|e| PipelineError::Fatal(format!("routing task failed: {}", e)))?;
        parts.push(part);
    }
    parts.sort_by_key(|(i, _)| *i);

    let mut out = RoutedBatch::new(rules.len());
    for (_, part) in parts {
        out.merge(part);
    }
    Ok(out)
}

/// Streams batches from a source through every stage into the table layout.
pub struct PipelineRunner<S: RecordSource> {
    rules: Arc<RuleSet>,
    source: S,
    layout: TableLayout,
    history: Arc<MetricsHistory>,
    checkpoint: Checkpoint,
    options: PipelineOptions,
    frozen: Option<FailedRuleSet>,
}

impl<S: RecordSource> PipelineRunner<S> {
    /// Prepares the table root, drops parts of uncommitted batches and reloads
    /// the committed metrics history.
    pub fn open(rules: Arc<RuleSet>, source: S, layout: TableLayout, options: PipelineOptions) -> Result<Self> {
        layout.ensure()?;
        let checkpoint = Checkpoint::load(&layout.checkpoint_path())?;
        for table in layout.tables() {
            table.discard_uncommitted(&checkpoint.committed_batches)?;
        }
        let events: Vec<EvaluationEvent> = layout.metrics().read_committed(&checkpoint.committed_batches)?;
        info!(
            "Opened table root {} with {} committed batch(es) and {} metric event(s).",
            layout.root().display(),
            checkpoint.committed_batches.len(),
            events.len()
        );
        let failed = failed_rule_set(&events);
        for unknown in unknown_rules(&failed, &rules) {
            warn!("Rule '{}' has recorded failures but is not in the current rule set; ignoring.", unknown);
        }
        let frozen = match options.refresh {
            RedactionRefresh::Frozen => Some(failed),
            RedactionRefresh::PerBatch => None,
        };
        Ok(Self {
            rules,
            source,
            layout,
            history: Arc::new(MetricsHistory::from_events(events)),
            checkpoint,
            options,
            frozen,
        })
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    pub fn history(&self) -> &Arc<MetricsHistory> {
        &self.history
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// The failed set redactions are currently derived from.
    pub fn current_failed_rules(&self) -> FailedRuleSet {
        match &self.frozen {
            Some(frozen) => frozen.clone(),
            None => failed_rule_set(&self.history.snapshot()),
        }
    }

    /// Runs one batch end to end and commits it.
    pub async fn run_batch(&mut self, batch: InputBatch) -> Result<BatchReport> {
        let batch_id = self.checkpoint.next_batch_id();
        let timestamp = self.options.fixed_timestamp.unwrap_or_else(Utc::now);
        let record_count = batch.records.len();
        debug!(
            target: "piisieve_core::pipeline",
            "Batch {} ({}): {} record(s).",
            batch_id,
            batch.source_id,
            record_count
        );

        // Phase 1: per-record routing.
        let routed = route_parallel(batch.records, Arc::clone(&self.rules), self.options.partitions).await?;
        let progress = ProgressLogEntry::flow_progress(timestamp, CLEAN_DATASET, &self.rules, &routed.tallies);
        let events = aggregate(std::slice::from_ref(&progress));

        // Phase 2: batch-global redaction. The shared history only learns about
        // this batch once it is committed.
        let failed = match &self.frozen {
            Some(frozen) => frozen.clone(),
            None => {
                let mut pending = self.history.snapshot();
                pending.extend(events.iter().cloned());
                failed_rule_set(&pending)
            }
        };
        let plan = plan_for(&failed, &self.rules);
        let processed: Vec<ProcessedRecord> = routed.quarantined.iter().map(|q| apply(q, &plan)).collect();
        let redacted = processed.iter().filter(|p| p.is_redacted()).count();
        let redaction_failures = processed.len() - redacted;
        if redaction_failures > 0 {
            warn!(
                "Batch {}: {} record(s) passed through un-redacted after a redaction failure.",
                batch_id, redaction_failures
            );
        }

        self.layout.clean().write_part(batch_id, &routed.clean)?;
        self.layout.quarantine().write_part(batch_id, &routed.quarantined)?;
        self.layout.clean_processed().write_part(batch_id, &processed)?;
        self.layout.events().write_part(batch_id, std::slice::from_ref(&progress))?;
        self.layout.metrics().write_part(batch_id, &events)?;

        let mut committed = self.checkpoint.clone();
        committed.commit(batch_id, &batch.source_id, timestamp);
        committed.save(&self.layout.checkpoint_path())?;
        self.checkpoint = committed;
        self.history.append_batch(events);

        let report = BatchReport {
            batch_id,
            source_id: batch.source_id,
            records: record_count,
            clean: routed.clean.len(),
            quarantined: routed.quarantined.len(),
            redacted,
            redaction_failures,
            selected_redactions: plan.names().map(str::to_string).collect(),
        };
        info!(
            "Committed batch {}: {} clean, {} quarantined, {} redaction(s) selected.",
            report.batch_id,
            report.clean,
            report.quarantined,
            report.selected_redactions.len()
        );
        Ok(report)
    }

    /// Pulls and runs the next batch. `None` once the source is drained.
    pub async fn step(&mut self) -> Result<Option<BatchReport>> {
        match self.source.next_batch(&self.checkpoint).await? {
            Some(batch) => self.run_batch(batch).await.map(Some),
            None => Ok(None),
        }
    }

    /// Runs until the source has no more batches.
    pub async fn run_to_completion(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        while let Some(report) = self.step().await? {
            summary.batches.push(report);
        }
        summary.failed_rules = failed_rule_set(&self.history.snapshot())
            .sorted()
            .into_iter()
            .map(str::to_string)
            .collect();
        info!(
            "Run finished: {} batch(es), {} record(s), {} quarantined.",
            summary.batches.len(),
            summary.records(),
            summary.quarantined()
        );
        Ok(summary)
    }
}
