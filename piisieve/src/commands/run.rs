//! `piisieve run`: drains the input directory into the table root.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::info;
use serde::Serialize;

use piisieve_core::{
    Checkpoint, DirectorySource, PipelineOptions, PipelineRunner, RecordSource, RedactionRefresh,
    RunSummary, TableLayout,
};

use crate::cli::RunCommand;
use crate::commands::{build_rule_set, resolve_columns};
use crate::ui::output::{success_msg, warn_msg};
use crate::ui::summary::run_summary_table;
use crate::ui::theme::ThemeMap;

pub async fn run_command(cmd: RunCommand, theme: &ThemeMap) -> Result<()> {
    if !cmd.input_path.is_dir() {
        anyhow::bail!("Input path {} is not a directory", cmd.input_path.display());
    }
    let layout = TableLayout::new(&cmd.table_path);
    let mut source = DirectorySource::new(&cmd.input_path);

    let inferred = if cmd.rules.columns.is_empty() {
        let checkpoint = Checkpoint::load(&layout.checkpoint_path()).context("Failed to read checkpoint")?;
        source.infer_columns(&checkpoint).await.context("Failed to infer columns")?
    } else {
        None
    };
    let columns = resolve_columns(&cmd.rules, inferred);
    if columns.is_empty() {
        warn_msg("No columns given and no pending input to infer them from.", theme);
    }
    let rules = Arc::new(build_rule_set(&cmd.rules, &columns)?);
    let invalid = rules.invalid_rules().count();
    if invalid > 0 {
        warn_msg(
            format!("{} rule(s) have invalid expressions; records will be quarantined by them.", invalid),
            theme,
        );
    }

    let mut options = PipelineOptions::default();
    if let Some(partitions) = cmd.partitions {
        options.partitions = partitions;
    }
    if cmd.freeze_redactions {
        options.refresh = RedactionRefresh::Frozen;
    }

    let mut runner = PipelineRunner::open(rules, source, layout, options)
        .with_context(|| format!("Failed to open table root {}", cmd.table_path.display()))?;
    let summary = runner.run_to_completion().await.context("Pipeline run failed")?;
    info!("Processed {} batch(es).", summary.batches.len());

    print_summary(&summary, cmd.json)?;
    success_msg(
        format!(
            "{} record(s): {} clean, {} quarantined.",
            summary.records(),
            summary.clean(),
            summary.quarantined()
        ),
        theme,
    );
    Ok(())
}

/// JSON form of a run summary.
#[derive(Serialize)]
struct JsonSummary<'a> {
    batches: Vec<JsonBatch<'a>>,
    records: usize,
    clean: usize,
    quarantined: usize,
    redaction_failures: usize,
    failed_rules: &'a [String],
}

#[derive(Serialize)]
struct JsonBatch<'a> {
    batch_id: u64,
    source_id: &'a str,
    records: usize,
    clean: usize,
    quarantined: usize,
    redacted: usize,
    redaction_failures: usize,
    selected_redactions: &'a [String],
}

fn print_summary(summary: &RunSummary, as_json: bool) -> Result<()> {
    let stdout = io::stdout();
    let color = stdout.is_terminal();
    let mut out = stdout.lock();
    if as_json {
        let doc = JsonSummary {
            batches: summary
                .batches
                .iter()
                .map(|b| JsonBatch {
                    batch_id: b.batch_id,
                    source_id: &b.source_id,
                    records: b.records,
                    clean: b.clean,
                    quarantined: b.quarantined,
                    redacted: b.redacted,
                    redaction_failures: b.redaction_failures,
                    selected_redactions: &b.selected_redactions,
                })
                .collect(),
            records: summary.records(),
            clean: summary.clean(),
            quarantined: summary.quarantined(),
            redaction_failures: summary.redaction_failures(),
            failed_rules: &summary.failed_rules,
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
    } else {
        writeln!(out, "{}", run_summary_table(summary, color))?;
    }
    Ok(())
}
