//! `piisieve reprocess`: re-applies the current redaction selection to the
//! whole committed quarantine table.
//!
//! Useful after more failures have been aggregated than were known when a
//! quarantined record was first processed. The tables themselves are not
//! modified.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};

use piisieve_core::record::columns_of;
use piisieve_core::{apply, failed_rule_set, Checkpoint, QuarantinedRecord, TableLayout};
use piisieve_core::selector::{plan_for, unknown_rules};

use crate::cli::ReprocessCommand;
use crate::commands::metrics::load_history;
use crate::commands::{build_rule_set, resolve_columns};
use crate::ui::output::{info_msg, warn_msg};
use crate::ui::theme::ThemeMap;

pub fn reprocess_command(cmd: ReprocessCommand, theme: &ThemeMap) -> Result<()> {
    let layout = TableLayout::new(&cmd.table_path);
    let checkpoint = Checkpoint::load(&layout.checkpoint_path()).context("Failed to read checkpoint")?;
    let quarantine: Vec<QuarantinedRecord> = layout
        .quarantine()
        .read_committed(&checkpoint.committed_batches)
        .context("Failed to read quarantine table")?;

    let inferred = quarantine.first().map(|q| columns_of(&q.record));
    let columns = resolve_columns(&cmd.rules, inferred);
    let rules = build_rule_set(&cmd.rules, &columns)?;
    let history = load_history(&layout)?;
    let failed = failed_rule_set(&history);
    for unknown in unknown_rules(&failed, &rules) {
        warn_msg(format!("Ignoring failures of rule '{}', which is not in the current rule set.", unknown), theme);
    }
    let plan = plan_for(&failed, &rules);

    let mut out: Box<dyn Write> = match &cmd.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let mut failures = 0usize;
    for q in &quarantine {
        let processed = apply(q, &plan);
        if !processed.is_redacted() {
            failures += 1;
        }
        serde_json::to_writer(&mut out, &processed)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info_msg(
        format!("Re-processed {} quarantined record(s) with {} redaction(s).", quarantine.len(), plan.len()),
        theme,
    );
    if failures > 0 {
        warn_msg(format!("{} record(s) could not be redacted and were passed through.", failures), theme);
    }
    Ok(())
}
