//! `piisieve metrics`: reports the committed metrics table.

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Duration;
use is_terminal::IsTerminal;
use serde_json::json;

use piisieve_core::metrics::{totals, window_totals, EvaluationEvent};
use piisieve_core::{failed_rule_set, Checkpoint, TableLayout};

use crate::cli::MetricsCommand;
use crate::ui::output::info_msg;
use crate::ui::summary::{totals_table, windows_table};
use crate::ui::theme::ThemeMap;

/// Reads every committed evaluation event under a table root.
pub fn load_history(layout: &TableLayout) -> Result<Vec<EvaluationEvent>> {
    let checkpoint = Checkpoint::load(&layout.checkpoint_path()).context("Failed to read checkpoint")?;
    layout
        .metrics()
        .read_committed(&checkpoint.committed_batches)
        .context("Failed to read metrics table")
}

pub fn metrics_command(cmd: MetricsCommand, theme: &ThemeMap) -> Result<()> {
    let layout = TableLayout::new(&cmd.table_path);
    let history = load_history(&layout)?;
    let rule_totals = totals(&history);
    let failed = failed_rule_set(&history);
    let windows = match cmd.window_secs {
        Some(secs) if secs > 0 => Some(window_totals(&history, Duration::seconds(secs))),
        Some(_) => anyhow::bail!("--window-secs must be positive"),
        None => None,
    };

    let stdout = io::stdout();
    let color = stdout.is_terminal();
    let mut out = stdout.lock();
    if cmd.json {
        let doc = json!({
            "events": history.len(),
            "totals": rule_totals,
            "windows": windows,
            "failed_rules": failed.sorted(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        return Ok(());
    }

    if history.is_empty() {
        info_msg("No committed metrics yet.", theme);
        return Ok(());
    }
    writeln!(out, "{}", totals_table(&rule_totals, &failed, color))?;
    if let Some(windows) = windows {
        writeln!(out, "{}", windows_table(&windows, color))?;
    }
    Ok(())
}
