//! Tables printed by the `run`, `rules` and `metrics` commands.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use piisieve_core::metrics::{RuleTotals, WindowTotals};
use piisieve_core::{FailedRuleSet, RuleSet, RunSummary};

fn new_table(header: Vec<&str>, enable_color: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    if !enable_color {
        table.force_no_tty();
    }
    table
}

/// Red when nonzero and color is enabled.
fn count_cell(n: impl Into<u64>, enable_color: bool) -> Cell {
    let n = n.into();
    let cell = Cell::new(n);
    if enable_color && n > 0 { cell.fg(Color::Red) } else { cell }
}

/// One row per batch plus a totals row.
pub fn run_summary_table(summary: &RunSummary, enable_color: bool) -> Table {
    let mut table = new_table(
        vec!["Batch", "Source", "Records", "Clean", "Quarantined", "Redacted", "Redaction failures"],
        enable_color,
    );
    for b in &summary.batches {
        table.add_row(vec![
            Cell::new(b.batch_id),
            Cell::new(&b.source_id),
            Cell::new(b.records),
            Cell::new(b.clean),
            count_cell(b.quarantined as u64, enable_color),
            Cell::new(b.redacted),
            count_cell(b.redaction_failures as u64, enable_color),
        ]);
    }
    table.add_row(vec![
        Cell::new("total"),
        Cell::new(""),
        Cell::new(summary.records()),
        Cell::new(summary.clean()),
        count_cell(summary.quarantined() as u64, enable_color),
        Cell::new(summary.redacted()),
        count_cell(summary.redaction_failures() as u64, enable_color),
    ]);
    table
}

/// Compiled rules with their target column and expression status.
pub fn rules_table(rules: &RuleSet, enable_color: bool) -> Table {
    let mut table = new_table(vec!["Rule", "Column", "Constraint", "Action", "Status"], enable_color);
    for rule in rules.rules() {
        let errors = rule.expression_errors();
        let status = if errors.is_empty() {
            Cell::new("ok")
        } else {
            let text = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            let cell = Cell::new(format!("invalid: {}", text));
            if enable_color { cell.fg(Color::Red) } else { cell }
        };
        table.add_row(vec![
            Cell::new(&rule.name),
            Cell::new(&rule.target_column),
            Cell::new(&rule.constraint),
            Cell::new(&rule.action),
            status,
        ]);
    }
    table
}

/// Per-rule totals, marking rules whose redaction is selected.
pub fn totals_table(totals: &[RuleTotals], failed: &FailedRuleSet, enable_color: bool) -> Table {
    let mut table = new_table(vec!["Rule", "Passed", "Failed", "Redaction selected"], enable_color);
    for t in totals {
        table.add_row(vec![
            Cell::new(&t.rule_name),
            Cell::new(t.passed),
            count_cell(t.failed, enable_color),
            Cell::new(if failed.contains(&t.rule_name) { "yes" } else { "no" }),
        ]);
    }
    table
}

pub fn windows_table(windows: &[WindowTotals], enable_color: bool) -> Table {
    let mut table = new_table(vec!["Window start", "Rule", "Passed", "Failed"], enable_color);
    for w in windows {
        table.add_row(vec![
            Cell::new(w.window_start.to_rfc3339()),
            Cell::new(&w.rule_name),
            Cell::new(w.passed),
            count_cell(w.failed, enable_color),
        ]);
    }
    table
}
