//! `piisieve rules`: shows what a rule table compiles to.

use std::io::{self, Write};

use anyhow::{Context, Result};
use is_terminal::IsTerminal;

use piisieve_core::{Checkpoint, DirectorySource, RecordSource};

use crate::cli::RulesCommand;
use crate::commands::{build_rule_set, resolve_columns};
use crate::ui::output::warn_msg;
use crate::ui::summary::rules_table;
use crate::ui::theme::ThemeMap;

pub async fn rules_command(cmd: RulesCommand, theme: &ThemeMap) -> Result<()> {
    let inferred = match (&cmd.input_path, cmd.rules.columns.is_empty()) {
        (Some(dir), true) => DirectorySource::new(dir)
            .infer_columns(&Checkpoint::default())
            .await
            .with_context(|| format!("Failed to infer columns from {}", dir.display()))?,
        _ => None,
    };
    let columns = resolve_columns(&cmd.rules, inferred);
    if columns.is_empty() {
        anyhow::bail!("No columns: pass --columns or an --input-path with at least one record");
    }
    let rules = build_rule_set(&cmd.rules, &columns)?;

    let stdout = io::stdout();
    let color = stdout.is_terminal();
    writeln!(stdout.lock(), "{}", rules_table(&rules, color))?;

    let invalid = rules.invalid_rules().count();
    if invalid > 0 {
        warn_msg(format!("{} of {} rule(s) have invalid expressions.", invalid, rules.len()), theme);
    }
    Ok(())
}
