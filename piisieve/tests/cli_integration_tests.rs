// piisieve/tests/cli_integration_tests.rs
//! Command-line integration tests for the `piisieve` binary.
//!
//! Each test builds an input directory and a table root in temporary
//! directories, runs the binary with `assert_cmd` and checks its output and
//! the files it leaves behind. Output is piped, so no ANSI styling is emitted.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const INPUT: &str = concat!(
    "{\"name\": \"Ada\", \"card\": \"4111111111111111\", \"ssn\": \"n/a\"}\n",
    "{\"name\": \"Grace\", \"card\": \"none\", \"ssn\": \"123-45-6789\"}\n",
    "{\"name\": \"Linus\", \"card\": \"none\", \"ssn\": \"n/a\"}\n",
);

/// A `piisieve` command isolated from the caller's environment.
fn piisieve() -> Command {
    let mut cmd = Command::cargo_bin("piisieve").unwrap();
    for var in ["PIISIEVE_INPUT_PATH", "PIISIEVE_TABLE_PATH", "PIISIEVE_RULES", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

fn run_pipeline(input: &Path, table: &Path) {
    piisieve()
        .args(["run", "--input-path"])
        .arg(input)
        .arg("--table-path")
        .arg(table)
        .assert()
        .success();
}

#[test_log::test]
fn test_help_lists_subcommands() {
    piisieve()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("reprocess"));
}

#[test_log::test]
fn test_run_writes_tables_and_prints_summary() -> Result<()> {
    let input = tempdir()?;
    let table = tempdir()?;
    fs::write(input.path().join("batch-001.ndjson"), INPUT)?;

    piisieve()
        .args(["run", "--partitions", "2", "--input-path"])
        .arg(input.path())
        .arg("--table-path")
        .arg(table.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Quarantined"))
        .stdout(predicate::str::contains("batch-001.ndjson"))
        .stderr(predicate::str::contains("3 record(s): 1 clean, 2 quarantined."));

    assert!(table.path().join("_checkpoint.json").exists());
    let processed = fs::read_to_string(table.path().join("clean_processed/part-0000000000.ndjson"))?;
    assert!(processed.contains("XXXXXXXXXXXXXXXX111"));
    assert!(processed.contains("[REDACTED]"));
    assert!(!processed.contains("123-45-6789"));
    Ok(())
}

#[test_log::test]
fn test_run_reads_paths_from_environment() -> Result<()> {
    let input = tempdir()?;
    let table = tempdir()?;
    fs::write(input.path().join("a.ndjson"), INPUT)?;

    piisieve()
        .args(["run", "--json"])
        .env("PIISIEVE_INPUT_PATH", input.path())
        .env("PIISIEVE_TABLE_PATH", table.path())
        .assert()
        .success();

    // A second run finds nothing new.
    let output = piisieve()
        .args(["run", "--json"])
        .env("PIISIEVE_INPUT_PATH", input.path())
        .env("PIISIEVE_TABLE_PATH", table.path())
        .output()?;
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary["records"], 0);
    assert_eq!(summary["failed_rules"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test_log::test]
fn test_run_rejects_missing_input_directory() -> Result<()> {
    let table = tempdir()?;
    piisieve()
        .args(["run", "--input-path", "/no/such/input/dir", "--table-path"])
        .arg(table.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
    Ok(())
}

#[test_log::test]
fn test_rules_lists_compiled_rules() {
    piisieve()
        .args(["rules", "--columns", "card,ssn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("card may contain creditcard"))
        .stdout(predicate::str::contains("ssn may contain ipv4"));
}

#[test_log::test]
fn test_rules_flags_invalid_expressions() -> Result<()> {
    let dir = tempdir()?;
    let rules = dir.path().join("rules.yaml");
    fs::write(
        &rules,
        "rules:\n  - name: '{} broken'\n    constraint: '{} NOT REGEXP ''('''\n    action: '''x'' AS {}'\n",
    )?;
    piisieve()
        .args(["rules", "--columns", "c", "--rules"])
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("invalid"))
        .stderr(predicate::str::contains("1 of 1 rule(s) have invalid expressions."));
    Ok(())
}

#[test_log::test]
fn test_rules_with_duplicate_names_fail() -> Result<()> {
    let dir = tempdir()?;
    let rules = dir.path().join("rules.yaml");
    fs::write(
        &rules,
        "rules:\n  - name: '{} a'\n    constraint: '{} NOT REGEXP ''x'''\n    action: '''x'' AS {}'\n  - name: 'shared {}'\n    constraint: '{} NOT REGEXP ''y'''\n    action: '''y'' AS {}'\n",
    )?;
    // Column "shared" and template "{} a" collide with column "a" and template "shared {}".
    piisieve()
        .args(["rules", "--columns", "shared,a", "--rules"])
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("more than once"));
    Ok(())
}

#[test_log::test]
fn test_metrics_json_reports_failed_rules() -> Result<()> {
    let input = tempdir()?;
    let table = tempdir()?;
    fs::write(input.path().join("a.ndjson"), INPUT)?;
    run_pipeline(input.path(), table.path());

    let output = piisieve()
        .args(["metrics", "--json", "--window-secs", "60", "--table-path"])
        .arg(table.path())
        .output()?;
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(doc["events"], 18);
    let failed: Vec<&str> = doc["failed_rules"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(failed, vec!["card may contain creditcard", "ssn may contain ssn"]);
    assert!(doc["windows"].as_array().is_some_and(|w| !w.is_empty()));
    Ok(())
}

#[test_log::test]
fn test_metrics_on_empty_table_root() -> Result<()> {
    let table = tempdir()?;
    piisieve()
        .args(["metrics", "--table-path"])
        .arg(table.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("No committed metrics yet."));
    Ok(())
}

#[test_log::test]
fn test_reprocess_writes_redacted_quarantine() -> Result<()> {
    let input = tempdir()?;
    let table = tempdir()?;
    fs::write(input.path().join("a.ndjson"), INPUT)?;
    run_pipeline(input.path(), table.path());

    let out_file = table.path().join("reprocessed.ndjson");
    piisieve()
        .args(["reprocess", "--output"])
        .arg(&out_file)
        .arg("--table-path")
        .arg(table.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Re-processed 2 quarantined record(s) with 2 redaction(s)."));

    let lines: Vec<Value> = fs::read_to_string(&out_file)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["record"]["card"], "XXXXXXXXXXXXXXXX111");
    assert_eq!(lines[1]["record"]["ssn"], "[REDACTED]");
    assert_eq!(lines[1]["redaction"]["status"], "applied");
    Ok(())
}

#[test_log::test]
fn test_reprocess_warns_about_rules_missing_from_rule_set() -> Result<()> {
    let input = tempdir()?;
    let table = tempdir()?;
    fs::write(input.path().join("a.ndjson"), INPUT)?;
    run_pipeline(input.path(), table.path());

    piisieve()
        .args(["reprocess", "--columns", "card", "--output"])
        .arg(table.path().join("reprocessed.ndjson"))
        .arg("--table-path")
        .arg(table.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Ignoring failures of rule 'ssn may contain ssn'"))
        .stderr(predicate::str::contains("with 1 redaction(s)."));
    Ok(())
}
