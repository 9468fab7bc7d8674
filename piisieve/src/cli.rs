// piisieve/src/cli.rs
//! Command-line interface definition for the piisieve binary.
//! License: MIT OR APACHE 2.0

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "piisieve",
    author = "Obscura Tech",
    version = env!("CARGO_PKG_VERSION"),
    about = "Detect, quarantine and redact PII in record streams",
    long_about = "piisieve reads newline-delimited JSON records in batches, checks every column against a table of PII rules, writes records that pass to a clean table and the rest to a quarantine table, tracks per-rule pass/fail counts over time, and re-processes quarantined records with the redactions of every rule that has ever failed.",
    arg_required_else_help = true,
)]
pub struct Cli {
    /// Disable informational messages
    #[arg(long, short = 'q', global = true, help = "Suppress all log output.")]
    pub quiet: bool,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, short = 'd', global = true, help = "Enable debug logging.")]
    pub debug: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// All available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Processes every pending input batch into the table root.
    #[command(about = "Process all pending input files into the clean, quarantine and clean_processed tables.")]
    Run(RunCommand),

    /// Lists the rules compiled from the rule table.
    #[command(about = "List the compiled rules for a set of columns and flag invalid expressions.")]
    Rules(RulesCommand),

    /// Shows aggregated rule metrics.
    #[command(about = "Show per-rule pass/fail totals and the rules whose redaction is selected.")]
    Metrics(MetricsCommand),

    /// Re-applies the current redaction selection to the whole quarantine.
    #[command(about = "Re-apply the current redaction selection to every committed quarantined record.")]
    Reprocess(ReprocessCommand),
}

/// Options selecting the rule table and the schema columns.
#[derive(Args, Debug, Clone, Default)]
pub struct RuleArgs {
    /// Rule table YAML. The embedded default table is used when absent.
    #[arg(long = "rules", value_name = "FILE", env = "PIISIEVE_RULES", help = "Path to a rule table (YAML). Defaults to the built-in table.")]
    pub rules: Option<PathBuf>,

    /// Schema columns, in order.
    #[arg(long = "columns", value_name = "COLS", value_delimiter = ',', help = "Comma-separated schema columns. Inferred from the first record when omitted.")]
    pub columns: Vec<String>,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunCommand {
    /// Directory of `*.ndjson` / `*.jsonl` input files.
    #[arg(long = "input-path", short = 'i', value_name = "DIR", env = "PIISIEVE_INPUT_PATH", help = "Directory of newline-delimited JSON input files.")]
    pub input_path: PathBuf,

    /// Root directory of the output tables.
    #[arg(long = "table-path", short = 't', value_name = "DIR", env = "PIISIEVE_TABLE_PATH", help = "Root directory for the output tables and checkpoint.")]
    pub table_path: PathBuf,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Routing partitions per batch.
    #[arg(long = "partitions", value_name = "N", help = "Number of parallel partitions per batch. Defaults to the number of CPUs.")]
    pub partitions: Option<usize>,

    /// Compute the redaction selection once at start-up.
    #[arg(long = "freeze-redactions", help = "Select redactions once from the history present at start-up instead of after every batch.")]
    pub freeze_redactions: bool,

    /// Print the run summary as JSON.
    #[arg(long = "json", help = "Print the run summary as JSON instead of a table.")]
    pub json: bool,
}

/// Arguments for the `rules` command.
#[derive(Parser, Debug)]
pub struct RulesCommand {
    #[command(flatten)]
    pub rules: RuleArgs,

    /// Input directory used to infer columns when `--columns` is absent.
    #[arg(long = "input-path", short = 'i', value_name = "DIR", env = "PIISIEVE_INPUT_PATH", help = "Input directory to infer columns from.")]
    pub input_path: Option<PathBuf>,
}

/// Arguments for the `metrics` command.
#[derive(Parser, Debug)]
pub struct MetricsCommand {
    #[arg(long = "table-path", short = 't', value_name = "DIR", env = "PIISIEVE_TABLE_PATH", help = "Root directory of the output tables.")]
    pub table_path: PathBuf,

    /// Also group counts into windows of this many seconds.
    #[arg(long = "window-secs", value_name = "SECS", help = "Also show totals per time window of this many seconds.")]
    pub window_secs: Option<i64>,

    #[arg(long = "json", help = "Print metrics as JSON.")]
    pub json: bool,
}

/// Arguments for the `reprocess` command.
#[derive(Parser, Debug)]
pub struct ReprocessCommand {
    #[arg(long = "table-path", short = 't', value_name = "DIR", env = "PIISIEVE_TABLE_PATH", help = "Root directory of the output tables.")]
    pub table_path: PathBuf,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Write NDJSON here instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE", help = "Write the re-processed records to a file instead of stdout.")]
    pub output: Option<PathBuf>,
}
