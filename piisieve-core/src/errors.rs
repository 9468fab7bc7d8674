//! errors.rs - Custom error types for the piisieve-core library.
//!
//! The pipeline distinguishes four failure families: compile-time failures
//! (fatal, stop the pipeline before any record is read), per-rule evaluation
//! failures, per-entry aggregation failures and per-record redaction failures.
//! Only the first propagates out of a run; the others are contained where they
//! occur and surface as verdicts, skipped log entries or record markers.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// Errors produced while parsing or interpreting a rule expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {actual}")]
    Arity { name: String, expected: String, actual: usize },

    #[error("unsupported cast target '{0}'")]
    UnsupportedCast(String),

    #[error("column '{0}' is not present in the record")]
    MissingColumn(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// This enum represents all possible error types in the `piisieve-core` library.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("Rule name '{name}' is produced more than once (template '{template}', column '{column}')")]
    DuplicateRuleName { name: String, template: String, column: String },

    #[error("Rule '{rule}' has an invalid expression: {source}")]
    Expression { rule: String, source: ExprError },

    #[error("Failed to evaluate rule '{rule}': {source}")]
    Evaluation { rule: String, source: ExprError },

    #[error("Malformed progress log entry: {0}")]
    Aggregation(String),

    #[error("Redaction '{rule}' failed: {source}")]
    Redaction { rule: String, source: ExprError },

    #[error("An unexpected I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
