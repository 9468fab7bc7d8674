// piisieve/src/lib.rs
//! # piisieve CLI Application
//!
//! Command-line front end for `piisieve-core`: runs the pipeline over a
//! directory of NDJSON files, inspects compiled rules and metrics, and
//! re-processes the quarantine.

pub mod cli;
pub mod commands;
pub mod logger;
pub mod ui;
