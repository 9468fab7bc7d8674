//! File-backed stand-ins for the tables and checkpoint a streaming engine
//! would normally own.
//!
//! Everything lives under one table root:
//!
//! ```text
//! <root>/clean/            records that passed every rule
//! <root>/quarantine/       records that failed at least one rule
//! <root>/clean_processed/  quarantined records after redaction
//! <root>/metrics/          per-rule evaluation events
//! <root>/system/events/    raw batch-progress log
//! <root>/_checkpoint.json  committed batches and consumed inputs
//! ```
//!
//! Each table is a directory of `part-<batch>.ndjson` files. A part becomes
//! visible only once its batch id is in the checkpoint, which is written after
//! all parts of the batch. A crash between the two leaves parts that readers
//! ignore and the next run deletes.

use std::io;
use std::path::{Path, PathBuf};

pub mod checkpoint;
pub mod source;
pub mod table;

pub use checkpoint::Checkpoint;
pub use source::{DirectorySource, InputBatch, RecordSource, VecSource};
pub use table::NdjsonTable;

const CHECKPOINT_FILE: &str = "_checkpoint.json";

/// Paths of every table under a table root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    root: PathBuf,
}

impl TableLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clean(&self) -> NdjsonTable {
        NdjsonTable::new(self.root.join("clean"))
    }

    pub fn quarantine(&self) -> NdjsonTable {
        NdjsonTable::new(self.root.join("quarantine"))
    }

    pub fn clean_processed(&self) -> NdjsonTable {
        NdjsonTable::new(self.root.join("clean_processed"))
    }

    pub fn metrics(&self) -> NdjsonTable {
        NdjsonTable::new(self.root.join("metrics"))
    }

    pub fn events(&self) -> NdjsonTable {
        NdjsonTable::new(self.root.join("system").join("events"))
    }

    pub fn tables(&self) -> [NdjsonTable; 5] {
        [self.clean(), self.quarantine(), self.clean_processed(), self.metrics(), self.events()]
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join(CHECKPOINT_FILE)
    }

    /// Creates the root and every table directory.
    pub fn ensure(&self) -> io::Result<()> {
        for table in self.tables() {
            std::fs::create_dir_all(table.dir())?;
        }
        Ok(())
    }
}
