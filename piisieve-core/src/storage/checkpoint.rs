//! Pipeline checkpoint: which batches are committed and which inputs are consumed.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub committed_batches: BTreeSet<u64>,
    /// Source ids of inputs whose batch is committed.
    #[serde(default)]
    pub processed_inputs: BTreeSet<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Loads the checkpoint, or an empty one if none was written yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(target: "piisieve_core::storage", "No checkpoint at {}, starting fresh.", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&text)?;
        info!(
            "Resuming from checkpoint with {} committed batch(es).",
            checkpoint.committed_batches.len()
        );
        Ok(checkpoint)
    }

    /// Writes the checkpoint through a temp file and a rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension(format!(
            "{}{}",
            path.extension().map(|s| s.to_string_lossy()).unwrap_or_default(),
            TMP_SUFFIX
        ));
        {
            let mut tmp = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path)?;
            tmp.write_all(&json)?;
            tmp.flush()?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn next_batch_id(&self) -> u64 {
        self.committed_batches.last().map_or(0, |id| id + 1)
    }

    pub fn is_processed(&self, source_id: &str) -> bool {
        self.processed_inputs.contains(source_id)
    }

    /// Marks a batch committed. Takes effect on disk at the next [`save`](Self::save).
    pub fn commit(&mut self, batch_id: u64, source_id: &str, at: DateTime<Utc>) {
        self.committed_batches.insert(batch_id);
        self.processed_inputs.insert(source_id.to_string());
        self.updated_at = Some(at);
    }
}
