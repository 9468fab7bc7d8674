//! Record sources feeding the pipeline one batch at a time.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

use crate::errors::{PipelineError, Result};
use crate::record::{columns_of, Record};
use crate::storage::Checkpoint;

/// File extensions [`DirectorySource`] picks up.
pub const INPUT_EXTENSIONS: &[&str] = &["ndjson", "jsonl"];

/// One micro-batch of input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputBatch {
    /// Stable identifier of where the batch came from, recorded in the checkpoint.
    pub source_id: String,
    pub records: Vec<Record>,
}

/// An append-only stream of records, read in batches.
#[async_trait]
pub trait RecordSource: Send {
    /// Returns the next batch not yet covered by `checkpoint`, or `None` once
    /// the source is drained.
    async fn next_batch(&mut self, checkpoint: &Checkpoint) -> Result<Option<InputBatch>>;

    /// Column names of the first available record, used when no schema is given.
    async fn infer_columns(&mut self, checkpoint: &Checkpoint) -> Result<Option<Vec<String>>>;
}

/// In-memory source, one batch per inner vector.
#[derive(Debug, Default)]
pub struct VecSource {
    batches: VecDeque<Vec<Record>>,
    served: usize,
}

impl VecSource {
    pub fn new(batches: Vec<Vec<Record>>) -> Self {
        Self { batches: batches.into(), served: 0 }
    }

    pub fn push(&mut self, batch: Vec<Record>) {
        self.batches.push_back(batch);
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn next_batch(&mut self, _checkpoint: &Checkpoint) -> Result<Option<InputBatch>> {
        let Some(records) = self.batches.pop_front() else {
            return Ok(None);
        };
        let source_id = format!("memory-{}", self.served);
        self.served += 1;
        Ok(Some(InputBatch { source_id, records }))
    }

    async fn infer_columns(&mut self, _checkpoint: &Checkpoint) -> Result<Option<Vec<String>>> {
        Ok(self.batches.iter().flatten().next().map(columns_of))
    }
}

/// Reads every `*.ndjson` / `*.jsonl` file of a directory, in file-name order,
/// one file per batch. Files already recorded in the checkpoint are skipped,
/// so restarting against the same table root resumes where it stopped.
#[derive(Debug)]
pub struct DirectorySource {
    dir: PathBuf,
    pending: Option<VecDeque<PathBuf>>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), pending: None }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn pending(&mut self, checkpoint: &Checkpoint) -> Result<&mut VecDeque<PathBuf>> {
        if self.pending.is_none() {
            let mut files = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let wanted = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| INPUT_EXTENSIONS.contains(&e));
                if wanted && entry.file_type().await?.is_file() {
                    files.push(path);
                }
            }
            files.sort();
            let total = files.len();
            files.retain(|p| !checkpoint.is_processed(&source_id_of(p)));
            info!(
                "Found {} input file(s) in {}, {} already processed.",
                total,
                self.dir.display(),
                total - files.len()
            );
            self.pending = Some(files.into());
        }
        Ok(self.pending.get_or_insert_with(VecDeque::new))
    }
}

#[async_trait]
impl RecordSource for DirectorySource {
    async fn next_batch(&mut self, checkpoint: &Checkpoint) -> Result<Option<InputBatch>> {
        // A file leaves the queue once its batch is committed, so a failed
        // batch is served again on the next call.
        let pending = self.pending(checkpoint).await?;
        while pending.front().is_some_and(|p| checkpoint.is_processed(&source_id_of(p))) {
            pending.pop_front();
        }
        let Some(path) = pending.front().cloned() else {
            return Ok(None);
        };
        let text = tokio::fs::read_to_string(&path).await?;
        let records = parse_ndjson(&path, &text)?;
        debug!(target: "piisieve_core::storage", "Read {} record(s) from {}", records.len(), path.display());
        Ok(Some(InputBatch { source_id: source_id_of(&path), records }))
    }

    async fn infer_columns(&mut self, checkpoint: &Checkpoint) -> Result<Option<Vec<String>>> {
        let files: Vec<PathBuf> = self.pending(checkpoint).await?.iter().cloned().collect();
        for path in files {
            let text = tokio::fs::read_to_string(&path).await?;
            if let Some(first) = parse_ndjson(&path, &text)?.first() {
                return Ok(Some(columns_of(first)));
            }
        }
        Ok(None)
    }
}

fn source_id_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parses newline-delimited JSON objects. Blank lines are ignored.
pub fn parse_ndjson(path: &Path, text: &str) -> Result<Vec<Record>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => Ok(record),
            Ok(_) => Err(PipelineError::Fatal(format!(
                "{}:{}: expected a JSON object",
                path.display(),
                n + 1
            ))),
            Err(e) => Err(PipelineError::Fatal(format!("{}:{}: {}", path.display(), n + 1, e))),
        })
        .collect()
}
