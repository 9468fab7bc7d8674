//! Append-only NDJSON tables made of per-batch part files.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{PipelineError, Result};

const PART_PREFIX: &str = "part-";
const PART_SUFFIX: &str = ".ndjson";
const TMP_SUFFIX: &str = ".tmp";

/// One table directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdjsonTable {
    dir: PathBuf,
}

impl NdjsonTable {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn part_path(&self, batch_id: u64) -> PathBuf {
        self.dir.join(format!("{}{:010}{}", PART_PREFIX, batch_id, PART_SUFFIX))
    }

    /// Writes the rows of one batch. The part appears under its final name
    /// only when fully written. Empty batches write no file.
    pub fn write_part<T: Serialize>(&self, batch_id: u64, rows: &[T]) -> Result<Option<PathBuf>> {
        if rows.is_empty() {
            return Ok(None);
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.part_path(batch_id);
        let tmp_path = path.with_extension(format!("ndjson{}", TMP_SUFFIX));
        {
            let mut out = BufWriter::new(File::create(&tmp_path)?);
            for row in rows {
                serde_json::to_writer(&mut out, row)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        debug!(target: "piisieve_core::storage", "Wrote {} row(s) to {}", rows.len(), path.display());
        Ok(Some(path))
    }

    /// Batch ids of every finished part file, committed or not.
    pub fn part_ids(&self) -> Result<BTreeSet<u64>> {
        let mut ids = BTreeSet::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            if let Some(id) = parse_part_id(&name.to_string_lossy()) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    /// Reads all rows of committed batches, in batch order.
    pub fn read_committed<T: DeserializeOwned>(&self, committed: &BTreeSet<u64>) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let ids = self.part_ids()?;
        for id in ids.intersection(committed) {
            let path = self.part_path(*id);
            let reader = BufReader::new(File::open(&path)?);
            for (n, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let row = serde_json::from_str(&line).map_err(|e| {
                    PipelineError::Fatal(format!("{}:{}: {}", path.display(), n + 1, e))
                })?;
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Deletes parts of uncommitted batches and leftover temp files.
    pub fn discard_uncommitted(&self, committed: &BTreeSet<u64>) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let stale = name.ends_with(TMP_SUFFIX)
                || parse_part_id(&name).is_some_and(|id| !committed.contains(&id));
            if stale {
                warn!(target: "piisieve_core::storage", "Removing uncommitted file {}", entry.path().display());
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn parse_part_id(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(PART_PREFIX)?
        .strip_suffix(PART_SUFFIX)?
        .parse()
        .ok()
}
