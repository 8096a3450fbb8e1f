//! Run history storage
//!
//! `execution_log.json` holds every Run Summary ever produced in an output
//! directory; `latest_run.json` holds only the newest one.
//!
//! The history is load-everything, append one, write-everything. Nothing
//! locks the file, so two concurrent runs against the same output directory
//! race and the last writer wins. Callers serialize runs per directory.

use crate::error::{AppError, AppResult};
use crate::pipeline::artifacts;
use crate::pipeline::types::RunSummary;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct HistoryLog {
    path: PathBuf,
    atomic: bool,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>, atomic: bool) -> Self {
        Self {
            path: path.into(),
            atomic,
        }
    }

    /// Load every recorded run. A missing or blank file is an empty history;
    /// anything else that is not a JSON array of runs is an error.
    pub fn load(&self) -> AppResult<Vec<RunSummary>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::io("read execution log", &self.path, e)),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Append one run and rewrite the whole file. Returns the new length.
    pub fn append(&self, summary: &RunSummary) -> AppResult<usize> {
        let mut runs = self.load()?;
        runs.push(summary.clone());
        artifacts::write_json(&self.path, &runs, self.atomic)?;

        debug!(path = %self.path.display(), runs = runs.len(), "Execution log updated");
        Ok(runs.len())
    }
}

/// Overwrite the latest-run file with `summary`.
pub fn write_latest(path: &Path, summary: &RunSummary, atomic: bool) -> AppResult<()> {
    artifacts::write_json(path, summary, atomic)?;
    debug!(path = %path.display(), "Latest run written");
    Ok(())
}
