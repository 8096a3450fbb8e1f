//! Orchestrator - runs the gate over a batch of SQL files

use crate::config::{OutputConfig, Settings};
use crate::error::{invalid_input, AppResult, IoContext};
use crate::pipeline::decision::DecisionWriter;
use crate::pipeline::history::{self, HistoryLog};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::RunSummary;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Runs the Decision step over each file and records the batch
pub struct Orchestrator {
    writer: DecisionWriter,
    output: OutputConfig,
}

impl Orchestrator {
    pub fn new(writer: DecisionWriter, output: OutputConfig) -> Self {
        Self { writer, output }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let engine = RulesEngine::with_disabled(&settings.rules.disabled);
        let writer = DecisionWriter::new(engine, settings.output.backups_dir.clone());
        Self::new(writer, settings.output.clone())
    }

    /// Process `sql_paths` in the given order and persist the run.
    ///
    /// The first file that fails to process aborts the whole batch; nothing
    /// is recorded in the history for an aborted run.
    pub fn run_batch(
        &self,
        sql_paths: &[PathBuf],
        snapshot_path: &Path,
        output_dir: &Path,
    ) -> AppResult<RunSummary> {
        fs::create_dir_all(output_dir).with_path("create output directory", output_dir)?;

        let mut results = Vec::with_capacity(sql_paths.len());
        for sql_path in sql_paths {
            results.push(self.writer.decide(sql_path, snapshot_path, output_dir)?);
        }

        let summary = RunSummary::from_results(Utc::now(), results);

        let log = HistoryLog::new(output_dir.join(&self.output.log_file), self.output.atomic_writes);
        let runs = log.append(&summary)?;
        history::write_latest(
            &output_dir.join(&self.output.latest_file),
            &summary,
            self.output.atomic_writes,
        )?;

        info!(
            total = summary.total_files,
            approved = summary.approved_count,
            blocked = summary.blocked_count,
            history_runs = runs,
            "Batch complete"
        );
        Ok(summary)
    }

    /// List `*.sql` files directly inside `dir`, sorted by file name.
    pub fn collect_sql_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(invalid_input(format!("{} is not a directory", dir.display())));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_path("read SQL directory", dir)? {
            let entry = entry.with_path("read SQL directory", dir)?;
            let path = entry.path();
            let is_sql = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
            if is_sql && path.is_file() {
                files.push(path);
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(DecisionWriter::default(), OutputConfig::default())
    }
}
