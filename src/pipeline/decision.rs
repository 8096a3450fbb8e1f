//! Decision & Artifact Writer
//!
//! Validates one SQL file and, when nothing blocks it, captures a backup of
//! the snapshot and drops a rollback stub next to it.

use crate::error::{invalid_input, AppResult, IoContext};
use crate::pipeline::artifacts::{self, ArtifactPaths};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{DecisionResult, DecisionStatus};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct DecisionWriter {
    engine: RulesEngine,
    backups_dir: String,
}

impl DecisionWriter {
    pub fn new(engine: RulesEngine, backups_dir: impl Into<String>) -> Self {
        Self {
            engine,
            backups_dir: backups_dir.into(),
        }
    }

    pub fn backups_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.backups_dir)
    }

    /// Decide one SQL file against the current clock.
    pub fn decide(
        &self,
        sql_path: &Path,
        snapshot_path: &Path,
        output_dir: &Path,
    ) -> AppResult<DecisionResult> {
        self.decide_at(sql_path, snapshot_path, output_dir, Utc::now())
    }

    /// Decide one SQL file with the timestamp fixed to `now`.
    pub fn decide_at(
        &self,
        sql_path: &Path,
        snapshot_path: &Path,
        output_dir: &Path,
        now: DateTime<Utc>,
    ) -> AppResult<DecisionResult> {
        let backups_dir = self.backups_path(output_dir);
        fs::create_dir_all(&backups_dir).with_path("create backups directory", &backups_dir)?;

        let snapshot_meta =
            fs::metadata(snapshot_path).with_path("locate snapshot", snapshot_path)?;
        if snapshot_meta.is_dir() {
            return Err(invalid_input(format!(
                "snapshot {} is a directory, expected a file",
                snapshot_path.display()
            )));
        }

        let sql_text = fs::read_to_string(sql_path).with_path("read SQL file", sql_path)?;
        let findings = self.engine.validate(&sql_text);
        let status = DecisionStatus::from_findings(&findings);
        let timestamp = artifacts::format_timestamp(now);
        let source_path = sql_path.display().to_string();

        if status == DecisionStatus::Blocked {
            warn!(
                sql = %source_path,
                findings = findings.len(),
                "SQL script blocked"
            );
            return Ok(DecisionResult {
                status,
                timestamp,
                findings,
                backup_path: None,
                rollback_path: None,
                source_path,
            });
        }

        let paths = ArtifactPaths::claim(output_dir, &backups_dir, &timestamp)?;
        artifacts::copy_snapshot(snapshot_path, &paths.backup)?;
        artifacts::write_rollback_stub(&paths.rollback)?;

        info!(
            sql = %source_path,
            warnings = findings.len(),
            backup = %paths.backup.display(),
            "SQL script approved"
        );

        Ok(DecisionResult {
            status,
            timestamp,
            findings,
            backup_path: Some(paths.backup.display().to_string()),
            rollback_path: Some(paths.rollback.display().to_string()),
            source_path,
        })
    }
}

impl Default for DecisionWriter {
    fn default() -> Self {
        Self::new(RulesEngine::new(), "backups")
    }
}
