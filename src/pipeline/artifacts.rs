//! Artifact writers
//!
//! Backup copies, rollback stubs and JSON record files in the output
//! directory. Artifact names are keyed by the decision timestamp.

use crate::error::{AppResult, IoContext};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lexicographically sortable UTC timestamp used in artifact names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Rollback placeholder. Not derived from the approved SQL.
pub const ROLLBACK_STUB: &str = "-- Rollback stub: compensating statements must be written by hand\n\
BEGIN TRANSACTION;\n\
-- Revert the approved change here, restoring from the matching backup if needed\n\
COMMIT;\n";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn backup_file_name(key: &str) -> String {
    format!("backup_{}.json", key)
}

pub fn rollback_file_name(key: &str) -> String {
    format!("rollback_{}.sql", key)
}

/// Paths for one approved script's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub backup: PathBuf,
    pub rollback: PathBuf,
}

impl ArtifactPaths {
    /// Claim the first key (`<ts>`, `<ts>_1`, `<ts>_2`, ...) whose backup and
    /// rollback files can both be created fresh. Both files are created empty
    /// with `create_new`, so an existing artifact is never reused.
    pub fn claim(output_dir: &Path, backups_dir: &Path, timestamp: &str) -> AppResult<Self> {
        let mut suffix = 0usize;
        loop {
            let key = if suffix == 0 {
                timestamp.to_string()
            } else {
                format!("{}_{}", timestamp, suffix)
            };
            suffix += 1;

            let backup = backups_dir.join(backup_file_name(&key));
            if !create_new(&backup).with_path("reserve backup", &backup)? {
                continue;
            }

            let rollback = output_dir.join(rollback_file_name(&key));
            if !create_new(&rollback).with_path("reserve rollback stub", &rollback)? {
                fs::remove_file(&backup).with_path("release backup", &backup)?;
                continue;
            }

            return Ok(Self { backup, rollback });
        }
    }
}

/// `Ok(false)` when the file already exists.
fn create_new(path: &Path) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

/// Copy the snapshot byte-for-byte; its format is opaque here.
pub fn copy_snapshot(snapshot: &Path, backup: &Path) -> AppResult<()> {
    let bytes = fs::read(snapshot).with_path("read snapshot", snapshot)?;
    fs::write(backup, &bytes).with_path("write backup", backup)?;

    debug!(
        backup = %backup.display(),
        bytes = bytes.len(),
        sha256 = %format!("{:x}", Sha256::digest(&bytes)),
        "Snapshot backed up"
    );
    Ok(())
}

pub fn write_rollback_stub(path: &Path) -> AppResult<()> {
    fs::write(path, ROLLBACK_STUB).with_path("write rollback stub", path)?;
    debug!(rollback = %path.display(), "Rollback stub written");
    Ok(())
}

/// Serialize `value` as pretty JSON to `path`.
///
/// With `atomic`, the bytes go to a temp file in the same directory which is
/// then renamed over `path`; a crash leaves either the old or the new file.
/// Without it the file is truncated and rewritten in place.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, atomic: bool) -> AppResult<()> {
    let body = serde_json::to_string_pretty(value)?;

    if !atomic {
        return fs::write(path, body).with_path("write JSON file", path);
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).with_path("create temp file", dir)?;
    if let Some(perms) = replacement_permissions(path) {
        tmp.as_file()
            .set_permissions(perms)
            .with_path("set temp file permissions", tmp.path())?;
    }
    tmp.write_all(body.as_bytes())
        .with_path("write temp file", tmp.path())?;
    tmp.as_file()
        .sync_all()
        .with_path("sync temp file", path)?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_path("replace JSON file", path)?;
    Ok(())
}

/// Permissions the replacement file should carry: those of the file being
/// replaced, or the usual `0644` for a new one. Temp files start at `0600`.
fn replacement_permissions(path: &Path) -> Option<Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_timestamp(at), "20240309T070501Z");
    }

    #[test]
    fn test_rollback_stub_is_four_lines() {
        assert_eq!(ROLLBACK_STUB.lines().count(), 4);
        assert!(ROLLBACK_STUB.contains("BEGIN TRANSACTION;"));
        assert!(ROLLBACK_STUB.contains("COMMIT;"));
    }

    #[test]
    fn test_claim_skips_taken_keys() {
        let dir = TempDir::new().unwrap();
        let backups = dir.path().join("backups");
        fs::create_dir_all(&backups).unwrap();

        let first = ArtifactPaths::claim(dir.path(), &backups, "20240101T000000Z").unwrap();
        assert_eq!(first.backup, backups.join("backup_20240101T000000Z.json"));
        assert_eq!(first.rollback, dir.path().join("rollback_20240101T000000Z.sql"));
        assert!(first.backup.is_file());
        assert!(first.rollback.is_file());

        let second = ArtifactPaths::claim(dir.path(), &backups, "20240101T000000Z").unwrap();
        assert_eq!(second.backup, backups.join("backup_20240101T000000Z_1.json"));

        // rollback slot _2 is taken, so _2 is skipped without leaving its backup behind
        fs::write(dir.path().join("rollback_20240101T000000Z_2.sql"), "keep").unwrap();
        let third = ArtifactPaths::claim(dir.path(), &backups, "20240101T000000Z").unwrap();
        assert_eq!(third.rollback, dir.path().join("rollback_20240101T000000Z_3.sql"));
        assert!(!backups.join("backup_20240101T000000Z_2.json").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("rollback_20240101T000000Z_2.sql")).unwrap(),
            "keep"
        );
    }

    #[test]
    fn test_copy_snapshot_is_verbatim() {
        let dir = TempDir::new().unwrap();
        let snapshot = dir.path().join("snap.json");
        let backup = dir.path().join("backup.json");
        let raw = b"{ \"rows\" :10,\n\"weird\":  [1,2 ] }\r\n";
        fs::write(&snapshot, raw).unwrap();

        copy_snapshot(&snapshot, &backup).unwrap();
        assert_eq!(fs::read(&backup).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_write_json_atomic_and_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latest.json");

        write_json(&path, &serde_json::json!({"a": 1}), true).unwrap();
        write_json(&path, &serde_json::json!({"a": 2}), true).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["a"], 2);

        write_json(&path, &serde_json::json!({"a": 3}), false).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["a"], 3);

        // no stray temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_keeps_readable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;

        let fresh = dir.path().join("latest_run.json");
        write_json(&fresh, &serde_json::json!({"a": 1}), true).unwrap();
        assert_eq!(mode(&fresh), 0o644);

        let existing = dir.path().join("execution_log.json");
        fs::write(&existing, "[]").unwrap();
        fs::set_permissions(&existing, Permissions::from_mode(0o640)).unwrap();
        write_json(&existing, &serde_json::json!([1]), true).unwrap();
        assert_eq!(mode(&existing), 0o640);
    }
}
