//! Snapshot persistence.
//!
//! The migrations directory holds a pointer file with the latest snapshot,
//! one immutable archive per revision and a backup of the previous pointer:
//!
//! ```text
//! migrations/
//!   _current.json
//!   _current.json.20260101093000
//!   _current_bak.json
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::schema::Tables;

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Pointer file holding the latest snapshot.
pub const CURRENT_FILE: &str = "_current.json";

/// Copy of the pointer file taken before it is replaced.
pub const BACKUP_FILE: &str = "_current_bak.json";

const REVISION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Point-in-time structural description of every table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Revision identifier (`YYYYMMDDhhmmss`, UTC).
    pub revision: String,
    /// Snapshot format version.
    pub version: u32,
    /// Tables keyed by name.
    #[serde(default)]
    pub tables: Tables,
}

impl Snapshot {
    /// Creates a snapshot at the current format version.
    #[must_use]
    pub fn new(revision: impl Into<String>, tables: Tables) -> Self {
        Self {
            revision: revision.into(),
            version: SNAPSHOT_VERSION,
            tables,
        }
    }

    /// Snapshot of an empty schema, used before anything was recorded.
    #[must_use]
    pub fn empty() -> Self {
        Self::new("0", Tables::new())
    }
}

/// Reads and writes snapshots in a migrations directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted at `dir`. Nothing is touched until [`save`](Self::save).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the migrations directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the pointer file.
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_FILE)
    }

    /// Path of the backup file.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE)
    }

    /// Path of the archive for `revision`.
    #[must_use]
    pub fn archive_path(&self, revision: &str) -> PathBuf {
        self.dir.join(format!("{CURRENT_FILE}.{revision}"))
    }

    /// Loads the latest snapshot.
    ///
    /// Returns [`MigrateError::NotFound`] when no snapshot was saved yet.
    pub fn load(&self) -> Result<Snapshot> {
        read_snapshot(&self.current_path())
    }

    /// Loads the latest snapshot, or [`Snapshot::empty`] if none exists.
    pub fn load_or_empty(&self) -> Result<Snapshot> {
        match self.load() {
            Ok(snapshot) => Ok(snapshot),
            Err(MigrateError::NotFound(path)) => {
                debug!(path = %path.display(), "No snapshot found, starting from empty schema");
                Ok(Snapshot::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Loads an archived snapshot.
    pub fn load_revision(&self, revision: &str) -> Result<Snapshot> {
        read_snapshot(&self.archive_path(revision))
    }

    /// Archives `snapshot` and makes it the latest one.
    ///
    /// The archive is created first and must not exist. The previous pointer
    /// is copied to the backup file, then replaced through a rename so that
    /// readers never observe a partially written pointer. If any step after
    /// the archive was created fails, the archive is removed again.
    pub fn save(&self, snapshot: &Snapshot) -> Result<String> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(snapshot)?;

        let archive = self.archive_path(&snapshot.revision);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&archive)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    MigrateError::NameCollision(archive.clone())
                } else {
                    MigrateError::Io(e)
                }
            })?;

        if let Err(e) = self.publish(file, &content) {
            discard(&archive);
            return Err(e);
        }

        info!(
            revision = %snapshot.revision,
            tables = snapshot.tables.len(),
            "Saved snapshot"
        );
        Ok(snapshot.revision.clone())
    }

    fn publish(&self, mut archive: File, content: &str) -> Result<()> {
        archive.write_all(content.as_bytes())?;
        archive.sync_all()?;

        let current = self.current_path();
        if current.exists() {
            fs::copy(&current, self.backup_path())?;
        }

        let tmp = self.dir.join(format!("{CURRENT_FILE}.tmp"));
        if let Err(e) = fs::write(&tmp, content.as_bytes()).and_then(|()| fs::rename(&tmp, &current)) {
            discard(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Removes a file left behind by a failed write, logging when that fails too.
pub(crate) fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial file"),
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MigrateError::NotFound(path.to_path_buf())
        } else {
            MigrateError::Io(e)
        }
    })?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(MigrateError::UnsupportedSnapshotVersion {
            found: snapshot.version,
            supported: SNAPSHOT_VERSION,
        });
    }
    Ok(snapshot)
}

/// Returns the revision for a snapshot taken at `now`.
///
/// Revisions are strictly increasing: when `now` formats to a value that does
/// not sort after `previous`, the result is `previous` plus one second.
#[must_use]
pub fn next_revision(previous: &str, now: DateTime<Utc>) -> String {
    let candidate = now.format(REVISION_FORMAT).to_string();
    if candidate.as_str() > previous {
        return candidate;
    }
    match NaiveDateTime::parse_from_str(previous, REVISION_FORMAT) {
        Ok(prev) => (prev + Duration::seconds(1))
            .format(REVISION_FORMAT)
            .to_string(),
        Err(_) => candidate,
    }
}
