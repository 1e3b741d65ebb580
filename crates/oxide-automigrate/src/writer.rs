//! Migration artifact writer.
//!
//! A migration is persisted as `<revision>-<name>.json` holding its metadata,
//! the log lines describing it and the two operation lists:
//!
//! ```json
//! {
//!   "info": { "revision": "...", "name": "...", "created": "...", "comment": "..." },
//!   "summary": ["Create table 'users'"],
//!   "up": [{ "verb": "createTable", ... }],
//!   "down": [{ "verb": "dropTable", ... }]
//! }
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codegen::Migration;
use crate::error::{MigrateError, Result};
use crate::executor::{apply_ops, Direction, ExecutionReport, QueryInterface, TypeMapping};
use crate::operations::OpDescriptor;

/// Name used when none is given.
pub const DEFAULT_NAME: &str = "noname";

/// Metadata block of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationInfo {
    /// Revision the migration leads to.
    pub revision: String,
    /// Normalized migration name.
    pub name: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
}

/// A migration as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationArtifact {
    /// Metadata.
    pub info: MigrationInfo,
    /// Log lines, one per action.
    #[serde(default)]
    pub summary: Vec<String>,
    /// Forward operations in execution order.
    pub up: Vec<OpDescriptor>,
    /// Inverse operations in execution order.
    pub down: Vec<OpDescriptor>,
}

impl MigrationArtifact {
    /// Builds the artifact for `migration`.
    #[must_use]
    pub fn from_migration(
        migration: &Migration,
        name: impl Into<String>,
        comment: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            info: MigrationInfo {
                revision: migration.revision.clone(),
                name: name.into(),
                created,
                comment: comment.into(),
            },
            summary: migration.log_lines.clone(),
            up: migration.forward_ops.clone(),
            down: migration.down_ops(),
        }
    }

    /// Reads an artifact from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MigrateError::NotFound(path.to_path_buf())
            } else {
                MigrateError::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Applies the forward operations from `start_index`.
    pub async fn up<Q: QueryInterface>(
        &self,
        query_interface: &Q,
        types: &dyn TypeMapping,
        start_index: usize,
    ) -> Result<ExecutionReport> {
        apply_ops(
            query_interface,
            types,
            &self.info.revision,
            Direction::Up,
            &self.up,
            start_index,
        )
        .await
    }

    /// Applies the inverse operations from `start_index`.
    pub async fn down<Q: QueryInterface>(
        &self,
        query_interface: &Q,
        types: &dyn TypeMapping,
        start_index: usize,
    ) -> Result<ExecutionReport> {
        apply_ops(
            query_interface,
            types,
            &self.info.revision,
            Direction::Down,
            &self.down,
            start_index,
        )
        .await
    }
}

/// Location of a written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenMigration {
    /// File name inside the migrations directory.
    pub filename: String,
    /// Full path.
    pub path: PathBuf,
}

/// Writes migration artifacts into a directory.
#[derive(Debug, Clone)]
pub struct MigrationWriter {
    dir: PathBuf,
}

impl MigrationWriter {
    /// Creates a writer for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the file name for a migration.
    pub fn filename(revision: &str, name: &str) -> Result<String> {
        Ok(format!("{revision}-{}.json", normalize_name(name)?))
    }

    /// Writes `migration` as a new file and returns where it went.
    ///
    /// The file must not exist yet.
    pub fn write(&self, migration: &Migration, name: &str, comment: &str) -> Result<WrittenMigration> {
        let normalized = normalize_name(name)?;
        let filename = format!("{}-{normalized}.json", migration.revision);
        let artifact = MigrationArtifact::from_migration(migration, normalized, comment, Utc::now());
        let content = serde_json::to_string_pretty(&artifact)?;

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&filename);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    MigrateError::NameCollision(path.clone())
                } else {
                    MigrateError::Io(e)
                }
            })?;
        file.write_all(content.as_bytes())?;
        file.write_all(b"\n")?;

        info!(
            revision = %migration.revision,
            path = %path.display(),
            operations = migration.forward_ops.len(),
            "Wrote migration"
        );
        Ok(WrittenMigration { filename, path })
    }
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
///
/// Fails when the name is empty or only made of whitespace.
pub fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MigrateError::InvalidName(name.to_string()));
    }
    Ok(trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect())
}
