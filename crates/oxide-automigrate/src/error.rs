//! Error types for the migration generator.

use std::path::PathBuf;

/// Errors that can occur while generating, writing or applying migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// No snapshot has been recorded yet.
    #[error("Snapshot not found: {0}")]
    NotFound(PathBuf),

    /// Reflection produced a type tag outside the supported set.
    #[error("Unsupported type '{type_tag}' for column '{column}' in table '{table}'")]
    UnsupportedType {
        /// Table containing the column.
        table: String,
        /// Column with the unsupported type.
        column: String,
        /// The offending type tag.
        type_tag: String,
    },

    /// A migration or archived snapshot already exists at the target path.
    #[error("File already exists: {0}")]
    NameCollision(PathBuf),

    /// An operation failed while applying a migration.
    #[error(
        "Migration {revision} failed at operation {index} ({operation}) \
         after {applied} applied operation(s): {source}"
    )]
    OperationFailure {
        /// Revision of the migration being applied.
        revision: String,
        /// Zero-based index of the failing operation.
        index: usize,
        /// Number of operations applied during this run before the failure.
        applied: usize,
        /// Description of the failing operation.
        operation: String,
        /// The collaborator error.
        #[source]
        source: QueryError,
    },

    /// The snapshot was written by a newer format.
    #[error("Snapshot version {found} is newer than supported version {supported}")]
    UnsupportedSnapshotVersion {
        /// Version found in the file.
        found: u32,
        /// Highest supported version.
        supported: u32,
    },

    /// The migration name is empty after normalization.
    #[error("Invalid migration name: '{0}'")]
    InvalidName(String),

    /// An operation does not fit the schema it is replayed on.
    #[error("Invalid schema state: {0}")]
    InvalidState(String),

    /// Configuration file could not be parsed.
    #[error("Invalid configuration in '{path}': {message}")]
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// IO error (reading/writing snapshots and migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reported by a [`QueryInterface`](crate::executor::QueryInterface).
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Database error while executing a statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend cannot perform this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Any other failure reported by the backend.
    #[error("{0}")]
    Failed(String),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
