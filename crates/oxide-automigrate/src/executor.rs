//! Migration executor.
//!
//! Applies the operations of a migration artifact through a
//! [`QueryInterface`], strictly one after the other. Execution stops at the
//! first failing operation; nothing is rolled back or retried.

use std::fmt;
use std::future::Future;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{MigrateError, QueryError, Result};
use crate::operations::OpDescriptor;
use crate::schema::ColumnSchema;
use crate::writer::MigrationArtifact;

/// Maps portable column definitions to native column types.
pub trait TypeMapping: Send + Sync {
    /// Returns the native type for `column`.
    fn native_type(&self, column: &ColumnSchema) -> String;
}

/// Performs structural operations against a database.
pub trait QueryInterface: Send + Sync {
    /// Applies `op`, resolving column types through `types`.
    fn apply(
        &self,
        op: &OpDescriptor,
        types: &dyn TypeMapping,
    ) -> impl Future<Output = std::result::Result<(), QueryError>> + Send;
}

/// Which entry point of an artifact is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Forward operations.
    Up,
    /// Inverse operations.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Revision of the migration.
    pub revision: String,
    /// Entry point that was run.
    pub direction: Direction,
    /// Index of the first operation attempted.
    pub start_index: usize,
    /// Number of operations applied during this run.
    pub applied: usize,
    /// Number of operations in the entry point.
    pub total: usize,
}

/// Applies `ops[start_index..]` in order.
///
/// On failure the returned [`MigrateError::OperationFailure`] carries the
/// absolute index of the failing operation and how many operations this run
/// applied before it.
pub async fn apply_ops<Q: QueryInterface>(
    query_interface: &Q,
    types: &dyn TypeMapping,
    revision: &str,
    direction: Direction,
    ops: &[OpDescriptor],
    start_index: usize,
) -> Result<ExecutionReport> {
    info!(
        revision = %revision,
        direction = %direction,
        start_index,
        total = ops.len(),
        "Running migration"
    );

    let mut applied = 0;
    for (index, op) in ops.iter().enumerate().skip(start_index) {
        debug!(revision = %revision, index, operation = %op, "Applying operation");

        if let Err(source) = query_interface.apply(op, types).await {
            warn!(
                revision = %revision,
                index,
                operation = %op,
                error = %source,
                "Operation failed"
            );
            return Err(MigrateError::OperationFailure {
                revision: revision.to_string(),
                index,
                applied,
                operation: op.to_string(),
                source,
            });
        }
        applied += 1;
    }

    info!(
        revision = %revision,
        direction = %direction,
        applied,
        "Migration finished"
    );

    Ok(ExecutionReport {
        revision: revision.to_string(),
        direction,
        start_index,
        applied,
        total: ops.len(),
    })
}

/// Runs migration artifacts against a query interface.
pub struct MigrationExecutor<Q: QueryInterface, T: TypeMapping> {
    query_interface: Q,
    type_mapping: T,
}

impl<Q: QueryInterface, T: TypeMapping> MigrationExecutor<Q, T> {
    /// Creates a new migration executor.
    pub fn new(query_interface: Q, type_mapping: T) -> Self {
        Self {
            query_interface,
            type_mapping,
        }
    }

    /// Returns the query interface.
    #[must_use]
    pub fn query_interface(&self) -> &Q {
        &self.query_interface
    }

    /// Loads the artifact at `path` and applies its `up` operations from
    /// `start_index`.
    pub async fn execute(&self, path: &Path, start_index: usize) -> Result<ExecutionReport> {
        let artifact = MigrationArtifact::load(path)?;
        artifact
            .up(&self.query_interface, &self.type_mapping, start_index)
            .await
    }

    /// Loads the artifact at `path` and applies its `down` operations from
    /// `start_index`.
    pub async fn revert(&self, path: &Path, start_index: usize) -> Result<ExecutionReport> {
        let artifact = MigrationArtifact::load(path)?;
        artifact
            .down(&self.query_interface, &self.type_mapping, start_index)
            .await
    }
}
