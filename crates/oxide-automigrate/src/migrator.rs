//! One generation cycle: load the recorded snapshot, reflect the model,
//! diff, sort, generate, then persist the migration and the new snapshot.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::codegen::{Migration, MigrationCodeGenerator};
use crate::diff::DiffEngine;
use crate::error::Result;
use crate::reflect::SchemaReflector;
use crate::snapshot::{discard, next_revision, Snapshot, SnapshotStore};
use crate::sorter::ActionSorter;
use crate::writer::{MigrationWriter, WrittenMigration, DEFAULT_NAME};

/// Options of a generation cycle.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Migration name, normalized before use.
    pub name: String,
    /// Comment stored in the artifact.
    pub comment: String,
    /// Only compute and report the migration, write nothing.
    pub preview: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            comment: String::new(),
            preview: false,
        }
    }
}

/// What a generation cycle produced.
#[derive(Debug)]
pub enum GenerationOutcome {
    /// The model matches the recorded snapshot.
    NoChanges,
    /// Preview requested; nothing was written.
    Preview(Migration),
    /// The migration and the new snapshot were written.
    Written {
        /// The generated migration.
        migration: Migration,
        /// Where the artifact went.
        written: WrittenMigration,
    },
}

/// Runs generation cycles against one migrations directory.
pub struct Migrator<R: SchemaReflector> {
    store: SnapshotStore,
    writer: MigrationWriter,
    reflector: R,
}

impl<R: SchemaReflector> Migrator<R> {
    /// Creates a migrator storing snapshots and artifacts in `store`'s directory.
    pub fn new(store: SnapshotStore, reflector: R) -> Self {
        let writer = MigrationWriter::new(store.dir());
        Self {
            store,
            writer,
            reflector,
        }
    }

    /// Returns the snapshot store.
    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Runs one cycle at time `now`.
    ///
    /// The artifact is written before the snapshot pointer moves. When saving
    /// the snapshot fails the artifact is removed again, so the recorded state
    /// and the migrations directory stay in step and the cycle can be rerun.
    pub fn generate(&self, options: &GenerateOptions, now: DateTime<Utc>) -> Result<GenerationOutcome> {
        let previous = self.store.load_or_empty()?;
        let engine = DiffEngine::new();
        let tables = engine.reconcile(&previous.tables, &self.reflector.reflect()?);

        let actions = engine.diff(&previous.tables, &tables);
        if actions.is_empty() {
            info!(revision = %previous.revision, "No changes found");
            return Ok(GenerationOutcome::NoChanges);
        }

        let sorted = ActionSorter::new().sort(actions);
        let revision = next_revision(&previous.revision, now);
        let migration = MigrationCodeGenerator::new().generate(revision.clone(), sorted);

        for line in &migration.log_lines {
            info!(revision = %revision, "{}", line);
        }

        if options.preview {
            return Ok(GenerationOutcome::Preview(migration));
        }

        let written = self
            .writer
            .write(&migration, &options.name, &options.comment)?;
        if let Err(e) = self.store.save(&Snapshot::new(revision, tables)) {
            warn!(
                path = %written.path.display(),
                error = %e,
                "Saving the snapshot failed, removing the migration"
            );
            discard(&written.path);
            return Err(e);
        }

        Ok(GenerationOutcome::Written { migration, written })
    }
}
