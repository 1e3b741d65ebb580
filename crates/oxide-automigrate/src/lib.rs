//! Snapshot-diff migration generator.
//!
//! `oxide-automigrate` records the structure of a data model as JSON
//! snapshots and turns the difference between two snapshots into a
//! reversible migration:
//!
//! - **Snapshot** - Point-in-time description of every table, stored in the
//!   migrations directory with an archive per revision
//! - **Diff** - Unordered set of atomic actions (add/remove table, column,
//!   index, foreign key; change column)
//! - **Sorter** - Orders actions so prerequisites always run first
//! - **Codegen** - One forward and one inverse operation per action, plus a
//!   log line
//! - **Writer** - Persists the migration as a JSON artifact with `up` and
//!   `down` entry points
//! - **Executor** - Applies an artifact through a [`QueryInterface`](executor::QueryInterface),
//!   one operation at a time
//!
//! # Example
//!
//! ```rust
//! use oxide_automigrate::prelude::*;
//!
//! let mut old = Tables::new();
//! old.insert(
//!     "users".to_string(),
//!     TableSchema::new().column("id", ColumnSchema::new(TypeTag::Integer).primary_key()),
//! );
//! let mut new = old.clone();
//! new.insert(
//!     "users".to_string(),
//!     old["users"].clone().column("email", ColumnSchema::new(TypeTag::String)),
//! );
//!
//! let actions = ActionSorter::new().sort(DiffEngine::new().diff(&old, &new));
//! let migration = MigrationCodeGenerator::new().generate("20260101000000", actions);
//! assert_eq!(migration.log_lines, vec!["Add column 'email' to table 'users'"]);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show what would change
//! oxide-automigrate make --preview
//!
//! # Write a migration and the new snapshot, then apply it
//! oxide-automigrate make --name add_email --execute
//!
//! # Apply or revert an existing migration, resuming at operation 3
//! oxide-automigrate run migrations/20260101000000-add_email.json --from 3
//! oxide-automigrate revert migrations/20260101000000-add_email.json
//! ```

pub mod action;
pub mod codegen;
pub mod config;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod migrator;
pub mod operations;
pub mod reflect;
pub mod schema;
pub mod snapshot;
pub mod sorter;
pub mod state;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::codegen::{Migration, MigrationCodeGenerator};
    pub use crate::dialect::{SqliteQueryInterface, SqliteTypeMapping};
    pub use crate::diff::DiffEngine;
    pub use crate::error::{MigrateError, QueryError, Result};
    pub use crate::executor::{ExecutionReport, MigrationExecutor, QueryInterface, TypeMapping};
    pub use crate::migrator::{GenerateOptions, GenerationOutcome, Migrator};
    pub use crate::operations::OpDescriptor;
    pub use crate::reflect::{JsonModelReflector, SchemaReflector, StaticReflector};
    pub use crate::schema::{
        ColumnSchema, ForeignKeySchema, IndexSchema, ReferentialAction, TableSchema, Tables,
        TypeTag,
    };
    pub use crate::snapshot::{Snapshot, SnapshotStore};
    pub use crate::sorter::ActionSorter;
    pub use crate::state::SchemaState;
    pub use crate::writer::{MigrationArtifact, MigrationWriter, WrittenMigration};
}
