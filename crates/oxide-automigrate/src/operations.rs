//! Engine-agnostic operation descriptors.
//!
//! An [`OpDescriptor`] names one structural operation and carries every
//! parameter a [`QueryInterface`](crate::executor::QueryInterface) needs to
//! perform it. Descriptors are what migration artifacts store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, TableSchema};

/// A single structural operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "camelCase")]
pub enum OpDescriptor {
    /// Create a table, including its indexes and foreign keys.
    CreateTable {
        /// Table name.
        table: String,
        /// Table definition.
        schema: TableSchema,
    },
    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
    },
    /// Add a column.
    AddColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Column definition.
        definition: ColumnSchema,
    },
    /// Remove a column.
    RemoveColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Replace a column definition.
    ChangeColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Definition after the change.
        definition: ColumnSchema,
    },
    /// Create an index.
    AddIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Index definition.
        index: IndexSchema,
    },
    /// Drop an index.
    RemoveIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },
    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Constraint definition.
        #[serde(rename = "foreignKey")]
        foreign_key: ForeignKeySchema,
    },
    /// Drop a foreign key constraint.
    RemoveForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
}

impl OpDescriptor {
    /// Returns the operation that performs `action`.
    #[must_use]
    pub fn forward(action: &Action) -> Self {
        match action.clone() {
            Action::AddTable { table, schema } => Self::CreateTable { table, schema },
            Action::RemoveTable { table, .. } => Self::DropTable { table },
            Action::AddColumn {
                table,
                column,
                schema,
            } => Self::AddColumn {
                table,
                column,
                definition: schema,
            },
            Action::RemoveColumn { table, column, .. } => Self::RemoveColumn { table, column },
            Action::ChangeColumn {
                table, column, new, ..
            } => Self::ChangeColumn {
                table,
                column,
                definition: new,
            },
            Action::AddIndex { table, name, index } => Self::AddIndex { table, name, index },
            Action::RemoveIndex { table, name, .. } => Self::RemoveIndex { table, name },
            Action::AddForeignKey {
                table,
                name,
                foreign_key,
            } => Self::AddForeignKey {
                table,
                name,
                foreign_key,
            },
            Action::RemoveForeignKey { table, name, .. } => Self::RemoveForeignKey { table, name },
        }
    }

    /// Returns the operation that undoes `action`.
    #[must_use]
    pub fn inverse(action: &Action) -> Self {
        match action.clone() {
            Action::AddTable { table, .. } => Self::DropTable { table },
            Action::RemoveTable { table, schema } => Self::CreateTable { table, schema },
            Action::AddColumn { table, column, .. } => Self::RemoveColumn { table, column },
            Action::RemoveColumn {
                table,
                column,
                schema,
            } => Self::AddColumn {
                table,
                column,
                definition: schema,
            },
            Action::ChangeColumn {
                table, column, old, ..
            } => Self::ChangeColumn {
                table,
                column,
                definition: old,
            },
            Action::AddIndex { table, name, .. } => Self::RemoveIndex { table, name },
            Action::RemoveIndex { table, name, index } => Self::AddIndex { table, name, index },
            Action::AddForeignKey { table, name, .. } => Self::RemoveForeignKey { table, name },
            Action::RemoveForeignKey {
                table,
                name,
                foreign_key,
            } => Self::AddForeignKey {
                table,
                name,
                foreign_key,
            },
        }
    }

    /// Returns the verb as written in artifacts.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "createTable",
            Self::DropTable { .. } => "dropTable",
            Self::AddColumn { .. } => "addColumn",
            Self::RemoveColumn { .. } => "removeColumn",
            Self::ChangeColumn { .. } => "changeColumn",
            Self::AddIndex { .. } => "addIndex",
            Self::RemoveIndex { .. } => "removeIndex",
            Self::AddForeignKey { .. } => "addForeignKey",
            Self::RemoveForeignKey { .. } => "removeForeignKey",
        }
    }

    /// Returns the table the operation targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table }
            | Self::AddColumn { table, .. }
            | Self::RemoveColumn { table, .. }
            | Self::ChangeColumn { table, .. }
            | Self::AddIndex { table, .. }
            | Self::RemoveIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::RemoveForeignKey { table, .. } => table,
        }
    }
}

impl fmt::Display for OpDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table, .. } | Self::DropTable { table } => {
                write!(f, "{} {table}", self.verb())
            }
            Self::AddColumn { table, column, .. }
            | Self::RemoveColumn { table, column }
            | Self::ChangeColumn { table, column, .. } => {
                write!(f, "{} {table}.{column}", self.verb())
            }
            Self::AddIndex { table, name, .. }
            | Self::RemoveIndex { table, name }
            | Self::AddForeignKey { table, name, .. }
            | Self::RemoveForeignKey { table, name } => {
                write!(f, "{} {table}.{name}", self.verb())
            }
        }
    }
}
