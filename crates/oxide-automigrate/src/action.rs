//! Atomic schema-change actions.

use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, TableSchema};

/// One atomic structural change between two snapshots.
///
/// Removal and change variants carry the previous definitions so that every
/// action can be inverted without consulting the old snapshot again.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Create a table with all its columns, indexes and foreign keys.
    AddTable {
        /// Table name.
        table: String,
        /// Full definition of the new table.
        schema: TableSchema,
    },
    /// Drop a table.
    RemoveTable {
        /// Table name.
        table: String,
        /// Definition of the dropped table.
        schema: TableSchema,
    },
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Column definition.
        schema: ColumnSchema,
    },
    /// Remove a column from an existing table.
    RemoveColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Definition of the removed column.
        schema: ColumnSchema,
    },
    /// Change the attributes of a column.
    ChangeColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Definition before the change.
        old: ColumnSchema,
        /// Definition after the change.
        new: ColumnSchema,
    },
    /// Add an index.
    AddIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Index definition.
        index: IndexSchema,
    },
    /// Remove an index.
    RemoveIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Definition of the removed index.
        index: IndexSchema,
    },
    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Constraint definition.
        foreign_key: ForeignKeySchema,
    },
    /// Remove a foreign key constraint.
    RemoveForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Definition of the removed constraint.
        foreign_key: ForeignKeySchema,
    },
}

/// Ordering phase of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Tables, columns, indexes and foreign keys being added.
    Creation,
    /// Columns being changed in place.
    Modification,
    /// Anything being removed.
    Removal,
}

impl Action {
    /// Returns the table the action applies to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::AddTable { table, .. }
            | Self::RemoveTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::RemoveColumn { table, .. }
            | Self::ChangeColumn { table, .. }
            | Self::AddIndex { table, .. }
            | Self::RemoveIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::RemoveForeignKey { table, .. } => table,
        }
    }

    /// Returns the name of the column, index or constraint, or `""` for
    /// table-level actions.
    #[must_use]
    pub fn object_name(&self) -> &str {
        match self {
            Self::AddTable { .. } | Self::RemoveTable { .. } => "",
            Self::AddColumn { column, .. }
            | Self::RemoveColumn { column, .. }
            | Self::ChangeColumn { column, .. } => column,
            Self::AddIndex { name, .. }
            | Self::RemoveIndex { name, .. }
            | Self::AddForeignKey { name, .. }
            | Self::RemoveForeignKey { name, .. } => name,
        }
    }

    /// Returns the ordering phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::AddTable { .. }
            | Self::AddColumn { .. }
            | Self::AddIndex { .. }
            | Self::AddForeignKey { .. } => Phase::Creation,
            Self::ChangeColumn { .. } => Phase::Modification,
            Self::RemoveTable { .. }
            | Self::RemoveColumn { .. }
            | Self::RemoveIndex { .. }
            | Self::RemoveForeignKey { .. } => Phase::Removal,
        }
    }

    /// Rank of the action kind within its phase.
    ///
    /// Creation goes table, column, index, foreign key; removal goes the
    /// other way round.
    #[must_use]
    pub fn kind_rank(&self) -> u8 {
        match self {
            Self::AddTable { .. }
            | Self::ChangeColumn { .. }
            | Self::RemoveForeignKey { .. } => 0,
            Self::AddColumn { .. } | Self::RemoveIndex { .. } => 1,
            Self::AddIndex { .. } | Self::RemoveColumn { .. } => 2,
            Self::AddForeignKey { .. } | Self::RemoveTable { .. } => 3,
        }
    }

    /// Foreign keys this action creates.
    #[must_use]
    pub fn added_foreign_keys(&self) -> Vec<&ForeignKeySchema> {
        match self {
            Self::AddTable { schema, .. } => schema.foreign_keys.values().collect(),
            Self::AddForeignKey { foreign_key, .. } => vec![foreign_key],
            _ => Vec::new(),
        }
    }

    /// Foreign keys this action drops.
    #[must_use]
    pub fn removed_foreign_keys(&self) -> Vec<&ForeignKeySchema> {
        match self {
            Self::RemoveTable { schema, .. } => schema.foreign_keys.values().collect(),
            Self::RemoveForeignKey { foreign_key, .. } => vec![foreign_key],
            _ => Vec::new(),
        }
    }

    /// Short label such as `addColumn users.email`.
    #[must_use]
    pub fn label(&self) -> String {
        let kind = match self {
            Self::AddTable { .. } => "addTable",
            Self::RemoveTable { .. } => "removeTable",
            Self::AddColumn { .. } => "addColumn",
            Self::RemoveColumn { .. } => "removeColumn",
            Self::ChangeColumn { .. } => "changeColumn",
            Self::AddIndex { .. } => "addIndex",
            Self::RemoveIndex { .. } => "removeIndex",
            Self::AddForeignKey { .. } => "addForeignKey",
            Self::RemoveForeignKey { .. } => "removeForeignKey",
        };
        let object = self.object_name();
        if object.is_empty() {
            format!("{kind} {}", self.table())
        } else {
            format!("{kind} {}.{object}", self.table())
        }
    }
}
