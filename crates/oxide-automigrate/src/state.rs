//! Structural replay of operations.
//!
//! [`SchemaState`] applies [`OpDescriptor`]s to an in-memory table map
//! without touching a database. It is used to check that a migration leads
//! from one snapshot to the next and that its down operations lead back.

use crate::error::{MigrateError, Result};
use crate::operations::OpDescriptor;
use crate::schema::{TableSchema, Tables};

/// Table map that operations can be replayed on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaState {
    tables: Tables,
}

impl SchemaState {
    /// Creates an empty schema state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing table map.
    #[must_use]
    pub fn from_tables(tables: Tables) -> Self {
        Self { tables }
    }

    /// Returns the current tables.
    #[must_use]
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Consumes and returns the tables.
    #[must_use]
    pub fn into_tables(self) -> Tables {
        self.tables
    }

    /// Applies operations in order, stopping at the first that does not fit.
    pub fn apply_all<'a>(&mut self, ops: impl IntoIterator<Item = &'a OpDescriptor>) -> Result<()> {
        for op in ops {
            self.apply_operation(op)?;
        }
        Ok(())
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut TableSchema> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| MigrateError::InvalidState(format!("Table '{}' does not exist", table)))
    }

    /// Applies a single operation.
    pub fn apply_operation(&mut self, op: &OpDescriptor) -> Result<()> {
        match op {
            OpDescriptor::CreateTable { table, schema } => {
                if self.tables.contains_key(table) {
                    return Err(MigrateError::InvalidState(format!(
                        "Table '{}' already exists",
                        table
                    )));
                }
                self.tables.insert(table.clone(), schema.clone());
            }

            OpDescriptor::DropTable { table } => {
                if self.tables.remove(table).is_none() {
                    return Err(MigrateError::InvalidState(format!(
                        "Table '{}' does not exist",
                        table
                    )));
                }
            }

            OpDescriptor::AddColumn {
                table,
                column,
                definition,
            } => {
                let t = self.table_mut(table)?;
                if t.columns.contains_key(column) {
                    return Err(MigrateError::InvalidState(format!(
                        "Column '{}' already exists in table '{}'",
                        column, table
                    )));
                }
                t.columns.insert(column.clone(), definition.clone());
            }

            OpDescriptor::RemoveColumn { table, column } => {
                let t = self.table_mut(table)?;
                if t.columns.remove(column).is_none() {
                    return Err(MigrateError::InvalidState(format!(
                        "Column '{}' does not exist in table '{}'",
                        column, table
                    )));
                }
            }

            OpDescriptor::ChangeColumn {
                table,
                column,
                definition,
            } => {
                let t = self.table_mut(table)?;
                let col = t.columns.get_mut(column).ok_or_else(|| {
                    MigrateError::InvalidState(format!(
                        "Column '{}' does not exist in table '{}'",
                        column, table
                    ))
                })?;
                *col = definition.clone();
            }

            OpDescriptor::AddIndex { table, name, index } => {
                let t = self.table_mut(table)?;
                if t.indexes.contains_key(name) {
                    return Err(MigrateError::InvalidState(format!(
                        "Index '{}' already exists in table '{}'",
                        name, table
                    )));
                }
                t.indexes.insert(name.clone(), index.clone());
            }

            OpDescriptor::RemoveIndex { table, name } => {
                let t = self.table_mut(table)?;
                if t.indexes.remove(name).is_none() {
                    return Err(MigrateError::InvalidState(format!(
                        "Index '{}' does not exist in table '{}'",
                        name, table
                    )));
                }
            }

            OpDescriptor::AddForeignKey {
                table,
                name,
                foreign_key,
            } => {
                let t = self.table_mut(table)?;
                if t.foreign_keys.contains_key(name) {
                    return Err(MigrateError::InvalidState(format!(
                        "Foreign key '{}' already exists in table '{}'",
                        name, table
                    )));
                }
                t.foreign_keys.insert(name.clone(), foreign_key.clone());
            }

            OpDescriptor::RemoveForeignKey { table, name } => {
                let t = self.table_mut(table)?;
                if t.foreign_keys.remove(name).is_none() {
                    return Err(MigrateError::InvalidState(format!(
                        "Foreign key '{}' does not exist in table '{}'",
                        name, table
                    )));
                }
            }
        }

        Ok(())
    }
}
