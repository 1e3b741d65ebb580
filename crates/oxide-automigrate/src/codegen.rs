//! Migration generation from sorted actions.

use crate::action::Action;
use crate::error::Result;
use crate::operations::OpDescriptor;
use crate::schema::ColumnSchema;

/// Reversible operations derived from one diff.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    /// Revision the migration leads to.
    pub revision: String,
    /// Actions in execution order.
    pub actions: Vec<Action>,
    /// One operation per action, in execution order.
    pub forward_ops: Vec<OpDescriptor>,
    /// `inverse_ops[i]` undoes `forward_ops[i]`.
    pub inverse_ops: Vec<OpDescriptor>,
    /// Human-readable description of each action.
    pub log_lines: Vec<String>,
}

impl Migration {
    /// Returns true when there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward_ops.is_empty()
    }

    /// Returns the operations that undo this migration, in execution order.
    #[must_use]
    pub fn down_ops(&self) -> Vec<OpDescriptor> {
        self.inverse_ops.iter().rev().cloned().collect()
    }

    /// Renders the forward operations as pretty-printed JSON.
    pub fn preview(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.forward_ops)?)
    }
}

/// Converts sorted actions into a [`Migration`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MigrationCodeGenerator;

impl MigrationCodeGenerator {
    /// Creates a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the migration for `actions`, which must already be sorted.
    #[must_use]
    pub fn generate(&self, revision: impl Into<String>, actions: Vec<Action>) -> Migration {
        let forward_ops = actions.iter().map(OpDescriptor::forward).collect();
        let inverse_ops = actions.iter().map(OpDescriptor::inverse).collect();
        let log_lines = actions.iter().map(describe).collect();
        Migration {
            revision: revision.into(),
            actions,
            forward_ops,
            inverse_ops,
            log_lines,
        }
    }
}

/// Returns the log line for `action`.
#[must_use]
pub fn describe(action: &Action) -> String {
    match action {
        Action::AddTable { table, .. } => format!("Create table '{table}'"),
        Action::RemoveTable { table, .. } => format!("Drop table '{table}'"),
        Action::AddColumn { table, column, .. } => {
            format!("Add column '{column}' to table '{table}'")
        }
        Action::RemoveColumn { table, column, .. } => {
            format!("Remove column '{column}' from table '{table}'")
        }
        Action::ChangeColumn {
            table,
            column,
            old,
            new,
        } => format!(
            "Change column '{column}' in table '{table}' ({})",
            column_changes(old, new)
        ),
        Action::AddIndex { table, name, index } => format!(
            "Add {}index '{name}' to table '{table}' ({})",
            if index.unique { "unique " } else { "" },
            index.fields.join(", ")
        ),
        Action::RemoveIndex { table, name, .. } => {
            format!("Remove index '{name}' from table '{table}'")
        }
        Action::AddForeignKey {
            table,
            name,
            foreign_key,
        } => format!(
            "Add foreign key '{name}' to table '{table}' (references '{}')",
            foreign_key.references_table
        ),
        Action::RemoveForeignKey { table, name, .. } => {
            format!("Remove foreign key '{name}' from table '{table}'")
        }
    }
}

fn column_changes(old: &ColumnSchema, new: &ColumnSchema) -> String {
    let mut parts = Vec::new();
    let type_changed = old.type_tag != new.type_tag;
    if type_changed {
        parts.push(format!("type {} -> {}", old.type_tag, new.type_tag));
    }
    if old.allow_null != new.allow_null {
        parts.push(format!("allowNull {} -> {}", old.allow_null, new.allow_null));
    }
    if old.default_value != new.default_value {
        parts.push("defaultValue".to_string());
    }
    if old.primary_key != new.primary_key {
        parts.push(format!("primaryKey {} -> {}", old.primary_key, new.primary_key));
    }
    if old.auto_increment != new.auto_increment {
        parts.push(format!(
            "autoIncrement {} -> {}",
            old.auto_increment, new.auto_increment
        ));
    }
    if type_changed {
        parts.push("review for data loss".to_string());
    }
    parts.join(", ")
}
