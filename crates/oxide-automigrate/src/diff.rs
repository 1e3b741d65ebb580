//! Snapshot diffing.
//!
//! Compares a recorded table map against the reflected one and emits the
//! unordered set of [`Action`]s that turn the first into the second. The
//! output is deterministic because every schema map is ordered; use
//! [`ActionSorter`](crate::sorter::ActionSorter) to obtain an executable order.

use std::collections::{BTreeMap, BTreeSet};

use crate::action::Action;
use crate::schema::{ForeignKeySchema, IndexSchema, TableSchema, Tables};

/// Computes the actions between two table maps.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the actions needed to transform `old` into `new`.
    #[must_use]
    pub fn diff(&self, old: &Tables, new: &Tables) -> Vec<Action> {
        let mut actions = Vec::new();

        for (name, schema) in new {
            if !old.contains_key(name) {
                actions.push(Action::AddTable {
                    table: name.clone(),
                    schema: schema.clone(),
                });
            }
        }

        for (name, schema) in old {
            if !new.contains_key(name) {
                actions.push(Action::RemoveTable {
                    table: name.clone(),
                    schema: schema.clone(),
                });
            }
        }

        for (name, old_table) in old {
            if let Some(new_table) = new.get(name) {
                diff_table(name, old_table, new_table, &mut actions);
            }
        }

        actions
    }

    /// Returns `new` with renamed indexes and foreign keys stored under the
    /// names recorded in `old`.
    ///
    /// A rename alone emits no action, so the object keeps its recorded name
    /// in the database; the snapshot saved after a cycle has to keep it too.
    #[must_use]
    pub fn reconcile(&self, old: &Tables, new: &Tables) -> Tables {
        new.iter()
            .map(|(name, table)| {
                let mut table = table.clone();
                if let Some(recorded) = old.get(name) {
                    table.indexes = keep_recorded_names(&recorded.indexes, &table.indexes);
                    table.foreign_keys =
                        keep_recorded_names(&recorded.foreign_keys, &table.foreign_keys);
                }
                (name.clone(), table)
            })
            .collect()
    }
}

// ================================================================
// Per-table diffing
// ================================================================

fn diff_table(table: &str, old: &TableSchema, new: &TableSchema, actions: &mut Vec<Action>) {
    for (column, schema) in &new.columns {
        match old.columns.get(column) {
            None => actions.push(Action::AddColumn {
                table: table.to_string(),
                column: column.clone(),
                schema: schema.clone(),
            }),
            Some(previous) if previous != schema => actions.push(Action::ChangeColumn {
                table: table.to_string(),
                column: column.clone(),
                old: previous.clone(),
                new: schema.clone(),
            }),
            Some(_) => {}
        }
    }

    for (column, schema) in &old.columns {
        if !new.columns.contains_key(column) {
            actions.push(Action::RemoveColumn {
                table: table.to_string(),
                column: column.clone(),
                schema: schema.clone(),
            });
        }
    }

    diff_indexes(table, &old.indexes, &new.indexes, actions);
    diff_foreign_keys(table, &old.foreign_keys, &new.foreign_keys, actions);
}

/// Pairs entries of `new` with the recorded entries of `old` that describe
/// the same object, returning `new name -> recorded name`.
///
/// An entry keeping both its name and definition is paired with itself
/// first; the remaining ones pair by definition in name order. A recorded
/// name stays in use while its object is paired, so an unpaired new entry
/// carrying that name breaks the pairing and both sides are treated as
/// removed and added.
fn pair_by_identity<'a, T: PartialEq>(
    old: &'a BTreeMap<String, T>,
    new: &'a BTreeMap<String, T>,
) -> BTreeMap<&'a str, &'a str> {
    let mut pairs: BTreeMap<&str, &str> = BTreeMap::new();
    let mut taken: BTreeSet<&str> = BTreeSet::new();

    for (name, item) in new {
        if old.get(name) == Some(item) {
            pairs.insert(name.as_str(), name.as_str());
            taken.insert(name.as_str());
        }
    }
    for (name, item) in new {
        if pairs.contains_key(name.as_str()) {
            continue;
        }
        let recorded = old
            .iter()
            .find(|&(o, v)| v == item && !taken.contains(o.as_str()));
        if let Some((recorded, _)) = recorded {
            pairs.insert(name.as_str(), recorded.as_str());
            taken.insert(recorded.as_str());
        }
    }

    loop {
        let clash = new
            .keys()
            .filter(|name| !pairs.contains_key(name.as_str()))
            .find_map(|name| {
                pairs
                    .iter()
                    .find(|&(_, &recorded)| recorded == name.as_str())
                    .map(|(&paired, _)| paired)
            });
        match clash {
            Some(paired) => {
                pairs.remove(paired);
            }
            None => break pairs,
        }
    }
}

/// Returns `new` with every paired entry stored under its recorded name.
fn keep_recorded_names<T: PartialEq + Clone>(
    old: &BTreeMap<String, T>,
    new: &BTreeMap<String, T>,
) -> BTreeMap<String, T> {
    let pairs = pair_by_identity(old, new);
    new.iter()
        .map(|(name, item)| {
            let recorded = pairs.get(name.as_str()).copied().unwrap_or(name.as_str());
            (recorded.to_string(), item.clone())
        })
        .collect()
}

/// Indexes are matched by what they cover, not by name: a renamed index
/// with the same fields and uniqueness is the same index.
fn diff_indexes(
    table: &str,
    old: &BTreeMap<String, IndexSchema>,
    new: &BTreeMap<String, IndexSchema>,
    actions: &mut Vec<Action>,
) {
    let pairs = pair_by_identity(old, new);
    let kept: BTreeSet<&str> = pairs.values().copied().collect();

    for (name, index) in old {
        if !kept.contains(name.as_str()) {
            actions.push(Action::RemoveIndex {
                table: table.to_string(),
                name: name.clone(),
                index: index.clone(),
            });
        }
    }
    for (name, index) in new {
        if !pairs.contains_key(name.as_str()) {
            actions.push(Action::AddIndex {
                table: table.to_string(),
                name: name.clone(),
                index: index.clone(),
            });
        }
    }
}

/// Foreign keys are matched on columns, target and referential actions.
fn diff_foreign_keys(
    table: &str,
    old: &BTreeMap<String, ForeignKeySchema>,
    new: &BTreeMap<String, ForeignKeySchema>,
    actions: &mut Vec<Action>,
) {
    let pairs = pair_by_identity(old, new);
    let kept: BTreeSet<&str> = pairs.values().copied().collect();

    for (name, fk) in old {
        if !kept.contains(name.as_str()) {
            actions.push(Action::RemoveForeignKey {
                table: table.to_string(),
                name: name.clone(),
                foreign_key: fk.clone(),
            });
        }
    }
    for (name, fk) in new {
        if !pairs.contains_key(name.as_str()) {
            actions.push(Action::AddForeignKey {
                table: table.to_string(),
                name: name.clone(),
                foreign_key: fk.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ReferentialAction, TypeTag};

    fn users() -> TableSchema {
        TableSchema::new()
            .column("id", ColumnSchema::new(TypeTag::Integer).primary_key())
            .column("name", ColumnSchema::new(TypeTag::String))
            .index("users_name", IndexSchema::new(["name"]))
    }

    fn tables(entries: Vec<(&str, TableSchema)>) -> Tables {
        entries
            .into_iter()
            .map(|(name, schema)| (name.to_string(), schema))
            .collect()
    }

    #[test]
    fn test_identical_is_empty() {
        let schema = tables(vec![("users", users())]);
        assert!(DiffEngine::new().diff(&schema, &schema).is_empty());
    }

    #[test]
    fn test_new_table_is_single_action() {
        let new = tables(vec![("users", users())]);
        let actions = DiffEngine::new().diff(&Tables::new(), &new);
        assert_eq!(
            actions,
            vec![Action::AddTable {
                table: "users".to_string(),
                schema: users(),
            }]
        );
    }

    #[test]
    fn test_removed_table_carries_schema() {
        let old = tables(vec![("users", users())]);
        let actions = DiffEngine::new().diff(&old, &Tables::new());
        assert_eq!(
            actions,
            vec![Action::RemoveTable {
                table: "users".to_string(),
                schema: users(),
            }]
        );
    }

    #[test]
    fn test_column_changes() {
        let old = tables(vec![(
            "users",
            users().column("age", ColumnSchema::new(TypeTag::Integer)),
        )]);
        let new = tables(vec![(
            "users",
            TableSchema::new()
                .column("id", ColumnSchema::new(TypeTag::Integer).primary_key())
                .column("age", ColumnSchema::new(TypeTag::String))
                .column("email", ColumnSchema::new(TypeTag::String).not_null())
                .index("users_name", IndexSchema::new(["name"])),
        )]);

        let actions = DiffEngine::new().diff(&old, &new);
        assert_eq!(actions.len(), 3);
        assert!(actions.contains(&Action::ChangeColumn {
            table: "users".to_string(),
            column: "age".to_string(),
            old: ColumnSchema::new(TypeTag::Integer),
            new: ColumnSchema::new(TypeTag::String),
        }));
        assert!(actions.contains(&Action::AddColumn {
            table: "users".to_string(),
            column: "email".to_string(),
            schema: ColumnSchema::new(TypeTag::String).not_null(),
        }));
        assert!(actions.contains(&Action::RemoveColumn {
            table: "users".to_string(),
            column: "name".to_string(),
            schema: ColumnSchema::new(TypeTag::String),
        }));
    }

    #[test]
    fn test_default_value_change_detected() {
        let old = tables(vec![(
            "users",
            users().column("active", ColumnSchema::new(TypeTag::Boolean).default_value(true)),
        )]);
        let new = tables(vec![(
            "users",
            users().column("active", ColumnSchema::new(TypeTag::Boolean).default_value(false)),
        )]);

        let actions = DiffEngine::new().diff(&old, &new);
        assert!(matches!(&actions[..], [Action::ChangeColumn { column, .. }] if column == "active"));
    }

    #[test]
    fn test_index_rename_is_not_a_change() {
        let old = tables(vec![("users", users())]);
        let mut renamed = users();
        let index = renamed.indexes.remove("users_name").unwrap();
        renamed.indexes.insert("idx_users_name".to_string(), index);
        let new = tables(vec![("users", renamed)]);

        assert!(DiffEngine::new().diff(&old, &new).is_empty());
    }

    #[test]
    fn test_index_uniqueness_change() {
        let old = tables(vec![("users", users())]);
        let new = tables(vec![(
            "users",
            users().index("users_name", IndexSchema::new(["name"]).unique()),
        )]);

        let actions = DiffEngine::new().diff(&old, &new);
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], Action::RemoveIndex { name, .. } if name == "users_name"));
        assert!(matches!(&actions[1], Action::AddIndex { index, .. } if index.unique));
    }

    #[test]
    fn test_foreign_key_action_change() {
        let posts = |on_delete| {
            TableSchema::new()
                .column("user_id", ColumnSchema::new(TypeTag::Integer))
                .foreign_key(
                    "posts_user_fk",
                    ForeignKeySchema::new(["user_id"], "users", ["id"]).on_delete(on_delete),
                )
        };
        let old = tables(vec![("users", users()), ("posts", posts(ReferentialAction::NoAction))]);
        let new = tables(vec![("users", users()), ("posts", posts(ReferentialAction::Cascade))]);

        let actions = DiffEngine::new().diff(&old, &new);
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], Action::RemoveForeignKey { .. }));
        assert!(
            matches!(&actions[1], Action::AddForeignKey { foreign_key, .. } if foreign_key.on_delete == ReferentialAction::Cascade)
        );
    }
    #[test]
    fn test_reused_index_name_is_replaced() {
        // The new "users_name" covers another column while its old fields
        // move to "users_by_name": the recorded index still holds the name.
        let old = tables(vec![("users", users())]);
        let new = tables(vec![(
            "users",
            users()
                .index("users_name", IndexSchema::new(["id"]))
                .index("users_by_name", IndexSchema::new(["name"])),
        )]);

        let actions = DiffEngine::new().diff(&old, &new);
        let labels: Vec<String> = actions.iter().map(Action::label).collect();
        assert_eq!(
            labels,
            vec![
                "removeIndex users.users_name",
                "addIndex users.users_by_name",
                "addIndex users.users_name",
            ]
        );
    }

    #[test]
    fn test_reused_foreign_key_name_is_replaced() {
        let posts = |fks: Vec<(&str, ReferentialAction)>| {
            fks.into_iter().fold(
                TableSchema::new().column("user_id", ColumnSchema::new(TypeTag::Integer)),
                |table, (name, on_delete)| {
                    table.foreign_key(
                        name,
                        ForeignKeySchema::new(["user_id"], "users", ["id"]).on_delete(on_delete),
                    )
                },
            )
        };
        let old = tables(vec![("posts", posts(vec![("posts_user_fk", ReferentialAction::NoAction)]))]);
        let new = tables(vec![(
            "posts",
            posts(vec![
                ("posts_user_fk", ReferentialAction::Cascade),
                ("posts_owner_fk", ReferentialAction::NoAction),
            ]),
        )]);

        let actions = DiffEngine::new().diff(&old, &new);
        assert_eq!(actions.len(), 3);
        assert!(
            matches!(&actions[0], Action::RemoveForeignKey { name, .. } if name == "posts_user_fk")
        );
    }

    #[test]
    fn test_reconcile_keeps_recorded_names() {
        let old = tables(vec![("users", users())]);
        let mut renamed = users();
        let index = renamed.indexes.remove("users_name").unwrap();
        renamed.indexes.insert("idx_users_name".to_string(), index);
        let new = tables(vec![("users", renamed), ("logs", TableSchema::new())]);

        let reconciled = DiffEngine::new().reconcile(&old, &new);
        assert_eq!(reconciled["users"], users());
        assert_eq!(reconciled["logs"], TableSchema::new());
    }

    #[test]
    fn test_reconcile_leaves_replaced_names() {
        let old = tables(vec![("users", users())]);
        let new = tables(vec![(
            "users",
            users()
                .index("users_name", IndexSchema::new(["id"]))
                .index("users_by_name", IndexSchema::new(["name"])),
        )]);
        assert_eq!(DiffEngine::new().reconcile(&old, &new), new);
    }
}
