//! Dependency ordering of actions.
//!
//! Actions are ordered topologically so that a foreign key is never created
//! before the table or column it points to, and an object is never dropped
//! while something still depends on it. Among the actions that are ready at
//! any point, the one with the smallest [`SortKey`] goes first, which makes
//! the output independent of the input order.

use std::collections::BTreeSet;

use tracing::warn;

use crate::action::{Action, Phase};

/// Tie-break key among actions whose prerequisites are satisfied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    phase: Phase,
    table: String,
    kind: u8,
    object: String,
}

impl SortKey {
    /// Builds the key of `action`.
    #[must_use]
    pub fn of(action: &Action) -> Self {
        Self {
            phase: action.phase(),
            table: action.table().to_string(),
            kind: action.kind_rank(),
            object: action.object_name().to_string(),
        }
    }
}

/// Orders actions so that prerequisites run first.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionSorter;

impl ActionSorter {
    /// Creates a new sorter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `actions` in executable order.
    ///
    /// When the dependencies form a cycle the remaining actions are appended
    /// in key order and a warning is logged.
    #[must_use]
    pub fn sort(&self, actions: Vec<Action>) -> Vec<Action> {
        let count = actions.len();
        let keys: Vec<SortKey> = actions.iter().map(SortKey::of).collect();

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut pending = vec![0usize; count];
        for (i, first) in actions.iter().enumerate() {
            for (j, then) in actions.iter().enumerate() {
                if i != j && must_precede(first, then) {
                    dependents[i].push(j);
                    pending[j] += 1;
                }
            }
        }

        let mut ready: BTreeSet<(&SortKey, usize)> = (0..count)
            .filter(|&i| pending[i] == 0)
            .map(|i| (&keys[i], i))
            .collect();
        let mut emitted = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while let Some((_, i)) = ready.pop_first() {
            emitted[i] = true;
            order.push(i);
            for &j in &dependents[i] {
                pending[j] -= 1;
                if pending[j] == 0 {
                    ready.insert((&keys[j], j));
                }
            }
        }

        if order.len() < count {
            let mut rest: Vec<usize> = (0..count).filter(|&i| !emitted[i]).collect();
            rest.sort_by(|&a, &b| keys[a].cmp(&keys[b]).then(a.cmp(&b)));
            let labels: Vec<String> = rest.iter().map(|&i| actions[i].label()).collect();
            warn!(
                actions = ?labels,
                "Dependency cycle between actions, emitting remaining actions in default order"
            );
            order.extend(rest);
        }

        let mut slots: Vec<Option<Action>> = actions.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect()
    }
}

/// Returns true when `first` has to run before `then`.
fn must_precede(first: &Action, then: &Action) -> bool {
    match first {
        Action::AddTable { table, .. } => then
            .added_foreign_keys()
            .iter()
            .any(|fk| fk.references_table == *table && then.table() != table.as_str()),

        Action::AddColumn { table, column, .. } => {
            let covers_column = match then {
                Action::AddIndex {
                    table: t, index, ..
                } => t == table && index.fields.contains(column),
                Action::AddForeignKey {
                    table: t,
                    foreign_key,
                    ..
                } => t == table && foreign_key.fields.contains(column),
                _ => false,
            };
            covers_column
                || then.added_foreign_keys().iter().any(|fk| {
                    fk.references_table == *table && fk.references_fields.contains(column)
                })
        }

        Action::RemoveIndex {
            table, name, index, ..
        } => match then {
            Action::AddIndex {
                table: t, name: n, ..
            } => t == table && n == name,
            Action::RemoveColumn {
                table: t, column, ..
            } => t == table && index.fields.contains(column),
            Action::RemoveTable { table: t, .. } => t == table,
            _ => false,
        },

        Action::RemoveForeignKey {
            table,
            name,
            foreign_key,
        } => match then {
            Action::AddForeignKey {
                table: t, name: n, ..
            } => t == table && n == name,
            Action::RemoveColumn {
                table: t, column, ..
            } => {
                (t == table && foreign_key.fields.contains(column))
                    || (*t == foreign_key.references_table
                        && foreign_key.references_fields.contains(column))
            }
            Action::RemoveTable { table: t, .. } => {
                t == table || *t == foreign_key.references_table
            }
            _ => false,
        },

        Action::RemoveTable { table, schema } => match then {
            Action::RemoveTable { table: t, .. } => schema
                .foreign_keys
                .values()
                .any(|fk| fk.references_table == *t && t != table),
            Action::RemoveColumn {
                table: t, column, ..
            } => schema.foreign_keys.values().any(|fk| {
                fk.references_table == *t && t != table && fk.references_fields.contains(column)
            }),
            _ => false,
        },

        // A referenced column may only become a valid target (a key) here.
        Action::ChangeColumn { table, column, .. } => then
            .added_foreign_keys()
            .iter()
            .any(|fk| fk.references_table == *table && fk.references_fields.contains(column)),

        Action::RemoveColumn { .. } | Action::AddIndex { .. } => false,

        Action::AddForeignKey { .. } => false,
    }
}
