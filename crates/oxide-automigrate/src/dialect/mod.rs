//! Database adapters.
//!
//! Each adapter implements [`QueryInterface`](crate::executor::QueryInterface)
//! and [`TypeMapping`](crate::executor::TypeMapping) for one database system.

mod sqlite;

pub use sqlite::{SqliteQueryInterface, SqliteTypeMapping};

/// Quote an identifier (table name, column name, etc.).
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
