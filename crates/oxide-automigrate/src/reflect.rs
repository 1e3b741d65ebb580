//! Schema reflection.
//!
//! A [`SchemaReflector`] produces the current structural description of the
//! data model. The bundled [`JsonModelReflector`] reads a JSON model file in
//! which column types are plain strings, so an unknown type is reported with
//! the table and column it appears in instead of as a parse failure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, TableSchema, Tables, TypeTag};

/// File name looked up when the models path is a directory.
pub const MODEL_FILE: &str = "schema.json";

/// Produces the live structural schema of the data model.
pub trait SchemaReflector {
    /// Returns every table of the data model.
    fn reflect(&self) -> Result<Tables>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawColumn {
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default = "raw_allow_null")]
    allow_null: bool,
    #[serde(default)]
    default_value: Option<serde_json::Value>,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    auto_increment: bool,
}

const fn raw_allow_null() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTable {
    #[serde(default)]
    columns: BTreeMap<String, RawColumn>,
    #[serde(default)]
    indexes: BTreeMap<String, IndexSchema>,
    #[serde(default)]
    foreign_keys: BTreeMap<String, ForeignKeySchema>,
}

/// Reads the data model from a JSON file of the form
/// `{ "<table>": { "columns": {...}, "indexes": {...}, "foreignKeys": {...} } }`.
#[derive(Debug, Clone)]
pub struct JsonModelReflector {
    path: PathBuf,
}

impl JsonModelReflector {
    /// Creates a reflector for `path`, which may be the model file itself or
    /// a directory containing [`MODEL_FILE`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the model file that will be read.
    #[must_use]
    pub fn model_file(&self) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(MODEL_FILE)
        } else {
            self.path.clone()
        }
    }

    /// Parses a model document.
    pub fn parse(content: &str) -> Result<Tables> {
        let raw: BTreeMap<String, RawTable> = serde_json::from_str(content)?;
        raw.into_iter()
            .map(|(name, table)| {
                let schema = convert_table(&name, table)?;
                Ok((name, schema))
            })
            .collect()
    }
}

impl SchemaReflector for JsonModelReflector {
    fn reflect(&self) -> Result<Tables> {
        let file = self.model_file();
        let content = read_model(&file)?;
        let tables = Self::parse(&content)?;
        debug!(path = %file.display(), tables = tables.len(), "Reflected model schema");
        Ok(tables)
    }
}

fn read_model(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MigrateError::NotFound(file.to_path_buf())
        } else {
            MigrateError::Io(e)
        }
    })
}

fn convert_table(table: &str, raw: RawTable) -> Result<TableSchema> {
    let mut columns = BTreeMap::new();
    for (column, raw_column) in raw.columns {
        let type_tag: TypeTag =
            raw_column
                .type_tag
                .parse()
                .map_err(|_| MigrateError::UnsupportedType {
                    table: table.to_string(),
                    column: column.clone(),
                    type_tag: raw_column.type_tag.clone(),
                })?;
        columns.insert(
            column,
            ColumnSchema {
                type_tag,
                allow_null: raw_column.allow_null && !raw_column.primary_key,
                default_value: raw_column.default_value,
                primary_key: raw_column.primary_key,
                auto_increment: raw_column.auto_increment,
            },
        );
    }

    Ok(TableSchema {
        columns,
        indexes: raw.indexes,
        foreign_keys: raw.foreign_keys,
    })
}

/// Reflector over an in-memory table map.
#[derive(Debug, Clone, Default)]
pub struct StaticReflector {
    tables: Tables,
}

impl StaticReflector {
    /// Creates a reflector that always returns `tables`.
    #[must_use]
    pub fn new(tables: Tables) -> Self {
        Self { tables }
    }
}

impl SchemaReflector for StaticReflector {
    fn reflect(&self) -> Result<Tables> {
        Ok(self.tables.clone())
    }
}
