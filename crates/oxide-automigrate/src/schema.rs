//! Schema representation types.
//!
//! These types describe the structure of tables as recorded in snapshots and
//! as produced by schema reflection. They are the only input the diff engine
//! needs: names are map keys, so every map iterates in a deterministic order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tables keyed by name.
pub type Tables = BTreeMap<String, TableSchema>;

/// Portable column type tags.
///
/// Tags are dialect independent; a [`TypeMapping`](crate::executor::TypeMapping)
/// turns them into native types at apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TypeTag {
    /// Variable-length string.
    String,
    /// Fixed-length string.
    Char,
    /// Unbounded text.
    Text,
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Floating point.
    Float,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Exact decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// Date and time.
    Date,
    /// Date without time.
    DateOnly,
    /// Time without date.
    Time,
    /// UUID.
    Uuid,
    /// JSON document.
    Json,
    /// Binary JSON document.
    Jsonb,
    /// Binary large object.
    Blob,
    /// Enumerated string.
    Enum,
    /// Array of values.
    Array,
}

impl TypeTag {
    /// Every supported tag.
    pub const ALL: [Self; 20] = [
        Self::String,
        Self::Char,
        Self::Text,
        Self::Integer,
        Self::BigInt,
        Self::SmallInt,
        Self::Float,
        Self::Real,
        Self::Double,
        Self::Decimal,
        Self::Boolean,
        Self::Date,
        Self::DateOnly,
        Self::Time,
        Self::Uuid,
        Self::Json,
        Self::Jsonb,
        Self::Blob,
        Self::Enum,
        Self::Array,
    ];

    /// Returns the tag as written in snapshots.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Char => "CHAR",
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::SmallInt => "SMALLINT",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Decimal => "DECIMAL",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::DateOnly => "DATEONLY",
            Self::Time => "TIME",
            Self::Uuid => "UUID",
            Self::Json => "JSON",
            Self::Jsonb => "JSONB",
            Self::Blob => "BLOB",
            Self::Enum => "ENUM",
            Self::Array => "ARRAY",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known [`TypeTag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTypeTag(pub String);

impl fmt::Display for UnknownTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown type tag '{}'", self.0)
    }
}

impl std::error::Error for UnknownTypeTag {}

impl FromStr for TypeTag {
    type Err = UnknownTypeTag;

    /// Parses a tag case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownTypeTag(s.to_string()))
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReferentialAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    #[serde(rename = "RESTRICT")]
    Restrict,
    /// Cascade the delete/update to referencing rows.
    #[serde(rename = "CASCADE")]
    Cascade,
    /// Set the foreign key column to NULL.
    #[serde(rename = "SET NULL")]
    SetNull,
    /// Set the foreign key column to its default value.
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

const fn default_allow_null() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    /// Portable type tag.
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    /// Whether the column allows NULL values.
    #[serde(default = "default_allow_null")]
    pub allow_null: bool,
    /// Default value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Whether this column is part of the primary key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
    /// Whether this column auto-increments.
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,
}

impl ColumnSchema {
    /// Creates a nullable column without a default.
    #[must_use]
    pub fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            allow_null: true,
            default_value: None,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false; // Primary keys are always NOT NULL
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Columns included in the index, in order.
    pub fields: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSchema {
    /// Creates a non-unique index over `fields`.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeySchema {
    /// Column(s) in the referencing table.
    pub fields: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_fields: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ReferentialAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ReferentialAction,
}

impl ForeignKeySchema {
    /// Creates a foreign key from `fields` to `references_table(references_fields)`.
    #[must_use]
    pub fn new<I, S, J, T>(fields: I, references_table: impl Into<String>, references_fields: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            references_table: references_table.into(),
            references_fields: references_fields.into_iter().map(Into::into).collect(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Column definitions.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSchema>,
    /// Index definitions.
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexSchema>,
    /// Foreign key definitions.
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, ForeignKeySchema>,
}

impl TableSchema {
    /// Creates an empty table schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, column: ColumnSchema) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, index: IndexSchema) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, name: impl Into<String>, fk: ForeignKeySchema) -> Self {
        self.foreign_keys.insert(name.into(), fk);
        self
    }

    /// Returns the primary key column names.
    pub fn primary_key(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.primary_key)
            .map(|(name, _)| name.as_str())
    }
}
