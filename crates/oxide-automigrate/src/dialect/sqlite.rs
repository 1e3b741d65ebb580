//! SQLite adapter.
//!
//! SQLite cannot alter a column, add a primary key column or add/drop a
//! foreign key in place. Those operations need the table recreation strategy
//! (create a new table, copy data, drop the old table, rename the new one),
//! which this adapter does not perform. They fail with [`QueryError::Unsupported`] instead.

use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::QueryError;
use crate::executor::{QueryInterface, TypeMapping};
use crate::operations::OpDescriptor;
use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, TableSchema, TypeTag};

use super::quote_identifier;

/// SQLite storage classes for each type tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTypeMapping;

impl TypeMapping for SqliteTypeMapping {
    fn native_type(&self, column: &ColumnSchema) -> String {
        match column.type_tag {
            TypeTag::Integer | TypeTag::BigInt | TypeTag::SmallInt | TypeTag::Boolean => {
                "INTEGER".to_string()
            }
            TypeTag::Float | TypeTag::Real | TypeTag::Double => "REAL".to_string(),
            TypeTag::Decimal => "NUMERIC".to_string(),
            TypeTag::Blob => "BLOB".to_string(),
            TypeTag::String
            | TypeTag::Char
            | TypeTag::Text
            | TypeTag::Date
            | TypeTag::DateOnly
            | TypeTag::Time
            | TypeTag::Uuid
            | TypeTag::Json
            | TypeTag::Jsonb
            | TypeTag::Enum
            | TypeTag::Array => "TEXT".to_string(),
        }
    }
}

/// Applies operations to a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteQueryInterface {
    pool: SqlitePool,
}

impl SqliteQueryInterface {
    /// Creates an adapter over `pool`.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Generates the statements for `op`.
    pub fn generate_sql(
        op: &OpDescriptor,
        types: &dyn TypeMapping,
    ) -> Result<Vec<String>, QueryError> {
        match op {
            OpDescriptor::CreateTable { table, schema } => {
                let mut statements = vec![create_table_sql(table, schema, types)];
                for (name, index) in &schema.indexes {
                    statements.push(create_index_sql(table, name, index));
                }
                Ok(statements)
            }
            OpDescriptor::DropTable { table } => {
                Ok(vec![format!("DROP TABLE {}", quote_identifier(table))])
            }
            OpDescriptor::AddColumn {
                table,
                column,
                definition,
            } if definition.primary_key => Err(QueryError::Unsupported(format!(
                "SQLite cannot add primary key column {column} to existing table {table}"
            ))),
            OpDescriptor::AddColumn {
                table,
                column,
                definition,
            } => Ok(vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(table),
                column_definition(column, definition, types, false)
            )]),
            // SQLite 3.35.0+
            OpDescriptor::RemoveColumn { table, column } => Ok(vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_identifier(table),
                quote_identifier(column)
            )]),
            OpDescriptor::AddIndex { table, name, index } => {
                Ok(vec![create_index_sql(table, name, index)])
            }
            OpDescriptor::RemoveIndex { name, .. } => {
                Ok(vec![format!("DROP INDEX {}", quote_identifier(name))])
            }
            OpDescriptor::ChangeColumn { table, column, .. } => Err(QueryError::Unsupported(
                format!("SQLite cannot alter column {table}.{column} in place"),
            )),
            OpDescriptor::AddForeignKey { table, name, .. } => Err(QueryError::Unsupported(
                format!("SQLite cannot add foreign key {name} to existing table {table}"),
            )),
            OpDescriptor::RemoveForeignKey { table, name } => Err(QueryError::Unsupported(
                format!("SQLite cannot drop foreign key {name} from table {table}"),
            )),
        }
    }
}

impl QueryInterface for SqliteQueryInterface {
    async fn apply(&self, op: &OpDescriptor, types: &dyn TypeMapping) -> Result<(), QueryError> {
        for sql in Self::generate_sql(op, types)? {
            debug!(sql = %sql, "Executing SQL");
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Generates column definition SQL. `inline_pk` puts the primary key
/// constraint on the column itself.
fn column_definition(
    name: &str,
    column: &ColumnSchema,
    types: &dyn TypeMapping,
    inline_pk: bool,
) -> String {
    let native = types.native_type(column);
    let mut parts = vec![quote_identifier(name), native.clone()];

    if inline_pk {
        parts.push("PRIMARY KEY".to_string());
        // AUTOINCREMENT is only valid on INTEGER PRIMARY KEY
        if column.auto_increment && native == "INTEGER" {
            parts.push("AUTOINCREMENT".to_string());
        }
    } else if !column.allow_null {
        parts.push("NOT NULL".to_string());
    }

    if let Some(ref value) = column.default_value {
        parts.push(format!("DEFAULT {}", default_sql(value)));
    }

    parts.join(" ")
}

fn default_sql(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_literal(s),
        other => quote_literal(&other.to_string()),
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_table_sql(table: &str, schema: &TableSchema, types: &dyn TypeMapping) -> String {
    let primary_key: Vec<String> = schema.primary_key().map(str::to_string).collect();
    let inline_pk = primary_key.len() == 1;

    let mut defs: Vec<String> = schema
        .columns
        .iter()
        .map(|(name, column)| {
            column_definition(name, column, types, inline_pk && column.primary_key)
        })
        .collect();

    if primary_key.len() > 1 {
        defs.push(format!("PRIMARY KEY ({})", quoted_list(&primary_key)));
    }

    for fk in schema.foreign_keys.values() {
        defs.push(foreign_key_clause(fk));
    }

    format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_identifier(table),
        defs.join(",\n  ")
    )
}

fn foreign_key_clause(fk: &ForeignKeySchema) -> String {
    format!(
        "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        quoted_list(&fk.fields),
        quote_identifier(&fk.references_table),
        quoted_list(&fk.references_fields),
        fk.on_delete.to_sql(),
        fk.on_update.to_sql()
    )
}

fn create_index_sql(table: &str, name: &str, index: &IndexSchema) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_identifier(name),
        quote_identifier(table),
        quoted_list(&index.fields)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReferentialAction;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    fn users() -> TableSchema {
        TableSchema::new()
            .column(
                "id",
                ColumnSchema::new(TypeTag::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column("name", ColumnSchema::new(TypeTag::String).not_null())
            .index("users_name", IndexSchema::new(["name"]).unique())
    }

    fn create_users() -> OpDescriptor {
        OpDescriptor::CreateTable {
            table: "users".to_string(),
            schema: users(),
        }
    }

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                .bind(name)
                .fetch_optional(pool)
                .await
                .unwrap();
        row.is_some()
    }

    async fn columns(pool: &SqlitePool, table: &str) -> Vec<String> {
        let rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT name FROM pragma_table_info('{table}')"))
                .fetch_all(pool)
                .await
                .unwrap();
        rows.into_iter().map(|(name,)| name).collect()
    }

    #[test]
    fn test_create_table_sql() {
        let sql = SqliteQueryInterface::generate_sql(&create_users(), &SqliteTypeMapping).unwrap();
        assert_eq!(sql.len(), 2);
        assert_eq!(
            sql[0],
            "CREATE TABLE \"users\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \"name\" TEXT NOT NULL\n)"
        );
        assert_eq!(
            sql[1],
            "CREATE UNIQUE INDEX \"users_name\" ON \"users\" (\"name\")"
        );
    }

    #[test]
    fn test_composite_primary_key_and_foreign_key() {
        let schema = TableSchema::new()
            .column("user_id", ColumnSchema::new(TypeTag::Integer).primary_key())
            .column("group_id", ColumnSchema::new(TypeTag::Integer).primary_key())
            .foreign_key(
                "memberships_user_fk",
                ForeignKeySchema::new(["user_id"], "users", ["id"])
                    .on_delete(ReferentialAction::Cascade),
            );
        let op = OpDescriptor::CreateTable {
            table: "memberships".to_string(),
            schema,
        };

        let sql = SqliteQueryInterface::generate_sql(&op, &SqliteTypeMapping).unwrap();
        assert!(sql[0].contains("\"group_id\" INTEGER NOT NULL"));
        assert!(sql[0].contains("PRIMARY KEY (\"group_id\", \"user_id\")"));
        assert!(sql[0].contains(
            "FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE ON UPDATE NO ACTION"
        ));
    }

    #[test]
    fn test_add_column_with_default() {
        let op = OpDescriptor::AddColumn {
            table: "users".to_string(),
            column: "nickname".to_string(),
            definition: ColumnSchema::new(TypeTag::String)
                .not_null()
                .default_value("o'neil"),
        };
        let sql = SqliteQueryInterface::generate_sql(&op, &SqliteTypeMapping).unwrap();
        assert_eq!(
            sql[0],
            "ALTER TABLE \"users\" ADD COLUMN \"nickname\" TEXT NOT NULL DEFAULT 'o''neil'"
        );
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_sql(&serde_json::json!(true)), "1");
        assert_eq!(default_sql(&serde_json::json!(42)), "42");
        assert_eq!(default_sql(&serde_json::json!(null)), "NULL");
        assert_eq!(default_sql(&serde_json::json!(["a"])), "'[\"a\"]'");
    }

    #[test]
    fn test_type_names() {
        let t = SqliteTypeMapping;
        assert_eq!(t.native_type(&ColumnSchema::new(TypeTag::BigInt)), "INTEGER");
        assert_eq!(t.native_type(&ColumnSchema::new(TypeTag::String)), "TEXT");
        assert_eq!(t.native_type(&ColumnSchema::new(TypeTag::Boolean)), "INTEGER");
        assert_eq!(t.native_type(&ColumnSchema::new(TypeTag::Date)), "TEXT");
        assert_eq!(t.native_type(&ColumnSchema::new(TypeTag::Double)), "REAL");
        assert_eq!(t.native_type(&ColumnSchema::new(TypeTag::Blob)), "BLOB");
    }

    #[test]
    fn test_unsupported_operations() {
        let change = OpDescriptor::ChangeColumn {
            table: "users".to_string(),
            column: "name".to_string(),
            definition: ColumnSchema::new(TypeTag::Text),
        };
        let add_pk = OpDescriptor::AddColumn {
            table: "users".to_string(),
            column: "uuid".to_string(),
            definition: ColumnSchema::new(TypeTag::Uuid).primary_key(),
        };
        let drop_fk = OpDescriptor::RemoveForeignKey {
            table: "posts".to_string(),
            name: "posts_user_fk".to_string(),
        };
        assert!(matches!(
            SqliteQueryInterface::generate_sql(&change, &SqliteTypeMapping),
            Err(QueryError::Unsupported(_))
        ));
        assert!(matches!(
            SqliteQueryInterface::generate_sql(&add_pk, &SqliteTypeMapping),
            Err(QueryError::Unsupported(_))
        ));
        assert!(matches!(
            SqliteQueryInterface::generate_sql(&drop_fk, &SqliteTypeMapping),
            Err(QueryError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_create_and_drop_table() {
        let qi = SqliteQueryInterface::new(create_test_pool().await);

        qi.apply(&create_users(), &SqliteTypeMapping).await.unwrap();
        assert!(table_exists(qi.pool(), "users").await);

        qi.apply(
            &OpDescriptor::DropTable {
                table: "users".to_string(),
            },
            &SqliteTypeMapping,
        )
        .await
        .unwrap();
        assert!(!table_exists(qi.pool(), "users").await);
    }

    #[tokio::test]
    async fn test_apply_column_and_index_ops() {
        let qi = SqliteQueryInterface::new(create_test_pool().await);
        qi.apply(&create_users(), &SqliteTypeMapping).await.unwrap();

        let ops = [
            OpDescriptor::AddColumn {
                table: "users".to_string(),
                column: "email".to_string(),
                definition: ColumnSchema::new(TypeTag::String),
            },
            OpDescriptor::AddIndex {
                table: "users".to_string(),
                name: "users_email".to_string(),
                index: IndexSchema::new(["email"]),
            },
            OpDescriptor::RemoveIndex {
                table: "users".to_string(),
                name: "users_email".to_string(),
            },
            OpDescriptor::RemoveColumn {
                table: "users".to_string(),
                column: "email".to_string(),
            },
        ];

        qi.apply(&ops[0], &SqliteTypeMapping).await.unwrap();
        assert!(columns(qi.pool(), "users").await.contains(&"email".to_string()));

        qi.apply(&ops[1], &SqliteTypeMapping).await.unwrap();
        qi.apply(&ops[2], &SqliteTypeMapping).await.unwrap();
        qi.apply(&ops[3], &SqliteTypeMapping).await.unwrap();
        assert_eq!(columns(qi.pool(), "users").await, vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_database_error_is_reported() {
        let qi = SqliteQueryInterface::new(create_test_pool().await);
        let result = qi
            .apply(
                &OpDescriptor::DropTable {
                    table: "missing".to_string(),
                },
                &SqliteTypeMapping,
            )
            .await;
        assert!(matches!(result, Err(QueryError::Database(_))));
    }
}
