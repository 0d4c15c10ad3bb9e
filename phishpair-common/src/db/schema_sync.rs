//! Automatic Schema Synchronization
//!
//! Schema definitions in code are the single source of truth: they produce
//! the `CREATE TABLE` statement for fresh databases and are compared against
//! existing tables on startup so that missing columns get added.
//!
//! Three-phase initialization:
//! 1. **CREATE TABLE IF NOT EXISTS** - Create missing tables
//! 2. **Auto-Sync** - Add missing columns via ALTER TABLE (THIS MODULE)
//! 3. **Manual Migrations** - Re-keying and index changes (migrations.rs)
//!
//! # Usage
//!
//! ```rust,ignore
//! pub struct SessionsTableSchema;
//!
//! impl TableSchema for SessionsTableSchema {
//!     fn table_name() -> &'static str { "survey_sessions" }
//!
//!     fn expected_columns() -> Vec<ColumnDefinition> {
//!         vec![
//!             ColumnDefinition::new("participant_id", "TEXT").primary_key(),
//!             ColumnDefinition::new("position", "INTEGER").not_null().default("0"),
//!         ]
//!     }
//! }
//!
//! SchemaSync::sync_table::<SessionsTableSchema>(&pool).await?;
//! ```

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// DEFAULT value (SQL literal)
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Column clause as used inside CREATE TABLE
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        sql
    }
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    /// Column ID (position in table)
    pub cid: i32,
    /// Column name
    pub name: String,
    /// SQL type from PRAGMA table_info
    pub type_name: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY flag
    pub pk: bool,
}

/// Schema drift detected between expected and actual schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Column missing from database
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type mismatch (cannot auto-fix)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    /// Constraint mismatch (cannot auto-fix)
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String,
    },
}

/// Defines expected schema for a database table
pub trait TableSchema {
    /// Table name in database
    fn table_name() -> &'static str;

    /// Expected column definitions (order matters for new table creation)
    fn expected_columns() -> Vec<ColumnDefinition>;
}

/// Schema introspection via PRAGMA table_info
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns from database table, ordered by cid
    pub async fn introspect_table(
        pool: &SqlitePool,
        table_name: &str,
    ) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    /// Check if table exists
    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Schema comparison - detect drift between expected and actual
pub struct SchemaDiff;

impl SchemaDiff {
    /// Compare expected schema to actual database schema
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            match actual.iter().find(|c| c.name == expected_col.name) {
                Some(actual_col) => {
                    if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                        drift.push(SchemaDrift::TypeMismatch {
                            table: table_name.to_string(),
                            column: expected_col.name.clone(),
                            expected: expected_col.sql_type.clone(),
                            actual: actual_col.type_name.clone(),
                        });
                    }

                    if expected_col.primary_key && !actual_col.pk {
                        drift.push(SchemaDrift::ConstraintMismatch {
                            table: table_name.to_string(),
                            column: expected_col.name.clone(),
                            constraint: "PRIMARY KEY".to_string(),
                        });
                    }
                }
                None => drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                }),
            }
        }

        drift
    }

    /// Check if SQL types are compatible (SQLite type affinity rules)
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        let affinity = |t: &str| {
            if t.contains("INT") {
                "INTEGER"
            } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
                "TEXT"
            } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
                "REAL"
            } else {
                "NUMERIC"
            }
        };

        affinity(&exp) == affinity(&act)
    }
}

/// Schema synchronization - apply schema changes to database
pub struct SchemaSync;

impl SchemaSync {
    /// `CREATE TABLE IF NOT EXISTS` statement for a schema, under an optional alternate name
    pub fn create_table_sql<T: TableSchema>(table_name: Option<&str>) -> String {
        let clauses: Vec<String> = T::expected_columns().iter().map(|c| c.to_sql()).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            table_name.unwrap_or(T::table_name()),
            clauses.join(",\n    ")
        )
    }

    /// Create table from its schema definition if missing
    pub async fn create_table<T: TableSchema>(pool: &SqlitePool) -> Result<()> {
        sqlx::query(&Self::create_table_sql::<T>(None))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Synchronize table schema: detect drift and add missing columns
    ///
    /// Type and constraint changes are reported, not fixed; they need a
    /// manual migration (SQLite cannot alter them in place).
    pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<usize> {
        let table_name = T::table_name();

        if !SchemaIntrospector::table_exists(pool, table_name).await? {
            warn!(
                "Table '{}' does not exist - should be created by CREATE TABLE IF NOT EXISTS first",
                table_name
            );
            return Ok(0);
        }

        let actual = SchemaIntrospector::introspect_table(pool, table_name).await?;
        let drift = SchemaDiff::compare(table_name, &T::expected_columns(), &actual);

        let mut added = 0;
        for change in drift {
            match change {
                SchemaDrift::MissingColumn { table, column } => {
                    Self::add_column(pool, &table, &column).await?;
                    added += 1;
                }
                SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                    warn!(
                        "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                        table, column, expected, actual
                    );
                }
                SchemaDrift::ConstraintMismatch { table, column, constraint } => {
                    warn!(
                        "Constraint mismatch in {}.{}: missing '{}'. Manual migration required.",
                        table, column, constraint
                    );
                }
            }
        }

        if added == 0 {
            info!("Schema up to date for '{}'", table_name);
        }

        Ok(added)
    }

    /// Add missing column to table via ALTER TABLE ADD COLUMN
    ///
    /// PRIMARY KEY cannot be added this way; NOT NULL only with a DEFAULT.
    async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column.name, column.sql_type
        );

        match (&column.default_value, column.not_null) {
            (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
            (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
            (None, true) => warn!(
                "Cannot add NOT NULL column {}.{} without DEFAULT value. Column will be nullable.",
                table, column.name
            ),
            (None, false) => {}
        }

        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => {
                info!("Added column: {}.{} ({})", table, column.name, column.sql_type);
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                info!("{}.{} added by concurrent initialization - skipping", table, column.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
