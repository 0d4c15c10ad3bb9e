//! Table Schema Definitions
//!
//! Single source of truth for the survey database tables.

use crate::db::schema_sync::{ColumnDefinition, SchemaSync, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Name of the responses table
pub const RESPONSES_TABLE: &str = "responses";

/// Name of the sessions table
pub const SESSIONS_TABLE: &str = "survey_sessions";

/// Responses table schema (latest revision)
///
/// One append-only row per completed trial, keyed by a generated
/// response_id. Tags are stored comma-delimited.
pub struct ResponsesTableSchema;

impl TableSchema for ResponsesTableSchema {
    fn table_name() -> &'static str {
        RESPONSES_TABLE
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("response_id", "TEXT").primary_key(),
            // Per-attempt dedup identity; NULL for rows carried over from
            // participant-keyed revisions
            ColumnDefinition::new("session_id", "TEXT"),
            ColumnDefinition::new("pair_number", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("email_left", "TEXT").not_null().default("''"),
            ColumnDefinition::new("email_right", "TEXT").not_null().default("''"),
            ColumnDefinition::new("selected_email", "TEXT").not_null().default("''"),
            ColumnDefinition::new("email_left_type", "TEXT"),
            ColumnDefinition::new("email_left_tags", "TEXT"),
            ColumnDefinition::new("email_right_type", "TEXT"),
            ColumnDefinition::new("email_right_tags", "TEXT"),
            ColumnDefinition::new("selected_email_type", "TEXT"),
            ColumnDefinition::new("selected_email_tags", "TEXT"),
            ColumnDefinition::new("explanation", "TEXT").not_null().default("''"),
            ColumnDefinition::new("view_time", "REAL"),
            ColumnDefinition::new("demographics_age", "TEXT"),
            ColumnDefinition::new("demographics_experience", "TEXT"),
            // JSON object with any further demographic answers
            ColumnDefinition::new("demographics_extra", "TEXT"),
            ColumnDefinition::new("timestamp", "TEXT"),
        ]
    }
}

/// Survey sessions table schema
///
/// Keyed by participant_id; sequence and demographics are JSON.
pub struct SessionsTableSchema;

impl TableSchema for SessionsTableSchema {
    fn table_name() -> &'static str {
        SESSIONS_TABLE
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("participant_id", "TEXT").primary_key(),
            ColumnDefinition::new("session_id", "TEXT").not_null().default("''"),
            ColumnDefinition::new("demographics", "TEXT"),
            ColumnDefinition::new("sequence", "TEXT"),
            ColumnDefinition::new("position", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("total_pairs", "INTEGER").not_null().default("10"),
            ColumnDefinition::new("created_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
            ColumnDefinition::new("updated_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

/// Column names of the responses table in schema order
pub fn response_columns() -> Vec<String> {
    ResponsesTableSchema::expected_columns()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

/// Synchronize all table schemas
///
/// Runs after CREATE TABLE IF NOT EXISTS and before manual migrations.
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    let added = SchemaSync::sync_table::<ResponsesTableSchema>(pool).await?
        + SchemaSync::sync_table::<SessionsTableSchema>(pool).await?;

    if added > 0 {
        info!("Schema synchronization added {} columns", added);
    }
    Ok(())
}
