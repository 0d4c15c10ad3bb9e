//! Database schema migrations
//!
//! Versioned migrations that bring databases written by earlier survey
//! revisions up to the current responses layout without data loss.
//! Column additions are handled by schema sync; migrations here cover what
//! ALTER TABLE cannot do (re-keying, indexes).
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Keep them idempotent** - a fresh database runs every migration too

use crate::db::schema_sync::{SchemaIntrospector, SchemaSync, TableSchema};
use crate::db::table_schemas::{ResponsesTableSchema, RESPONSES_TABLE};
use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    if !SchemaIntrospector::table_exists(pool, "schema_version").await? {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

/// Set schema version in database
async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("Migration v3 completed");
    }

    Ok(())
}

/// Migration v1: Re-key responses by generated response_id
///
/// **Background:** The first survey revisions wrote one row per trial keyed
/// by participant_id. Responses are now keyed by a random response_id so
/// that a response cannot be traced back to a participant. Legacy rows get a
/// fresh UUIDv4 each; the participant_id column is not carried over.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let columns = SchemaIntrospector::introspect_table(pool, RESPONSES_TABLE).await?;

    if columns.iter().any(|c| c.name == "response_id" && c.pk) {
        info!("  responses already keyed by response_id - skipping");
        return Ok(());
    }

    if !columns.iter().any(|c| c.name == "response_id") {
        // Schema sync runs first and adds the column; without it nothing can be copied
        warn!("  responses.response_id missing - schema sync did not run");
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let unkeyed: Vec<i64> = sqlx::query_scalar(
        "SELECT rowid FROM responses WHERE response_id IS NULL OR response_id = ''",
    )
    .fetch_all(&mut *tx)
    .await?;

    for rowid in &unkeyed {
        sqlx::query("UPDATE responses SET response_id = ? WHERE rowid = ?")
            .bind(crate::uuid_utils::generate().to_string())
            .bind(rowid)
            .execute(&mut *tx)
            .await?;
    }

    // Copy every column the legacy table shares with the current layout
    let expected = ResponsesTableSchema::expected_columns();
    let shared: Vec<_> = expected
        .iter()
        .filter(|def| columns.iter().any(|c| c.name == def.name))
        .collect();
    let target_list = shared
        .iter()
        .map(|def| def.name.clone())
        .collect::<Vec<_>>()
        .join(", ");
    let select_list = shared
        .iter()
        .map(|def| match (&def.default_value, def.not_null) {
            (Some(default), true) => format!("COALESCE({}, {})", def.name, default),
            _ => def.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    sqlx::query("DROP TABLE IF EXISTS responses_rekeyed")
        .execute(&mut *tx)
        .await?;
    sqlx::query(&SchemaSync::create_table_sql::<ResponsesTableSchema>(Some(
        "responses_rekeyed",
    )))
    .execute(&mut *tx)
    .await?;
    sqlx::query(&format!(
        "INSERT INTO responses_rekeyed ({}) SELECT {} FROM responses",
        target_list, select_list
    ))
    .execute(&mut *tx)
    .await?;
    sqlx::query("DROP TABLE responses").execute(&mut *tx).await?;
    sqlx::query("ALTER TABLE responses_rekeyed RENAME TO responses")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        "  Re-keyed responses table ({} legacy rows assigned response ids)",
        unkeyed.len()
    );
    Ok(())
}

/// Migration v2: One response per (session, pair_number)
///
/// Rows without a session_id predate per-attempt identities and are exempt.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_responses_session_pair
        ON responses(session_id, pair_number)
        WHERE session_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    info!("  Created dedup index on responses(session_id, pair_number)");
    Ok(())
}

/// Migration v3: Index responses by timestamp for export ordering
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_responses_timestamp ON responses(timestamp)")
        .execute(pool)
        .await?;

    info!("  Created index on responses(timestamp)");
    Ok(())
}
