//! SQLite storage adapters
//!
//! Responses go to the `responses` table, sessions to `survey_sessions`
//! (see `phishpair_common::db::table_schemas`). The pool is expected to have
//! been through `init_database`, so both tables exist at their latest
//! revision when these adapters are built.

use super::{
    expand_demographics_extra, InsertOutcome, ResponseExport, ResponseStore, SessionStore,
    StoreError,
};
use crate::corpus;
use crate::recorder::ResponseRecord;
use crate::sampler::SampledSequence;
use crate::session::{Demographics, SessionState};
use async_trait::async_trait;
use phishpair_common::db::{RESPONSES_TABLE, SESSIONS_TABLE};
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, ValueRef};
use tracing::{debug, info};
use uuid::Uuid;

/// Demographic keys with a dedicated column
const AGE_KEY: &str = "age";
const EXPERIENCE_KEY: &str = "experience";

/// Response store over the `responses` table
#[derive(Clone)]
pub struct SqliteResponseStore {
    pool: SqlitePool,
}

impl SqliteResponseStore {
    /// Wrap an initialized pool, filling in type/tag columns left empty by
    /// older revisions
    pub async fn open(pool: SqlitePool) -> Result<Self, StoreError> {
        let filled = backfill_item_metadata(&pool).await?;
        if filled > 0 {
            info!("Backfilled email type/tags on {} legacy responses", filled);
        }
        Ok(Self { pool })
    }
}

#[async_trait]
impl ResponseStore for SqliteResponseStore {
    async fn insert(&self, record: &ResponseRecord) -> Result<InsertOutcome, StoreError> {
        // Prepare all bound values before touching the pool
        let mut demographics = record.demographics.clone();
        let age = demographics.remove(AGE_KEY);
        let experience = demographics.remove(EXPERIENCE_KEY);
        let extra = if demographics.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&demographics)?)
        };

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                response_id, session_id, pair_number,
                email_left, email_right, selected_email,
                email_left_type, email_left_tags,
                email_right_type, email_right_tags,
                selected_email_type, selected_email_tags,
                explanation, view_time,
                demographics_age, demographics_experience, demographics_extra,
                timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            RESPONSES_TABLE
        ))
        .bind(record.response_id.to_string())
        .bind(record.session_id.to_string())
        .bind(record.pair_number as i64)
        .bind(&record.email_left)
        .bind(&record.email_right)
        .bind(&record.selected_email)
        .bind(&record.email_left_type)
        .bind(record.email_left_tags.join(","))
        .bind(&record.email_right_type)
        .bind(record.email_right_tags.join(","))
        .bind(&record.selected_email_type)
        .bind(record.selected_email_tags.join(","))
        .bind(&record.explanation)
        .bind(record.view_time)
        .bind(age)
        .bind(experience)
        .bind(extra)
        .bind(phishpair_common::time::to_storage(&record.timestamp))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!(
                    "Unique constraint hit for session {} pair {}",
                    record.session_id, record.pair_number
                );
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn export(&self) -> Result<ResponseExport, StoreError> {
        let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY rowid", RESPONSES_TABLE))
            .fetch_all(&self.pool)
            .await?;

        let mut flat_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut flat = row_to_map(row);
            expand_demographics_extra(&mut flat)?;
            flat_rows.push(flat);
        }

        Ok(ResponseExport::from_flat_rows(flat_rows))
    }
}

/// Convert a row into column-named JSON values
fn row_to_map(row: &SqliteRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|col| {
            let i = col.ordinal();
            let value = row
                .try_get_raw(i)
                .ok()
                .and_then(|raw| {
                    if raw.is_null() {
                        Some(Value::Null)
                    } else {
                        row.try_get::<String, _>(i)
                            .ok()
                            .map(Value::String)
                            .or_else(|| row.try_get::<i64, _>(i).ok().map(|v| json!(v)))
                            .or_else(|| row.try_get::<f64, _>(i).ok().map(|v| json!(v)))
                    }
                })
                .unwrap_or(Value::Null);
            (col.name().to_string(), value)
        })
        .collect()
}

/// Derive type/tag columns from filenames for rows stored without them
///
/// Returns the number of rows updated.
pub async fn backfill_item_metadata(pool: &SqlitePool) -> Result<usize, StoreError> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT response_id, email_left, email_right, selected_email
        FROM {}
        WHERE email_left_type IS NULL
           OR email_right_type IS NULL
           OR selected_email_type IS NULL
        "#,
        RESPONSES_TABLE
    ))
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for row in &rows {
        let response_id: String = row.get("response_id");
        let left = corpus::parse(row.get::<&str, _>("email_left"));
        let right = corpus::parse(row.get::<&str, _>("email_right"));
        let selected = corpus::parse(row.get::<&str, _>("selected_email"));

        sqlx::query(&format!(
            r#"
            UPDATE {} SET
                email_left_type = ?, email_left_tags = ?,
                email_right_type = ?, email_right_tags = ?,
                selected_email_type = ?, selected_email_tags = ?
            WHERE response_id = ?
            "#,
            RESPONSES_TABLE
        ))
        .bind(left.category.as_str())
        .bind(left.tags_joined())
        .bind(right.category.as_str())
        .bind(right.tags_joined())
        .bind(selected.category.as_str())
        .bind(selected.tags_joined())
        .bind(&response_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(rows.len())
}

/// Session store over the `survey_sessions` table
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, participant_id: Uuid) -> Result<Option<SessionState>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT session_id, demographics, sequence, position, total_pairs
            FROM {}
            WHERE participant_id = ?
            "#,
            SESSIONS_TABLE
        ))
        .bind(participant_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let session_id: String = row.get("session_id");
        let session_id = Uuid::parse_str(&session_id)
            .map_err(|e| StoreError::Corrupt(format!("session_id '{}': {}", session_id, e)))?;

        let demographics: Option<String> = row.get("demographics");
        let demographics: Option<Demographics> = demographics
            .map(|s| serde_json::from_str(&s))
            .transpose()?;

        let sequence: Option<String> = row.get("sequence");
        let sequence: Option<SampledSequence> =
            sequence.map(|s| serde_json::from_str(&s)).transpose()?;

        let position: i64 = row.get("position");
        let total_pairs: i64 = row.get("total_pairs");

        Ok(Some(SessionState::restore(
            participant_id,
            session_id,
            demographics,
            sequence,
            position.max(0) as usize,
            total_pairs.max(0) as usize,
        )))
    }

    async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        let demographics = state
            .demographics()
            .map(serde_json::to_string)
            .transpose()?;
        let sequence = state.sequence().map(serde_json::to_string).transpose()?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                participant_id, session_id, demographics, sequence,
                position, total_pairs
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(participant_id) DO UPDATE SET
                session_id = excluded.session_id,
                demographics = excluded.demographics,
                sequence = excluded.sequence,
                position = excluded.position,
                total_pairs = excluded.total_pairs,
                updated_at = CURRENT_TIMESTAMP
            "#,
            SESSIONS_TABLE
        ))
        .bind(state.participant_id().to_string())
        .bind(state.session_id().to_string())
        .bind(demographics)
        .bind(sequence)
        .bind(state.position() as i64)
        .bind(state.total_pairs() as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
