//! Storage ports
//!
//! The survey talks to persistence through two traits: `ResponseStore`
//! (append-only trial records plus export) and `SessionStore` (per-participant
//! progress). `sqlite` is the production adapter, `memory` backs tests and
//! throwaway runs.

pub mod memory;
pub mod sqlite;

use crate::recorder::{ResponseRecord, DEMOGRAPHICS_PREFIX};
use crate::session::SessionState;
use async_trait::async_trait;
use phishpair_common::db::response_columns;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

pub use memory::{MemoryResponseStore, MemorySessionStore};
pub use sqlite::{SqliteResponseStore, SqliteSessionStore};

/// Column holding demographic answers without a dedicated column
const DEMOGRAPHICS_EXTRA_COLUMN: &str = "demographics_extra";

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value cannot be decoded
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

/// Result of appending a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// A response for the same (session_id, pair_number) already exists
    Duplicate,
}

/// Tabular export: one header row and one value row per response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseExport {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResponseExport {
    /// Lay out flattened rows under the fixed response columns
    ///
    /// `demographics_extra` is replaced by one `demographics_<key>` column per
    /// extra answer seen in any row, sorted by name and appended after the
    /// fixed columns. Absent values export as null.
    pub fn from_flat_rows(flat_rows: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = response_columns()
            .into_iter()
            .filter(|c| c != DEMOGRAPHICS_EXTRA_COLUMN)
            .collect();

        let extra: BTreeSet<&String> = flat_rows
            .iter()
            .flat_map(|row| row.keys())
            .filter(|key| !columns.contains(key))
            .collect();
        let extra: Vec<String> = extra.into_iter().cloned().collect();
        columns.extend(extra);

        let rows = flat_rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `index`
    pub fn value(&self, index: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index)?.get(col)
    }
}

/// Append-only response persistence
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Append a record; a second record for the same trial is not stored
    async fn insert(&self, record: &ResponseRecord) -> Result<InsertOutcome, StoreError>;

    /// Every stored response, oldest first
    async fn export(&self) -> Result<ResponseExport, StoreError>;
}

/// Per-participant session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, participant_id: Uuid) -> Result<Option<SessionState>, StoreError>;

    /// Insert or replace the session of `state.participant_id()`
    async fn save(&self, state: &SessionState) -> Result<(), StoreError>;
}

/// Move `demographics_extra` JSON entries to `demographics_<key>` fields
fn expand_demographics_extra(row: &mut Map<String, Value>) -> Result<(), StoreError> {
    let extra = match row.remove(DEMOGRAPHICS_EXTRA_COLUMN) {
        Some(Value::String(json)) if !json.is_empty() => json,
        _ => return Ok(()),
    };

    let extra: Map<String, Value> = serde_json::from_str(&extra).map_err(|e| {
        StoreError::Corrupt(format!("{} is not a JSON object: {}", DEMOGRAPHICS_EXTRA_COLUMN, e))
    })?;

    for (key, value) in extra {
        row.entry(format!("{}{}", DEMOGRAPHICS_PREFIX, key))
            .or_insert(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_export_uses_fixed_columns_then_sorted_extras() {
        let export = ResponseExport::from_flat_rows(vec![
            flat(&[("response_id", json!("a")), ("demographics_region", json!("north"))]),
            flat(&[("response_id", json!("b")), ("demographics_device", json!("phone"))]),
        ]);

        assert_eq!(export.columns[0], "response_id");
        assert!(!export.columns.iter().any(|c| c == "demographics_extra"));
        let tail: Vec<&str> = export.columns[export.columns.len() - 2..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(tail, vec!["demographics_device", "demographics_region"]);

        assert_eq!(export.value(0, "demographics_region"), Some(&json!("north")));
        assert_eq!(export.value(0, "demographics_device"), Some(&Value::Null));
        assert_eq!(export.value(1, "explanation"), Some(&Value::Null));
    }

    #[test]
    fn test_expand_demographics_extra() {
        let mut row = flat(&[
            ("demographics_age", json!("30")),
            ("demographics_extra", json!(r#"{"region":"north","age":"99"}"#)),
        ]);
        expand_demographics_extra(&mut row).unwrap();

        assert_eq!(row["demographics_region"], "north");
        // Dedicated column wins over a colliding extra key
        assert_eq!(row["demographics_age"], "30");
        assert!(!row.contains_key("demographics_extra"));
    }

    #[test]
    fn test_expand_rejects_non_object() {
        let mut row = flat(&[("demographics_extra", json!("[1,2]"))]);
        assert!(matches!(
            expand_demographics_extra(&mut row),
            Err(StoreError::Corrupt(_))
        ));
    }
}
