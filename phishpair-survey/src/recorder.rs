//! Response recorder
//!
//! Validates one trial submission against the session cursor, enriches it
//! with the type and tags encoded in each filename, and appends it to the
//! response store. Persisting happens exactly once per trial; the caller
//! advances the session only after `record` succeeded.

use crate::corpus;
use crate::session::{Demographics, SessionError, SessionState};
use crate::store::{InsertOutcome, ResponseStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Prefix of flattened demographic fields
pub const DEMOGRAPHICS_PREFIX: &str = "demographics_";

/// Trial recording errors
#[derive(Debug, Error)]
pub enum RecordError {
    /// Session complete or not started
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Submitted pair number is not the one at the cursor
    #[error("Pair number mismatch: expected {expected}, got {submitted}")]
    PairNumberMismatch { expected: usize, submitted: usize },

    /// Selected email is neither of the two shown
    #[error("Invalid selection '{selected}': must be '{left}' or '{right}'")]
    InvalidSelection {
        selected: String,
        left: String,
        right: String,
    },

    /// View time is negative or not a number
    #[error("Invalid view time: {0}")]
    InvalidViewTime(f64),

    /// Storage rejected the insert
    #[error("Failed to persist response: {0}")]
    PersistFailure(#[from] StoreError),
}

/// One trial as submitted by the presentation layer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrialInput {
    pub pair_number: usize,
    pub email_left: String,
    pub email_right: String,
    pub selected_email: String,
    #[serde(default)]
    pub explanation: String,
    /// Milliseconds the pair was on screen
    pub view_time: f64,
}

/// One persisted trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub response_id: Uuid,
    pub session_id: Uuid,
    pub pair_number: usize,
    pub email_left: String,
    pub email_right: String,
    pub selected_email: String,
    pub email_left_type: String,
    pub email_left_tags: Vec<String>,
    pub email_right_type: String,
    pub email_right_tags: Vec<String>,
    pub selected_email_type: String,
    pub selected_email_tags: Vec<String>,
    pub explanation: String,
    pub view_time: f64,
    pub demographics: Demographics,
    pub timestamp: DateTime<Utc>,
}

impl ResponseRecord {
    /// Column-named view with demographics flattened to `demographics_<key>`
    pub fn to_flat(&self) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("response_id".into(), self.response_id.to_string().into());
        row.insert("session_id".into(), self.session_id.to_string().into());
        row.insert("pair_number".into(), (self.pair_number as u64).into());
        row.insert("email_left".into(), self.email_left.clone().into());
        row.insert("email_right".into(), self.email_right.clone().into());
        row.insert("selected_email".into(), self.selected_email.clone().into());
        row.insert("email_left_type".into(), self.email_left_type.clone().into());
        row.insert("email_left_tags".into(), self.email_left_tags.join(",").into());
        row.insert("email_right_type".into(), self.email_right_type.clone().into());
        row.insert("email_right_tags".into(), self.email_right_tags.join(",").into());
        row.insert("selected_email_type".into(), self.selected_email_type.clone().into());
        row.insert(
            "selected_email_tags".into(),
            self.selected_email_tags.join(",").into(),
        );
        row.insert("explanation".into(), self.explanation.clone().into());
        row.insert("view_time".into(), Value::from(self.view_time));
        for (key, value) in &self.demographics {
            row.insert(format!("{}{}", DEMOGRAPHICS_PREFIX, key), value.clone().into());
        }
        row.insert(
            "timestamp".into(),
            phishpair_common::time::to_storage(&self.timestamp).into(),
        );
        row
    }
}

/// Validate a submission and build its record (no I/O)
///
/// `selected_email` must equal one of the two shown filenames byte for
/// byte; no case or path normalization is applied.
pub fn build_record(session: &SessionState, input: TrialInput) -> Result<ResponseRecord, RecordError> {
    // Fails when complete or not started
    session.current_pair()?;

    let expected = session.pair_number();
    if input.pair_number != expected {
        return Err(RecordError::PairNumberMismatch {
            expected,
            submitted: input.pair_number,
        });
    }

    if input.selected_email != input.email_left && input.selected_email != input.email_right {
        return Err(RecordError::InvalidSelection {
            selected: input.selected_email,
            left: input.email_left,
            right: input.email_right,
        });
    }

    if !input.view_time.is_finite() || input.view_time < 0.0 {
        return Err(RecordError::InvalidViewTime(input.view_time));
    }

    let left = corpus::parse(&input.email_left);
    let right = corpus::parse(&input.email_right);
    let selected = corpus::parse(&input.selected_email);

    Ok(ResponseRecord {
        response_id: phishpair_common::uuid_utils::generate(),
        session_id: session.session_id(),
        pair_number: input.pair_number,
        email_left_type: left.category.to_string(),
        email_left_tags: left.tags,
        email_right_type: right.category.to_string(),
        email_right_tags: right.tags,
        selected_email_type: selected.category.to_string(),
        selected_email_tags: selected.tags,
        email_left: input.email_left,
        email_right: input.email_right,
        selected_email: input.selected_email,
        explanation: input.explanation,
        view_time: input.view_time,
        demographics: session.demographics().cloned().unwrap_or_default(),
        timestamp: phishpair_common::time::now(),
    })
}

/// A trial that is now in the store
#[derive(Debug, Clone)]
pub struct RecordedTrial {
    pub record: ResponseRecord,
    /// `Duplicate` when an earlier submission of this trial was already stored
    pub outcome: InsertOutcome,
}

/// Persists validated trials through the response store
#[derive(Clone)]
pub struct ResponseRecorder {
    store: Arc<dyn ResponseStore>,
}

impl ResponseRecorder {
    pub fn new(store: Arc<dyn ResponseStore>) -> Self {
        Self { store }
    }

    /// Validate, enrich and append one trial
    pub async fn record(
        &self,
        session: &SessionState,
        input: TrialInput,
    ) -> Result<RecordedTrial, RecordError> {
        let record = build_record(session, input)?;

        let outcome = self.store.insert(&record).await.map_err(|e| {
            error!(
                "Persisting pair {} of session {} failed: {}",
                record.pair_number, record.session_id, e
            );
            RecordError::PersistFailure(e)
        })?;

        match outcome {
            InsertOutcome::Inserted => debug!(
                "Recorded pair {} of session {} as {}",
                record.pair_number, record.session_id, record.response_id
            ),
            InsertOutcome::Duplicate => warn!(
                "Pair {} of session {} was already recorded - keeping the stored response",
                record.pair_number, record.session_id
            ),
        }

        Ok(RecordedTrial { record, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{sequence_from_pairs, Pair};
    use crate::store::memory::MemoryResponseStore;

    fn session_with(pairs: Vec<Pair>) -> SessionState {
        let total = pairs.len();
        let mut session = SessionState::begin(Uuid::new_v4(), total);
        session
            .ensure_sequence(|_| Ok(sequence_from_pairs(pairs)))
            .unwrap();
        let mut demographics = Demographics::new();
        demographics.insert("age".to_string(), "34".to_string());
        demographics.insert("experience".to_string(), "some".to_string());
        session.record_demographics(demographics);
        session
    }

    fn input(pair_number: usize, selected: &str) -> TrialInput {
        TrialInput {
            pair_number,
            email_left: "phish_urgency_authority_bank.html".to_string(),
            email_right: "regular_invoice.pdf".to_string(),
            selected_email: selected.to_string(),
            explanation: "odd sender".to_string(),
            view_time: 1500.0,
        }
    }

    fn default_session() -> SessionState {
        session_with(vec![
            Pair::new("phish_urgency_authority_bank.html", "regular_invoice.pdf"),
            Pair::new("ai_offer.html", "regular_invoice.pdf"),
        ])
    }

    #[test]
    fn test_build_record_enriches_from_filenames() {
        let session = default_session();
        let record = build_record(&session, input(1, "phish_urgency_authority_bank.html")).unwrap();

        assert_eq!(record.session_id, session.session_id());
        assert_eq!(record.email_left_type, "phish");
        assert_eq!(record.email_left_tags, vec!["urgency", "authority"]);
        assert_eq!(record.email_right_type, "regular");
        assert!(record.email_right_tags.is_empty());
        assert_eq!(record.selected_email_type, "phish");
        assert_eq!(record.selected_email_tags, record.email_left_tags);
        assert_eq!(record.demographics["age"], "34");
    }

    #[test]
    fn test_response_ids_are_fresh_per_call() {
        let session = default_session();
        let a = build_record(&session, input(1, "regular_invoice.pdf")).unwrap();
        let b = build_record(&session, input(1, "regular_invoice.pdf")).unwrap();
        assert_ne!(a.response_id, b.response_id);
        assert_ne!(a.response_id, session.participant_id());
    }

    #[test]
    fn test_invalid_selection_rejected() {
        let session = default_session();
        let err = build_record(&session, input(1, "ai_offer.html")).unwrap_err();
        assert!(matches!(err, RecordError::InvalidSelection { .. }));

        // No normalization: a case variant is a different file
        let err = build_record(&session, input(1, "REGULAR_INVOICE.PDF")).unwrap_err();
        assert!(matches!(err, RecordError::InvalidSelection { .. }));
    }

    #[test]
    fn test_pair_number_must_match_cursor() {
        let session = default_session();
        let err = build_record(&session, input(2, "regular_invoice.pdf")).unwrap_err();
        assert!(matches!(
            err,
            RecordError::PairNumberMismatch {
                expected: 1,
                submitted: 2
            }
        ));
    }

    #[test]
    fn test_completed_session_rejected() {
        let mut session = default_session();
        session.advance().unwrap();
        session.advance().unwrap();
        let err = build_record(&session, input(3, "regular_invoice.pdf")).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Session(SessionError::OutOfSequence { .. })
        ));
    }

    #[test]
    fn test_negative_view_time_rejected() {
        let session = default_session();
        let mut bad = input(1, "regular_invoice.pdf");
        bad.view_time = -5.0;
        assert!(matches!(
            build_record(&session, bad),
            Err(RecordError::InvalidViewTime(_))
        ));
    }

    #[test]
    fn test_flat_view_prefixes_demographics() {
        let session = default_session();
        let record = build_record(&session, input(1, "regular_invoice.pdf")).unwrap();
        let flat = record.to_flat();
        assert_eq!(flat["demographics_age"], "34");
        assert_eq!(flat["demographics_experience"], "some");
        assert_eq!(flat["email_left_tags"], "urgency,authority");
        assert_eq!(flat["pair_number"], 1);
        assert!(!flat.contains_key("age"));
    }

    #[tokio::test]
    async fn test_record_then_duplicate() {
        let store = Arc::new(MemoryResponseStore::new());
        let recorder = ResponseRecorder::new(store.clone());
        let session = default_session();

        let first = recorder
            .record(&session, input(1, "regular_invoice.pdf"))
            .await
            .unwrap();
        assert_eq!(first.outcome, InsertOutcome::Inserted);

        // Resubmission before the cursor moved (e.g. crash between record and advance)
        let second = recorder
            .record(&session, input(1, "regular_invoice.pdf"))
            .await
            .unwrap();
        assert_eq!(second.outcome, InsertOutcome::Duplicate);

        assert_eq!(store.export().await.unwrap().rows.len(), 1);
    }
}
