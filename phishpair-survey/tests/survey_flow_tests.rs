//! Integration tests for the survey flow over SQLite storage
//!
//! Tests cover:
//! - Full 10-trial session on a 12-item corpus
//! - Reset after completion
//! - Rejected submissions leave the cursor alone
//! - Demographics are written once
//! - Progress survives a restart

use phishpair_common::db::init_database;
use phishpair_survey::content::FsContentResolver;
use phishpair_survey::recorder::{RecordError, TrialInput};
use phishpair_survey::session::{Demographics, DemographicsOutcome};
use phishpair_survey::store::{SqliteResponseStore, SqliteSessionStore};
use phishpair_survey::survey::{SurveyError, SurveyService, SurveySettings, TrialView};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const CORPUS: [&str; 12] = [
    "phish_urgency_authority_bank.html",
    "phish_scarcity_prize.html",
    "phish_liking_friend.pdf",
    "phish_reset.htm",
    "ai_social-proof_webinar.html",
    "ai_reciprocation_gift.html",
    "ai_newsletter.pdf",
    "ai_consistency_survey.html",
    "regular_invoice.html",
    "regular_meeting.html",
    "regular_receipt.pdf",
    "regular_welcome.html",
];

fn write_corpus(dir: &Path) {
    for name in CORPUS {
        let body = if name.ends_with(".pdf") {
            "%PDF-1.4".to_string()
        } else {
            format!("<html><body>{}</body></html>", name)
        };
        fs::write(dir.join(name), body).unwrap();
    }
    // Ineligible neighbours
    fs::write(dir.join("README.md"), "notes").unwrap();
    fs::write(dir.join("draft_phish.html"), "x").unwrap();
}

async fn open_service(root: &Path, emails: &Path, seed: u64) -> SurveyService {
    let pool = init_database(&root.join("phishpair.db")).await.unwrap();
    let responses = SqliteResponseStore::open(pool.clone()).await.unwrap();
    SurveyService::with_rng(
        SurveySettings {
            emails_dir: emails.to_path_buf(),
            num_pairs: 10,
        },
        Arc::new(SqliteSessionStore::new(pool)),
        Arc::new(responses),
        Arc::new(FsContentResolver::new(emails)),
        StdRng::seed_from_u64(seed),
    )
}

fn pick_left(view: &TrialView, explanation: &str) -> TrialInput {
    match view {
        TrialView::Trial {
            pair_number,
            left,
            right,
            ..
        } => TrialInput {
            pair_number: *pair_number,
            email_left: left.filename.clone(),
            email_right: right.filename.clone(),
            selected_email: left.filename.clone(),
            explanation: explanation.to_string(),
            view_time: 1500.0,
        },
        other => panic!("expected a trial, got {:?}", other),
    }
}

fn demographics(age: &str) -> Demographics {
    let mut d = Demographics::new();
    d.insert("age".to_string(), age.to_string());
    d.insert("experience".to_string(), "intermediate".to_string());
    d.insert("occupation".to_string(), "nurse".to_string());
    d
}

#[tokio::test]
async fn test_end_to_end_ten_trials() {
    let root = tempfile::tempdir().unwrap();
    let emails = tempfile::tempdir().unwrap();
    write_corpus(emails.path());
    let service = open_service(root.path(), emails.path(), 2024).await;

    let id = service.begin().await.unwrap().participant_id();
    assert_eq!(
        service.record_demographics(id, demographics("30")).await.unwrap(),
        DemographicsOutcome::Recorded
    );

    let mut view = service.trial_view(id).await.unwrap();
    let mut seen = HashSet::new();
    for k in 1..=10 {
        let input = pick_left(&view, "none");
        assert_eq!(input.pair_number, k);
        assert_ne!(input.email_left, input.email_right);
        let key = if input.email_left < input.email_right {
            (input.email_left.clone(), input.email_right.clone())
        } else {
            (input.email_right.clone(), input.email_left.clone())
        };
        assert!(seen.insert(key), "pair shown twice");

        view = service.submit(id, input).await.unwrap();
        assert_eq!(service.session(id).await.unwrap().position(), k);
    }

    assert_eq!(view, TrialView::Complete { total_pairs: 10 });
    assert_eq!(
        service.trial_view(id).await.unwrap(),
        TrialView::Complete { total_pairs: 10 }
    );
    assert_eq!(service.session(id).await.unwrap().position(), 10);

    let export = service.export().await.unwrap();
    assert_eq!(export.len(), 10);
    let session_id = service.session(id).await.unwrap().session_id().to_string();
    let mut response_ids = HashSet::new();
    for i in 0..export.len() {
        assert_eq!(
            export.value(i, "pair_number").and_then(Value::as_u64),
            Some(i as u64 + 1)
        );
        assert_eq!(export.value(i, "selected_email"), export.value(i, "email_left"));
        assert_eq!(export.value(i, "explanation"), Some(&json!("none")));
        assert_eq!(
            export.value(i, "view_time").and_then(Value::as_f64),
            Some(1500.0)
        );
        assert_eq!(export.value(i, "session_id"), Some(&json!(session_id)));
        assert_eq!(export.value(i, "demographics_age"), Some(&json!("30")));
        assert_eq!(
            export.value(i, "demographics_occupation"),
            Some(&json!("nurse"))
        );
        assert_eq!(
            export.value(i, "selected_email_type"),
            export.value(i, "email_left_type")
        );
        assert!(response_ids.insert(export.value(i, "response_id").cloned()));
    }

    // Participant identity is not part of the response rows
    assert!(!export.columns.iter().any(|c| c == "participant_id"));
    for row in &export.rows {
        assert!(!row.contains(&Value::String(id.to_string())));
    }
}

#[tokio::test]
async fn test_reset_after_completion() {
    let root = tempfile::tempdir().unwrap();
    let emails = tempfile::tempdir().unwrap();
    write_corpus(emails.path());
    let service = open_service(root.path(), emails.path(), 99).await;

    let first = service.begin().await.unwrap();
    let id = first.participant_id();
    service.record_demographics(id, demographics("52")).await.unwrap();

    let mut view = service.trial_view(id).await.unwrap();
    while !view.is_complete() {
        view = service.submit(id, pick_left(&view, "")).await.unwrap();
    }
    let finished = service.session(id).await.unwrap();

    let reset = service.reset(id).await.unwrap();
    assert_eq!(reset.participant_id(), id);
    assert_ne!(reset.session_id(), finished.session_id());
    assert_eq!(reset.demographics(), finished.demographics());
    assert_eq!(reset.position(), 0);
    assert!(reset.sequence().is_none());

    // Next access samples a fresh sequence
    let view = service.trial_view(id).await.unwrap();
    assert!(matches!(view, TrialView::Trial { pair_number: 1, .. }));
    let resumed = service.session(id).await.unwrap();
    assert_eq!(resumed.sequence().map(|s| s.len()), Some(10));

    // The new attempt can answer pair 1 again without a dedup conflict
    service.submit(id, pick_left(&view, "")).await.unwrap();
    assert_eq!(service.export().await.unwrap().len(), 11);
}

#[tokio::test]
async fn test_invalid_selection_keeps_position() {
    let root = tempfile::tempdir().unwrap();
    let emails = tempfile::tempdir().unwrap();
    write_corpus(emails.path());
    let service = open_service(root.path(), emails.path(), 7).await;

    let id = service.begin().await.unwrap().participant_id();
    let view = service.trial_view(id).await.unwrap();

    let mut input = pick_left(&view, "guess");
    input.selected_email = "regular_not_shown.html".to_string();
    let err = service.submit(id, input).await.unwrap_err();
    assert!(matches!(
        err,
        SurveyError::Record(RecordError::InvalidSelection { .. })
    ));

    let mut stale = pick_left(&view, "guess");
    stale.pair_number = 4;
    assert!(matches!(
        service.submit(id, stale).await,
        Err(SurveyError::Record(RecordError::PairNumberMismatch {
            expected: 1,
            submitted: 4
        }))
    ));

    assert_eq!(service.session(id).await.unwrap().position(), 0);
    assert!(service.export().await.unwrap().is_empty());
    assert_eq!(service.trial_view(id).await.unwrap(), view);
}

#[tokio::test]
async fn test_demographics_are_not_overwritten() {
    let root = tempfile::tempdir().unwrap();
    let emails = tempfile::tempdir().unwrap();
    write_corpus(emails.path());
    let service = open_service(root.path(), emails.path(), 1).await;

    let id = service.begin().await.unwrap().participant_id();
    service.record_demographics(id, demographics("21")).await.unwrap();
    assert_eq!(
        service.record_demographics(id, demographics("64")).await.unwrap(),
        DemographicsOutcome::AlreadyRecorded
    );

    let state = service.session(id).await.unwrap();
    assert_eq!(state.demographics().unwrap()["age"], "21");
}

#[tokio::test]
async fn test_progress_survives_restart() {
    let root = tempfile::tempdir().unwrap();
    let emails = tempfile::tempdir().unwrap();
    write_corpus(emails.path());

    let (id, next_view) = {
        let service = open_service(root.path(), emails.path(), 3).await;
        let id = service.begin().await.unwrap().participant_id();
        let view = service.trial_view(id).await.unwrap();
        let view = service.submit(id, pick_left(&view, "")).await.unwrap();
        let view = service.submit(id, pick_left(&view, "")).await.unwrap();
        (id, view)
    };

    let service = open_service(root.path(), emails.path(), 4).await;
    let state = service.session(id).await.unwrap();
    assert_eq!(state.position(), 2);
    assert_eq!(service.trial_view(id).await.unwrap(), next_view);
    assert_eq!(service.export().await.unwrap().len(), 2);

    assert!(matches!(
        service.trial_view(Uuid::new_v4()).await,
        Err(SurveyError::UnknownParticipant(_))
    ));
}
