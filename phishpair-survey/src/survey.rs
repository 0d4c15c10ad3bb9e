//! Survey service
//!
//! Orchestrates one participant's flow: begin, demographics, trials,
//! reset, plus the bulk export. Every operation loads the session from
//! the session store, applies one state transition and saves it back.
//! A trial is persisted before the cursor moves past it.

use crate::content::{ContentError, ContentResolver, EmailContent};
use crate::corpus::{CorpusError, CorpusIndex};
use crate::recorder::{RecordError, ResponseRecorder, TrialInput};
use crate::sampler::{self, SamplerError};
use crate::session::{Demographics, DemographicsOutcome, Preserve, SessionError, SessionState};
use crate::store::{InsertOutcome, ResponseExport, ResponseStore, SessionStore, StoreError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Survey service errors
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(Uuid),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Survey parameters
#[derive(Debug, Clone)]
pub struct SurveySettings {
    /// Corpus directory
    pub emails_dir: PathBuf,
    /// Pairs per session
    pub num_pairs: usize,
}

/// What the participant sees next
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialView {
    Trial {
        pair_number: usize,
        total_pairs: usize,
        left: EmailContent,
        right: EmailContent,
    },
    /// Trial stored and cursor moved, but the next pair could not be
    /// shown; fetching the trial again retries it
    Pending {
        pair_number: usize,
        total_pairs: usize,
    },
    Complete {
        total_pairs: usize,
    },
}

impl TrialView {
    pub fn is_complete(&self) -> bool {
        matches!(self, TrialView::Complete { .. })
    }
}

/// Survey service shared by all request handlers
pub struct SurveyService {
    settings: SurveySettings,
    sessions: Arc<dyn SessionStore>,
    responses: Arc<dyn ResponseStore>,
    recorder: ResponseRecorder,
    content: Arc<dyn ContentResolver>,
    rng: Mutex<StdRng>,
}

impl SurveyService {
    pub fn new(
        settings: SurveySettings,
        sessions: Arc<dyn SessionStore>,
        responses: Arc<dyn ResponseStore>,
        content: Arc<dyn ContentResolver>,
    ) -> Self {
        Self::with_rng(settings, sessions, responses, content, StdRng::from_entropy())
    }

    /// Build with a caller-supplied RNG (seeded in tests)
    pub fn with_rng(
        settings: SurveySettings,
        sessions: Arc<dyn SessionStore>,
        responses: Arc<dyn ResponseStore>,
        content: Arc<dyn ContentResolver>,
        rng: StdRng,
    ) -> Self {
        Self {
            settings,
            recorder: ResponseRecorder::new(responses.clone()),
            sessions,
            responses,
            content,
            rng: Mutex::new(rng),
        }
    }

    pub fn settings(&self) -> &SurveySettings {
        &self.settings
    }

    /// Start a new participant
    pub async fn begin(&self) -> Result<SessionState, SurveyError> {
        let state = SessionState::begin(Uuid::new_v4(), self.settings.num_pairs);
        self.sessions.save(&state).await?;
        info!(
            "Participant {} started session {}",
            state.participant_id(),
            state.session_id()
        );
        Ok(state)
    }

    /// Current session of a participant
    pub async fn session(&self, participant_id: Uuid) -> Result<SessionState, SurveyError> {
        self.sessions
            .load(participant_id)
            .await?
            .ok_or(SurveyError::UnknownParticipant(participant_id))
    }

    /// Store demographics; a repeat submission is skipped, not overwritten
    pub async fn record_demographics(
        &self,
        participant_id: Uuid,
        data: Demographics,
    ) -> Result<DemographicsOutcome, SurveyError> {
        let mut state = self.session(participant_id).await?;
        let outcome = state.record_demographics(data);
        match outcome {
            DemographicsOutcome::Recorded => {
                self.sessions.save(&state).await?;
                debug!("Demographics recorded for {}", participant_id);
            }
            DemographicsOutcome::AlreadyRecorded => {
                debug!("Demographics already on file for {}, skipping", participant_id);
            }
        }
        Ok(outcome)
    }

    /// The trial at the cursor, sampling the sequence on first access
    pub async fn trial_view(&self, participant_id: Uuid) -> Result<TrialView, SurveyError> {
        let mut state = self.session(participant_id).await?;
        self.view_for(&mut state).await
    }

    /// Record the trial at the cursor and move on
    pub async fn submit(
        &self,
        participant_id: Uuid,
        input: TrialInput,
    ) -> Result<TrialView, SurveyError> {
        let mut state = self.session(participant_id).await?;

        let recorded = self.recorder.record(&state, input).await?;
        if recorded.outcome == InsertOutcome::Duplicate {
            info!(
                "Pair {} of session {} was stored earlier; advancing without a second insert",
                recorded.record.pair_number,
                state.session_id()
            );
        }

        state.advance()?;
        self.sessions.save(&state).await?;

        if state.is_complete() {
            info!(
                "Participant {} completed session {} ({} pairs)",
                participant_id,
                state.session_id(),
                state.total_pairs()
            );
        }

        // The submission is committed; a failure here only concerns the next pair
        match self.view_for(&mut state).await {
            Ok(view) => Ok(view),
            Err(e) => {
                warn!(
                    "Pair {} of session {} recorded, next pair unavailable: {}",
                    state.pair_number() - 1,
                    state.session_id(),
                    e
                );
                Ok(TrialView::Pending {
                    pair_number: state.pair_number(),
                    total_pairs: state.total_pairs(),
                })
            }
        }
    }

    /// Start over with a fresh sequence, keeping identity and demographics
    pub async fn reset(&self, participant_id: Uuid) -> Result<SessionState, SurveyError> {
        let state = self.session(participant_id).await?;
        let next = state.reset(Preserve::ALL);
        self.sessions.save(&next).await?;
        info!(
            "Participant {} reset: session {} replaced by {}",
            participant_id,
            state.session_id(),
            next.session_id()
        );
        Ok(next)
    }

    /// Every recorded response
    pub async fn export(&self) -> Result<ResponseExport, SurveyError> {
        Ok(self.responses.export().await?)
    }

    async fn view_for(&self, state: &mut SessionState) -> Result<TrialView, SurveyError> {
        if state.is_complete() {
            return Ok(TrialView::Complete {
                total_pairs: state.total_pairs(),
            });
        }

        if state.sequence().is_none() {
            let corpus = CorpusIndex::scan(&self.settings.emails_dir)?;
            let mut rng = self.rng.lock().await;
            state.ensure_sequence(|count| sampler::sample(&corpus, count, &mut *rng))?;
            drop(rng);

            self.sessions.save(state).await?;
            debug!(
                "Sampled {} pairs for session {} from {} items",
                state.total_pairs(),
                state.session_id(),
                corpus.len()
            );
        }

        let pair = state.current_pair()?;
        let left = self.content.resolve(&pair.left).await?;
        let right = self.content.resolve(&pair.right).await?;

        Ok(TrialView::Trial {
            pair_number: state.pair_number(),
            total_pairs: state.total_pairs(),
            left,
            right,
        })
    }
}
