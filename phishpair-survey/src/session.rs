//! Per-participant survey progress
//!
//! A `SessionState` is owned by exactly one participant and is passed into
//! and returned from every operation; persistence is the caller's job (see
//! `store::SessionStore`). The pair sequence is sampled lazily, on first
//! access to the trial flow, and the cursor only moves after the trial at
//! the cursor has been recorded.

use crate::sampler::{Pair, SampledSequence, SamplerError};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Free-form demographic answers
pub type Demographics = BTreeMap<String, String>;

/// Session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Every pair of the sequence has been answered
    #[error("Survey already complete ({position} of {total_pairs} pairs answered)")]
    OutOfSequence { position: usize, total_pairs: usize },

    /// Trial flow accessed before the sequence was sampled
    #[error("Pair sequence has not been sampled yet")]
    SequenceNotStarted,
}

/// Result of submitting demographics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DemographicsOutcome {
    Recorded,
    /// Answers were already on file; the new submission was ignored
    AlreadyRecorded,
}

/// What a reset carries over from the previous attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preserve {
    pub identity: bool,
    pub demographics: bool,
}

impl Preserve {
    pub const ALL: Preserve = Preserve {
        identity: true,
        demographics: true,
    };

    pub const NOTHING: Preserve = Preserve {
        identity: false,
        demographics: false,
    };
}

/// Survey progress of one participant
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    participant_id: Uuid,
    session_id: Uuid,
    demographics: Option<Demographics>,
    sequence: Option<SampledSequence>,
    position: usize,
    total_pairs: usize,
}

impl SessionState {
    /// Fresh session: no demographics, no sequence, cursor at 0
    pub fn begin(participant_id: Uuid, total_pairs: usize) -> Self {
        Self {
            participant_id,
            session_id: Uuid::new_v4(),
            demographics: None,
            sequence: None,
            position: 0,
            total_pairs,
        }
    }

    /// Rebuild a session loaded from storage
    pub fn restore(
        participant_id: Uuid,
        session_id: Uuid,
        demographics: Option<Demographics>,
        sequence: Option<SampledSequence>,
        position: usize,
        total_pairs: usize,
    ) -> Self {
        Self {
            participant_id,
            session_id,
            demographics,
            sequence,
            position: position.min(total_pairs),
            total_pairs,
        }
    }

    pub fn participant_id(&self) -> Uuid {
        self.participant_id
    }

    /// Per-attempt identity, renewed by every reset
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn demographics(&self) -> Option<&Demographics> {
        self.demographics.as_ref()
    }

    pub fn sequence(&self) -> Option<&SampledSequence> {
        self.sequence.as_ref()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn total_pairs(&self) -> usize {
        self.total_pairs
    }

    /// 1-based number of the trial at the cursor
    pub fn pair_number(&self) -> usize {
        self.position + 1
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.total_pairs
    }

    /// Store demographics once; later submissions leave them untouched
    pub fn record_demographics(&mut self, data: Demographics) -> DemographicsOutcome {
        if self.demographics.is_some() {
            return DemographicsOutcome::AlreadyRecorded;
        }
        self.demographics = Some(data);
        DemographicsOutcome::Recorded
    }

    /// Sample the pair sequence unless one exists; returns whether it sampled now
    pub fn ensure_sequence<F>(&mut self, draw: F) -> Result<bool, SamplerError>
    where
        F: FnOnce(usize) -> Result<SampledSequence, SamplerError>,
    {
        if self.sequence.is_some() {
            return Ok(false);
        }
        let sequence = draw(self.total_pairs)?;
        self.sequence = Some(sequence);
        Ok(true)
    }

    /// Pair at the cursor
    pub fn current_pair(&self) -> Result<&Pair, SessionError> {
        if self.is_complete() {
            return Err(self.out_of_sequence());
        }
        let sequence = self.sequence.as_ref().ok_or(SessionError::SequenceNotStarted)?;
        sequence
            .get(self.position)
            .ok_or_else(|| self.out_of_sequence())
    }

    /// Move past the trial at the cursor
    ///
    /// Call only after that trial has been persisted.
    pub fn advance(&mut self) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(self.out_of_sequence());
        }
        if self.sequence.is_none() {
            return Err(SessionError::SequenceNotStarted);
        }
        self.position += 1;
        Ok(())
    }

    /// Start a new attempt: sequence and cursor cleared, new session id
    pub fn reset(&self, preserve: Preserve) -> SessionState {
        let participant_id = if preserve.identity {
            self.participant_id
        } else {
            Uuid::new_v4()
        };

        let mut next = SessionState::begin(participant_id, self.total_pairs);
        if preserve.demographics {
            next.demographics = self.demographics.clone();
        }
        next
    }

    fn out_of_sequence(&self) -> SessionError {
        SessionError::OutOfSequence {
            position: self.position,
            total_pairs: self.total_pairs,
        }
    }
}
