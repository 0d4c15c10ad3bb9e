//! In-memory storage adapters

use super::{InsertOutcome, ResponseExport, ResponseStore, SessionStore, StoreError};
use crate::recorder::ResponseRecord;
use crate::session::SessionState;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct ResponseLog {
    records: Vec<ResponseRecord>,
    keys: HashSet<(Uuid, usize)>,
}

/// Response store kept in process memory; lost on exit
#[derive(Default)]
pub struct MemoryResponseStore {
    log: Mutex<ResponseLog>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn insert(&self, record: &ResponseRecord) -> Result<InsertOutcome, StoreError> {
        let mut log = self.log.lock().await;
        if !log.keys.insert((record.session_id, record.pair_number)) {
            return Ok(InsertOutcome::Duplicate);
        }
        log.records.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn export(&self) -> Result<ResponseExport, StoreError> {
        let log = self.log.lock().await;
        Ok(ResponseExport::from_flat_rows(
            log.records.iter().map(ResponseRecord::to_flat).collect(),
        ))
    }
}

/// Session store kept in process memory
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, participant_id: Uuid) -> Result<Option<SessionState>, StoreError> {
        Ok(self.sessions.read().await.get(&participant_id).cloned())
    }

    async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(state.participant_id(), state.clone());
        Ok(())
    }
}
