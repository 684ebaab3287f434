//! The session store boundary.
//!
//! The lifecycle engine only ever talks to this narrow CRUD interface;
//! the daemon decides what actually backs it. `MemoryStore` is the
//! reference implementation, used in tests and single-node trials.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use thiserror::Error;

use waypoint_core::{IdentityKey, Session};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a session with this identity already exists")]
    DuplicateIdentity,

    #[error("session not found")]
    NotFound,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Durable CRUD plus time-indexed queries over sessions.
///
/// `list_since` returns only sessions with `updated_at > deadline`,
/// ordered ascending by username (case-sensitive). `purge_older_than`
/// removes exactly the sessions with `updated_at < deadline`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a brand-new session. Assigns the public sequence id and
    /// returns the stored record.
    async fn create(&self, session: &Session) -> Result<Session, StoreError>;

    /// Overwrite an existing session in place, keyed on its identity key.
    async fn update(&self, session: &Session) -> Result<(), StoreError>;

    /// Bump `updated_at` and nothing else.
    async fn touch(&self, key: &IdentityKey, when: DateTime<Utc>) -> Result<(), StoreError>;

    async fn get_by_identity_key(&self, key: &IdentityKey)
        -> Result<Option<Session>, StoreError>;

    async fn get_by_sequence_id(&self, id: i32) -> Result<Option<Session>, StoreError>;

    async fn list_since(&self, deadline: DateTime<Utc>) -> Result<Vec<Session>, StoreError>;

    /// Returns the number of sessions removed.
    async fn purge_older_than(&self, deadline: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// In-memory store backed by a concurrent map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<DashMap<IdentityKey, Session>>,
    next_sequence: Arc<AtomicI32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: &Session) -> Result<Session, StoreError> {
        if self.sessions.contains_key(&session.identity_key) {
            return Err(StoreError::DuplicateIdentity);
        }
        let mut stored = session.clone();
        stored.sequence_id = self.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions.insert(stored.identity_key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, session: &Session) -> Result<(), StoreError> {
        match self.sessions.get_mut(&session.identity_key) {
            Some(mut entry) => {
                *entry = session.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn touch(&self, key: &IdentityKey, when: DateTime<Utc>) -> Result<(), StoreError> {
        match self.sessions.get_mut(key) {
            Some(mut entry) => {
                entry.updated_at = when;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_by_identity_key(
        &self,
        key: &IdentityKey,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(key).map(|entry| entry.clone()))
    }

    async fn get_by_sequence_id(&self, id: i32) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .iter()
            .find(|entry| entry.sequence_id == id)
            .map(|entry| entry.clone()))
    }

    async fn list_since(&self, deadline: DateTime<Utc>) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| entry.updated_at > deadline)
            .map(|entry| entry.clone())
            .collect();
        sessions.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(sessions)
    }

    async fn purge_older_than(&self, deadline: DateTime<Utc>) -> Result<u64, StoreError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.updated_at >= deadline);
        Ok((before - self.sessions.len()) as u64)
    }
}
