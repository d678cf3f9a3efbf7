//! In-memory session storage.
//!
//! Suitable for development, testing, and single-instance deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::policy::ExpiryPolicy;
use super::store::SessionStore;
use super::{SessionData, SessionRecord};
use crate::SessionError;
use crate::config::ExpiryConfig;

/// In-memory session storage.
///
/// Stores records in a `HashMap` protected by a `RwLock`. Clones share the
/// same map, so a clone kept by a test observes writes made through the binder.
///
/// # Note
///
/// Sessions are lost when the process restarts.
/// For persistent storage, use [`FileSessionStore`](super::FileSessionStore).
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    writes: Arc<AtomicU64>,
    policy: ExpiryPolicy,
}

impl InMemorySessionStore {
    pub fn new(config: ExpiryConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            writes: Arc::new(AtomicU64::new(0)),
            policy: ExpiryPolicy::new(config),
        }
    }

    /// Returns the number of records currently stored, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of inserts, replacements and deletions performed so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reads a record without applying expiry rules.
    pub fn peek(&self, key: &str) -> Option<SessionRecord> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(key).cloned())
    }

    /// Stores a record as-is, bypassing the expiry policy.
    pub fn insert(&self, record: SessionRecord) -> Result<(), SessionError> {
        self.sessions
            .write()
            .map_err(|_| SessionError::Internal("Lock poisoned".to_owned()))?
            .insert(record.key.clone(), record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(ExpiryConfig::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        let record = self
            .sessions
            .read()
            .map_err(|_| SessionError::Internal("Lock poisoned".to_owned()))?
            .get(key)
            .cloned();

        match record {
            Some(record) if record.is_expired_at(Utc::now()) => {
                self.destroy(key).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn update(
        &self,
        key: &str,
        data: Option<SessionData>,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::Internal("Lock poisoned".to_owned()))?;

        let existing = sessions.get(key).cloned();
        let Some(record) = self
            .policy
            .apply(key, Utc::now(), existing, data)
            .into_dirty_record()
        else {
            return Ok(None);
        };

        sessions.insert(key.to_owned(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(record))
    }

    async fn destroy(&self, key: &str) -> Result<(), SessionError> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| SessionError::Internal("Lock poisoned".to_owned()))?
            .remove(key);

        if removed.is_some() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn prune_expired(&self) -> Result<u64, SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::Internal("Lock poisoned".to_owned()))?;

        let now = Utc::now();
        let before_count = sessions.len();

        sessions.retain(|_, record| !record.is_expired_at(now));

        let pruned = u64::try_from(before_count.saturating_sub(sessions.len())).unwrap_or(u64::MAX);
        self.writes.fetch_add(pruned, Ordering::SeqCst);
        Ok(pruned)
    }
}
