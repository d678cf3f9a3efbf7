//! Session store trait.

use async_trait::async_trait;

use super::{SessionData, SessionRecord};
use crate::SessionError;

/// Durable storage for session records.
///
/// Implementations provide different storage backends:
/// - [`FileSessionStore`](super::FileSessionStore): one JSON file holding every session
/// - [`InMemorySessionStore`](super::InMemorySessionStore): process memory, for tests
/// - `PostgresSessionStore`: one JSONB row per session (`sqlx_postgres` feature)
/// - `DynamoSessionStore`: one item per session with native TTL (`dynamodb` feature)
///
/// Every write replaces the whole record. Two requests updating the same key
/// concurrently race and the later write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the live record for `key`.
    ///
    /// An expired record is deleted and reported as `None`. A missing key is
    /// `None`, never an error.
    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Applies the expiry policy to the stored record and writes it back when dirty.
    ///
    /// With `data` the payload is replaced; without it only a renewal is
    /// considered. Returns the record when a write happened.
    async fn update(
        &self,
        key: &str,
        data: Option<SessionData>,
    ) -> Result<Option<SessionRecord>, SessionError>;

    /// Removes the record for `key`, if any.
    async fn destroy(&self, key: &str) -> Result<(), SessionError>;

    /// Removes every expired record.
    ///
    /// Returns the number of records removed.
    async fn prune_expired(&self) -> Result<u64, SessionError>;
}
