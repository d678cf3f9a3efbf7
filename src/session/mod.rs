mod binder;
mod file_store;
mod handle;
mod memory_store;
mod policy;
mod resolver;
mod store;

#[cfg(feature = "dynamodb")]
mod dynamo_store;
#[cfg(feature = "sqlx_postgres")]
mod postgres_store;

pub use binder::{BoundSession, SessionBinder};
#[cfg(feature = "dynamodb")]
pub use dynamo_store::DynamoSessionStore;
pub use file_store::FileSessionStore;
pub use handle::Session;
pub use memory_store::InMemorySessionStore;
pub use policy::{ExpiryPolicy, PolicyOutcome};
#[cfg(feature = "sqlx_postgres")]
pub use postgres_store::PostgresSessionStore;
pub use resolver::{CookieMap, KeyLookup, KeyResolver};
pub use store::SessionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application session state: an arbitrary JSON object.
pub type SessionData = serde_json::Map<String, serde_json::Value>;

/// A stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(skip)]
    pub key: String,
    #[serde(rename = "expires", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub data: SessionData,
}

impl SessionRecord {
    pub fn new(key: impl Into<String>, expires_at: DateTime<Utc>, data: SessionData) -> Self {
        Self {
            key: key.into(),
            expires_at,
            data,
        }
    }

    /// A record is dead from its expiry instant onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
