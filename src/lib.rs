//! Session persistence keyed by an opaque token carried in a cookie or header.
//!
//! A [`SessionBinder`](session::SessionBinder) resolves the session key of an
//! inbound request, loads the stored payload from a
//! [`SessionStore`](session::SessionStore), hands a mutable
//! [`Session`](session::Session) to handlers and persists it once when the
//! response is finalized. Expiration slides forward in `active_duration`
//! steps while the session stays in use.
//!
//! ```rust,ignore
//! use sessiontoken::config::{ExpiryConfig, SessionConfig};
//! use sessiontoken::session::{FileSessionStore, SessionBinder};
//!
//! let store = FileSessionStore::new(".session", ExpiryConfig::default());
//! let binder = SessionBinder::new(store, SessionConfig::with_cookie("sid"))?;
//! ```

pub mod api;
pub mod config;
pub mod crypto;
pub mod session;

pub use config::{ExpiryConfig, SaveMode, SessionConfig};
pub use session::{
    FileSessionStore, InMemorySessionStore, Session, SessionBinder, SessionData, SessionRecord,
    SessionStore,
};

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Backend I/O or database failure.
    Storage(String),
    /// The session file exists but could not be parsed.
    Corrupt(String),
    Serialization(String),
    ConfigurationError(String),
    Internal(String),
}

impl std::error::Error for SessionError {}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Storage(msg) => write!(f, "Storage error: {msg}"),
            SessionError::Corrupt(msg) => write!(f, "Corrupt session store: {msg}"),
            SessionError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            SessionError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            SessionError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Shortens a session key for log output.
pub(crate) fn key_prefix(key: &str) -> String {
    format!("{}...", key.chars().take(8).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::Corrupt("expected value at line 1".to_owned());
        assert_eq!(
            err.to_string(),
            "Corrupt session store: expected value at line 1"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(SessionError::from(err), SessionError::Serialization(_)));
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("abcdefghijklmnop"), "abcdefgh...");
        assert_eq!(key_prefix("abc"), "abc...");
    }
}
