//! Configuration types for session persistence.
//!
//! Configuration is resolved once when a store or binder is constructed and
//! never mutated afterwards.
//!
//! # Example
//!
//! ```rust
//! use sessiontoken::config::{ExpiryConfig, SaveMode, SessionConfig};
//! use chrono::Duration;
//!
//! let expiry = ExpiryConfig {
//!     duration: Duration::minutes(30),
//!     active_duration: Duration::minutes(10),
//! };
//! assert!(expiry.validate().is_ok());
//!
//! let config = SessionConfig {
//!     token: Some("x-session-token".to_owned()),
//!     save_mode: SaveMode::NonEmpty,
//!     ..SessionConfig::with_cookie("sid")
//! };
//! assert!(config.validate().is_ok());
//! ```

use chrono::Duration;

/// Default lifetime of a fresh session: 20 minutes.
pub const DEFAULT_DURATION_MS: i64 = 20 * 60 * 1000;

/// Default renewal threshold and step: 5 minutes.
pub const DEFAULT_ACTIVE_DURATION_MS: i64 = 5 * 60 * 1000;

/// Lifetime settings shared by every store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryConfig {
    /// Lifetime granted to a freshly created session.
    ///
    /// Default: 20 minutes
    pub duration: Duration,

    /// When less than this remains, the expiry is pushed forward by the
    /// same amount.
    ///
    /// Default: 5 minutes
    pub active_duration: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            duration: Duration::milliseconds(DEFAULT_DURATION_MS),
            active_duration: Duration::milliseconds(DEFAULT_ACTIVE_DURATION_MS),
        }
    }
}

impl ExpiryConfig {
    /// Builds a config from millisecond values.
    pub fn from_millis(duration: i64, active_duration: i64) -> Self {
        Self {
            duration: Duration::milliseconds(duration),
            active_duration: Duration::milliseconds(active_duration),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.duration <= Duration::zero() {
            return Err("duration must be positive");
        }
        if self.active_duration <= Duration::zero() {
            return Err("active_duration must be positive");
        }
        if self.active_duration > self.duration {
            return Err("active_duration must not exceed duration");
        }
        Ok(())
    }
}

/// Decides when the binder writes session data back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Write data only when it differs from what was loaded.
    #[default]
    Changed,
    /// Write data whenever it is non-empty, changed or not.
    NonEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    None,
    #[default]
    Lax,
    Strict,
}

/// Request binding settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cookie carrying the session key.
    pub cookie: Option<String>,
    /// Header carrying the session key. Takes precedence over the cookie.
    pub token: Option<String>,
    /// Requests carrying this header are served without touching the store.
    pub ignore_header: Option<String>,
    pub save_mode: SaveMode,
    /// Length of generated session keys.
    pub key_length: usize,
    pub cookie_path: String,
    pub cookie_http_only: bool,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie: None,
            token: None,
            ignore_header: None,
            save_mode: SaveMode::Changed,
            key_length: crate::crypto::DEFAULT_KEY_LENGTH,
            cookie_path: "/".to_owned(),
            cookie_http_only: true,
            cookie_secure: false,
            cookie_same_site: SameSite::Lax,
        }
    }
}

impl SessionConfig {
    /// Keys are carried in the named cookie.
    pub fn with_cookie(name: impl Into<String>) -> Self {
        Self {
            cookie: Some(name.into()),
            ..Default::default()
        }
    }

    /// Keys are carried in the named request header.
    pub fn with_token(name: impl Into<String>) -> Self {
        Self {
            token: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.cookie.is_none() && self.token.is_none() {
            return Err("either cookie or token must be configured");
        }
        if self.cookie.as_deref().is_some_and(str::is_empty)
            || self.token.as_deref().is_some_and(str::is_empty)
        {
            return Err("cookie and token names must not be empty");
        }
        if self.key_length < 16 {
            return Err("key_length should be at least 16 characters");
        }
        Ok(())
    }
}
