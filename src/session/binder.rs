//! Per-request session lifecycle.
//!
//! [`SessionBinder::begin`] resolves or generates the key and loads the
//! payload; [`BoundSession::finalize`] persists it once, right before the
//! response leaves. The HTTP adapters in [`crate::api`] wire both ends into
//! axum and actix-web.

use std::sync::Arc;

use cookie::Cookie;

use super::handle::Session;
use super::resolver::{KeyLookup, KeyResolver};
use super::store::SessionStore;
use super::{SessionData, SessionRecord};
use crate::config::{SameSite, SaveMode, SessionConfig};
use crate::crypto::{KeyGenerator, RandomKeyGenerator};
use crate::{SessionError, key_prefix};

/// Binds requests to stored sessions.
///
/// Cheap to clone; clones share the store and configuration.
#[derive(Clone)]
pub struct SessionBinder {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
    resolver: KeyResolver,
    generator: Arc<dyn KeyGenerator>,
}

impl SessionBinder {
    /// Creates a binder over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConfigurationError`] when `config` fails validation.
    pub fn new(
        store: impl SessionStore + 'static,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Creates a binder over a store shared with other parts of the application.
    pub fn with_shared_store(
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config
            .validate()
            .map_err(|e| SessionError::ConfigurationError(e.to_owned()))?;

        Ok(Self {
            store,
            resolver: KeyResolver::from_config(&config),
            generator: Arc::new(RandomKeyGenerator::new(config.key_length)),
            config: Arc::new(config),
        })
    }

    /// Replaces the generator used for fresh session keys.
    #[must_use]
    pub fn with_key_generator(mut self, generator: impl KeyGenerator + 'static) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// True when the request carries the configured ignore header.
    ///
    /// Such requests must not load, create, renew or write a session.
    pub fn should_ignore(&self, headers: &impl KeyLookup) -> bool {
        self.config
            .ignore_header
            .as_deref()
            .is_some_and(|name| headers.lookup(name).is_some())
    }

    /// Resolves the session of a request.
    ///
    /// A resolved key is loaded from the store; a missing or expired record
    /// yields an empty payload. Without a key a fresh one is generated and
    /// nothing is stored until [`BoundSession::finalize`] sees data.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    pub async fn begin(
        &self,
        headers: &impl KeyLookup,
        cookies: &impl KeyLookup,
    ) -> Result<BoundSession, SessionError> {
        let (key, is_new, data) = match self.resolver.resolve(headers, cookies) {
            Some(key) => {
                let data = self
                    .store
                    .get(&key)
                    .await?
                    .map(|record| record.data)
                    .unwrap_or_default();
                (key, false, data)
            }
            None => {
                let key = self.generator.generate();
                log::debug!(
                    target: "sessiontoken",
                    "msg=\"new session key generated\", key=\"{}\"",
                    key_prefix(&key)
                );
                (key, true, SessionData::new())
            }
        };

        let set_cookie = if is_new {
            self.config
                .cookie
                .as_deref()
                .map(|name| build_cookie(&self.config, name, &key))
        } else {
            None
        };

        let token_header = if is_new {
            self.config.token.clone()
        } else {
            None
        };

        Ok(BoundSession {
            store: Arc::clone(&self.store),
            session: Session::new(key.clone(), is_new, data.clone()),
            key,
            original: data,
            save_mode: self.config.save_mode,
            set_cookie,
            token_header,
        })
    }
}

fn build_cookie(config: &SessionConfig, name: &str, key: &str) -> String {
    let same_site = match config.cookie_same_site {
        SameSite::None => cookie::SameSite::None,
        SameSite::Lax => cookie::SameSite::Lax,
        SameSite::Strict => cookie::SameSite::Strict,
    };

    Cookie::build((name.to_owned(), key.to_owned()))
        .path(config.cookie_path.clone())
        .http_only(config.cookie_http_only)
        .secure(config.cookie_secure)
        .same_site(same_site)
        .build()
        .to_string()
}

/// A session bound to one in-flight request.
///
/// [`finalize`](Self::finalize) consumes the binding, so a request persists
/// at most once. Dropping it without finalizing (an aborted request)
/// persists nothing.
pub struct BoundSession {
    store: Arc<dyn SessionStore>,
    session: Session,
    key: String,
    original: SessionData,
    save_mode: SaveMode,
    set_cookie: Option<String>,
    token_header: Option<String>,
}

impl BoundSession {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_new(&self) -> bool {
        self.session.is_new()
    }

    /// Handle exposed to request handlers.
    pub fn session(&self) -> Session {
        self.session.clone()
    }

    /// `Set-Cookie` value carrying a freshly generated key.
    pub fn set_cookie(&self) -> Option<&str> {
        self.set_cookie.as_deref()
    }

    /// Header name and value exposing a freshly generated key.
    pub fn token_header(&self) -> Option<(&str, &str)> {
        self.token_header
            .as_deref()
            .map(|name| (name, self.key.as_str()))
    }

    /// Whether finalizing would hand the payload to the store.
    pub fn is_dirty(&self) -> Result<bool, SessionError> {
        let current = self.session.data()?;
        Ok(self.payload_to_write(&current))
    }

    fn payload_to_write(&self, current: &SessionData) -> bool {
        match self.save_mode {
            SaveMode::Changed => *current != self.original,
            SaveMode::NonEmpty => !current.is_empty() || *current != self.original,
        }
    }

    /// Persists the session.
    ///
    /// A changed payload is written through `update(key, data)`; otherwise
    /// `update(key)` only renews the expiry when it is due. A new session
    /// whose payload stayed empty never reaches storage.
    ///
    /// # Errors
    ///
    /// Propagates store write failures.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    pub async fn finalize(self) -> Result<Option<SessionRecord>, SessionError> {
        let current = self.session.data()?;

        let written = if self.payload_to_write(&current) {
            self.store.update(&self.key, Some(current)).await?
        } else {
            self.store.update(&self.key, None).await?
        };

        if let Some(record) = &written {
            log::debug!(
                target: "sessiontoken",
                "msg=\"session persisted\", key=\"{}\", expires_at=\"{}\"",
                key_prefix(&self.key),
                record.expires_at
            );
        }

        Ok(written)
    }
}
