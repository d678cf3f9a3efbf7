//! Request-scoped session handle.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::SessionData;
use crate::SessionError;

/// Mutable session state of one request.
///
/// Cloning is cheap and every clone shares the same payload, so the copy a
/// handler extracts and the copy the binder finalizes see the same data.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    key: Option<String>,
    is_new: bool,
    data: RwLock<SessionData>,
}

impl Session {
    pub(crate) fn new(key: String, is_new: bool, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Inner {
                key: Some(key),
                is_new,
                data: RwLock::new(data),
            }),
        }
    }

    /// A session that is never loaded or persisted.
    ///
    /// Handed out for requests that bypass persistence.
    pub fn detached() -> Self {
        Self {
            inner: Arc::new(Inner {
                key: None,
                is_new: false,
                data: RwLock::new(SessionData::new()),
            }),
        }
    }

    /// The session key, `None` for a detached session.
    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    /// Whether the key was generated for this request.
    pub fn is_new(&self) -> bool {
        self.inner.is_new
    }

    pub fn is_detached(&self) -> bool {
        self.inner.key.is_none()
    }

    /// Deserializes the value stored under `field`.
    ///
    /// Returns `None` when the field is missing or has a different shape.
    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        let value = self.read().ok()?.get(field).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn get_value(&self, field: &str) -> Option<Value> {
        self.read().ok()?.get(field).cloned()
    }

    /// Stores `value` under `field`, returning the previous value.
    pub fn insert<T: Serialize>(
        &self,
        field: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>, SessionError> {
        let value = serde_json::to_value(value)?;
        Ok(self.write()?.insert(field.into(), value))
    }

    pub fn remove(&self, field: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.write()?.remove(field))
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.write()?.clear();
        Ok(())
    }

    /// Replaces the whole payload.
    pub fn replace(&self, data: SessionData) -> Result<SessionData, SessionError> {
        Ok(std::mem::replace(&mut *self.write()?, data))
    }

    /// A snapshot of the current payload.
    pub fn data(&self) -> Result<SessionData, SessionError> {
        Ok(self.read()?.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.read().map(|data| data.is_empty()).unwrap_or(true)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SessionData>, SessionError> {
        self.inner
            .data
            .read()
            .map_err(|_| SessionError::Internal("Lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SessionData>, SessionError> {
        self.inner
            .data
            .write()
            .map_err(|_| SessionError::Internal("Lock poisoned".to_owned()))
    }
}
