//! File-based session storage.
//!
//! Stores every session in a single JSON file:
//!
//! ```json
//! { "<key>": { "expires": 1700000000000, "data": { "foo": "bar" } } }
//! ```

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::policy::ExpiryPolicy;
use super::store::SessionStore;
use super::{SessionData, SessionRecord};
use crate::config::ExpiryConfig;
use crate::{SessionError, key_prefix};

/// Default file name, resolved against the current working directory.
pub const DEFAULT_FILENAME: &str = ".session";

type SessionFile = BTreeMap<String, SessionRecord>;

/// Single-file session storage.
///
/// Every operation reads the whole file and every dirty update rewrites it.
/// Operations within one store instance are serialized, but nothing
/// coordinates separate processes or separate instances pointing at the
/// same file: overlapping writers clobber each other and the last write
/// wins. Use it for single-process, low-traffic deployments only.
///
/// A missing file is an empty store. A file that exists but cannot be
/// parsed makes [`get`](SessionStore::get) report no session (with a
/// warning) and makes writes fail with [`SessionError::Corrupt`], so the
/// file is never silently replaced.
///
/// # Example
///
/// ```rust,ignore
/// use sessiontoken::session::FileSessionStore;
/// use sessiontoken::ExpiryConfig;
///
/// let store = FileSessionStore::new("/var/lib/myapp/sessions.json", ExpiryConfig::default());
/// ```
pub struct FileSessionStore {
    path: PathBuf,
    policy: ExpiryPolicy,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Creates a store backed by `path`.
    ///
    /// Relative paths are resolved against the current working directory.
    /// The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>, config: ExpiryConfig) -> Self {
        let path = path.into();
        let path = std::path::absolute(&path).unwrap_or(path);
        Self {
            path,
            policy: ExpiryPolicy::new(config),
            lock: Mutex::new(()),
        }
    }

    /// Creates a store at `./.session` with default durations.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_FILENAME, ExpiryConfig::default())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole file. A missing or blank file is an empty store.
    async fn load(&self) -> Result<SessionFile, SessionError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SessionFile::new()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read session file: {e}"
                )));
            }
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(SessionFile::new());
        }

        let mut sessions: SessionFile = serde_json::from_slice(&content).map_err(|e| {
            SessionError::Corrupt(format!("Failed to parse session file: {e}"))
        })?;

        for (key, record) in &mut sessions {
            record.key.clone_from(key);
        }

        Ok(sessions)
    }

    /// Rewrites the whole file through a temporary sibling and a rename.
    async fn save(&self, sessions: &SessionFile) -> Result<(), SessionError> {
        let content = serde_json::to_vec(sessions)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SessionError::Storage(format!("Failed to create session directory: {e}"))
            })?;
        }

        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to replace session file: {e}")))?;

        Ok(())
    }
}

/// `<file name>.tmp` next to `path`, keeping any existing extension.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl SessionStore for FileSessionStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        let _guard = self.lock.lock().await;

        let mut sessions = match self.load().await {
            Ok(sessions) => sessions,
            Err(e) => {
                log::warn!(
                    target: "sessiontoken",
                    "msg=\"session file unreadable, treating as empty\", path=\"{}\", error=\"{e}\"",
                    self.path.display()
                );
                return Ok(None);
            }
        };

        let Some(record) = sessions.remove(key) else {
            return Ok(None);
        };
        if !record.is_expired_at(Utc::now()) {
            return Ok(Some(record));
        }

        match self.save(&sessions).await {
            Ok(()) => log::debug!(
                target: "sessiontoken",
                "msg=\"expired session removed\", key=\"{}\"",
                key_prefix(key)
            ),
            Err(e) => log::warn!(
                target: "sessiontoken",
                "msg=\"expired session not removed\", path=\"{}\", key=\"{}\", error=\"{e}\"",
                self.path.display(),
                key_prefix(key)
            ),
        }
        Ok(None)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn update(
        &self,
        key: &str,
        data: Option<SessionData>,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let _guard = self.lock.lock().await;

        let mut sessions = self.load().await?;
        let existing = sessions.get(key).cloned();

        let Some(record) = self
            .policy
            .apply(key, Utc::now(), existing, data)
            .into_dirty_record()
        else {
            return Ok(None);
        };

        sessions.insert(key.to_owned(), record.clone());
        self.save(&sessions).await?;

        Ok(Some(record))
    }

    async fn destroy(&self, key: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock().await;

        let mut sessions = self.load().await?;
        if sessions.remove(key).is_some() {
            self.save(&sessions).await?;
        }

        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64, SessionError> {
        let _guard = self.lock.lock().await;

        let mut sessions = self.load().await?;
        let now = Utc::now();
        let before_count = sessions.len();

        sessions.retain(|_, record| !record.is_expired_at(now));

        let pruned = before_count.saturating_sub(sessions.len());
        if pruned > 0 {
            self.save(&sessions).await?;
        }

        Ok(u64::try_from(pruned).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use crate::crypto::generate_token;

    fn data(value: serde_json::Value) -> SessionData {
        value.as_object().cloned().unwrap()
    }

    fn temp_path() -> PathBuf {
        env::temp_dir().join(format!("sessiontoken_test_{}", generate_token(8)))
    }

    fn store(path: &Path) -> FileSessionStore {
        FileSessionStore::new(path, ExpiryConfig::from_millis(1_200_000, 300_000))
    }

    fn raw(path: &Path) -> serde_json::Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let path = temp_path();
        let store = store(&path);

        assert!(store.get("abc").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_update_creates_file() {
        let path = temp_path();
        let store = store(&path);

        let before = Utc::now();
        let record = store
            .update("abc", Some(data(json!({"foo": "bar"}))))
            .await
            .unwrap()
            .unwrap();

        assert!(record.expires_at.timestamp_millis() >= before.timestamp_millis() + 1_200_000);
        assert_eq!(record.expires_at.timestamp_subsec_nanos() % 1_000_000, 0);

        let file = raw(&path);
        assert_eq!(file["abc"]["data"], json!({"foo": "bar"}));
        assert_eq!(
            file["abc"]["expires"].as_i64().unwrap(),
            record.expires_at.timestamp_millis()
        );

        let found = store.get("abc").await.unwrap().unwrap();
        assert_eq!(found, record);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_live_record_returned_unchanged() {
        let path = temp_path();
        let expires = (Utc::now() + Duration::minutes(30)).timestamp_millis();
        std::fs::write(
            &path,
            json!({"abc": {"expires": expires, "data": {"herp": "derp"}}}).to_string(),
        )
        .unwrap();
        let store = store(&path);

        let record = store.get("abc").await.unwrap().unwrap();
        assert_eq!(record.key, "abc");
        assert_eq!(record.expires_at.timestamp_millis(), expires);
        assert_eq!(record.data, data(json!({"herp": "derp"})));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_expired_record_is_deleted_on_get() {
        let path = temp_path();
        let now = Utc::now().timestamp_millis();
        std::fs::write(
            &path,
            json!({
                "old": {"expires": now - 10, "data": {"baz": true}},
                "live": {"expires": now + 600_000, "data": {}}
            })
            .to_string(),
        )
        .unwrap();
        let store = store(&path);

        assert!(store.get("old").await.unwrap().is_none());

        let file = raw(&path);
        assert!(file.get("old").is_none());
        assert!(file.get("live").is_some());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_expired_record_unremovable_still_reports_none() {
        let path = temp_path();
        let now = Utc::now().timestamp_millis();
        std::fs::write(
            &path,
            json!({"old": {"expires": now - 10, "data": {"baz": true}}}).to_string(),
        )
        .unwrap();
        // A directory in place of the temp file makes the rewrite fail.
        let tmp = tmp_path(&path);
        std::fs::create_dir(&tmp).unwrap();
        let store = store(&path);

        assert!(store.get("old").await.unwrap().is_none());
        assert!(raw(&path).get("old").is_some());

        let _ = std::fs::remove_dir(&tmp);
        cleanup(&path);
    }

    #[test]
    fn test_tmp_path_keeps_extension() {
        assert_eq!(tmp_path(Path::new("/var/a.json")), Path::new("/var/a.json.tmp"));
        assert_eq!(tmp_path(Path::new("/var/a.db")), Path::new("/var/a.db.tmp"));
        assert_eq!(tmp_path(Path::new("/var/.session")), Path::new("/var/.session.tmp"));
    }

    #[tokio::test]
    async fn test_update_matches_record_read_back() {
        let path = temp_path();
        let store = store(&path);

        for i in 0..10 {
            let key = format!("k{i}");
            let written = store
                .update(&key, Some(data(json!({"i": i}))))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(store.get(&key).await.unwrap(), Some(written));
        }

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_noop_update_does_not_create_file() {
        let path = temp_path();
        let store = store(&path);

        assert!(store.update("abc", None).await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_renewal_only_update_leaves_file_alone() {
        let path = temp_path();
        let expires = (Utc::now() + Duration::minutes(15)).timestamp_millis();
        // Pretty-printed on purpose: any rewrite would produce compact JSON.
        let content = serde_json::to_string_pretty(
            &json!({"abc": {"expires": expires, "data": {"a": 1}}}),
        )
        .unwrap();
        std::fs::write(&path, &content).unwrap();
        let store = store(&path);

        for _ in 0..3 {
            assert!(store.update("abc", None).await.unwrap().is_none());
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_renewal_arithmetic() {
        let path = temp_path();
        // Four minutes left is below the five minute threshold.
        let expires = (Utc::now() + Duration::minutes(4)).timestamp_millis();
        std::fs::write(
            &path,
            json!({"abc": {"expires": expires, "data": {"a": 1}}}).to_string(),
        )
        .unwrap();
        let store = store(&path);

        let record = store.update("abc", None).await.unwrap().unwrap();
        assert_eq!(record.expires_at.timestamp_millis(), expires + 300_000);
        assert_eq!(record.data, data(json!({"a": 1})));
        assert_eq!(raw(&path)["abc"]["expires"].as_i64().unwrap(), expires + 300_000);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_open_on_get() {
        let path = temp_path();
        std::fs::write(&path, "{not json").unwrap();
        let store = store(&path);

        assert!(store.get("abc").await.unwrap().is_none());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        let path = temp_path();
        std::fs::write(&path, "{not json").unwrap();
        let store = store(&path);

        let result = store.update("abc", Some(data(json!({"a": 1})))).await;
        assert!(matches!(result, Err(SessionError::Corrupt(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_blank_file_is_empty_store() {
        let path = temp_path();
        std::fs::write(&path, "\n").unwrap();
        let store = store(&path);

        assert!(store.get("abc").await.unwrap().is_none());
        assert!(store.update("abc", Some(SessionData::new())).await.unwrap().is_some());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_destroy() {
        let path = temp_path();
        let store = store(&path);
        store.update("abc", Some(data(json!({"a": 1})))).await.unwrap();
        store.update("def", Some(data(json!({"b": 2})))).await.unwrap();

        store.destroy("abc").await.unwrap();

        assert!(store.get("abc").await.unwrap().is_none());
        assert!(store.get("def").await.unwrap().is_some());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let path = temp_path();
        let now = Utc::now().timestamp_millis();
        std::fs::write(
            &path,
            json!({
                "a": {"expires": now - 1000, "data": {}},
                "b": {"expires": now - 1, "data": {}},
                "c": {"expires": now + 600_000, "data": {}}
            })
            .to_string(),
        )
        .unwrap();
        let store = store(&path);

        assert_eq!(store.prune_expired().await.unwrap(), 2);
        let file = raw(&path);
        assert_eq!(file.as_object().unwrap().len(), 1);
        assert!(file.get("c").is_some());

        cleanup(&path);
    }

    #[test]
    fn test_relative_path_is_resolved() {
        let store = FileSessionStore::with_defaults();
        assert!(store.path().is_absolute());
        assert!(store.path().ends_with(DEFAULT_FILENAME));
    }
}
