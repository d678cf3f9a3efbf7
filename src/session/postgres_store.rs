use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use super::policy::ExpiryPolicy;
use super::store::SessionStore;
use super::{SessionData, SessionRecord};
use crate::config::ExpiryConfig;
use crate::{SessionError, key_prefix};

/// Default table name.
pub const DEFAULT_TABLE: &str = "sessions";

/// `PostgreSQL`-backed session store.
///
/// One row per session holding the payload as a JSONB document. The session
/// key itself is the primary key; there is no separate surrogate row id.
/// `PostgreSQL` has no native expiring index, so expired rows are removed lazily by
/// [`get`](SessionStore::get) and in bulk by
/// [`prune_expired`](SessionStore::prune_expired), which the application
/// should call periodically.
///
/// # Table Schema
///
/// [`ensure_schema`](Self::ensure_schema) creates:
///
/// ```sql
/// CREATE TABLE sessions (
///     session_key TEXT PRIMARY KEY,
///     expires TIMESTAMPTZ NOT NULL,
///     data JSONB NOT NULL DEFAULT '{}'::jsonb
/// );
///
/// CREATE INDEX idx_sessions_expires ON sessions(expires);
/// ```
#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
    table: String,
    policy: ExpiryPolicy,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    expires: DateTime<Utc>,
    data: Json<SessionData>,
}

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> SessionError {
    move |e| {
        log::error!(target: "sessiontoken", "msg=\"database error\", operation=\"{operation}\", error=\"{e}\"");
        SessionError::Storage(e.to_string())
    }
}

fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_ok && name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl PostgresSessionStore {
    /// Creates a store over the `sessions` table.
    pub fn new(pool: PgPool, config: ExpiryConfig) -> Self {
        Self {
            pool,
            table: DEFAULT_TABLE.to_owned(),
            policy: ExpiryPolicy::new(config),
        }
    }

    /// Creates a store over a custom table.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConfigurationError`] when `table` is not a plain identifier.
    pub fn with_table(
        pool: PgPool,
        table: impl Into<String>,
        config: ExpiryConfig,
    ) -> Result<Self, SessionError> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(SessionError::ConfigurationError(format!(
                "invalid table name: {table}"
            )));
        }

        Ok(Self {
            pool,
            table,
            policy: ExpiryPolicy::new(config),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the table and its expiry index when missing.
    pub async fn ensure_schema(&self) -> Result<(), SessionError> {
        let table = &self.table;

        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                session_key TEXT PRIMARY KEY,
                expires TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL DEFAULT '{{}}'::jsonb
            )
            "
        ))
        .execute(&self.pool)
        .await
        .map_err(db_error("ensure_sessions_table"))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_expires ON {table}(expires)"
        ))
        .execute(&self.pool)
        .await
        .map_err(db_error("ensure_sessions_expires_index"))?;

        Ok(())
    }

    async fn find(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT expires, data FROM {} WHERE session_key = $1",
            self.table
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_session"))?;

        Ok(row.map(|row| SessionRecord::new(key, row.expires, row.data.0)))
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        let Some(record) = self.find(key).await? else {
            return Ok(None);
        };

        if record.is_expired_at(Utc::now()) {
            self.destroy(key).await?;
            log::debug!(
                target: "sessiontoken",
                "msg=\"expired session removed\", key=\"{}\"",
                key_prefix(key)
            );
            return Ok(None);
        }

        Ok(Some(record))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn update(
        &self,
        key: &str,
        data: Option<SessionData>,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let existing = self.find(key).await?;

        let Some(record) = self
            .policy
            .apply(key, Utc::now(), existing, data)
            .into_dirty_record()
        else {
            return Ok(None);
        };

        sqlx::query(&format!(
            r"
            INSERT INTO {} (session_key, expires, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_key) DO UPDATE SET
                expires = EXCLUDED.expires,
                data = EXCLUDED.data
            ",
            self.table
        ))
        .bind(key)
        .bind(record.expires_at)
        .bind(Json(&record.data))
        .execute(&self.pool)
        .await
        .map_err(db_error("save_session"))?;

        Ok(Some(record))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn destroy(&self, key: &str) -> Result<(), SessionError> {
        sqlx::query(&format!("DELETE FROM {} WHERE session_key = $1", self.table))
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error("destroy_session"))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn prune_expired(&self) -> Result<u64, SessionError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE expires <= NOW()", self.table))
            .execute(&self.pool)
            .await
            .map_err(db_error("prune_expired_sessions"))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("sessions"));
        assert!(is_valid_table_name("_app_sessions2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2sessions"));
        assert!(!is_valid_table_name("sessions; DROP TABLE users"));
        assert!(!is_valid_table_name("public.sessions"));
        assert!(!is_valid_table_name(&"a".repeat(64)));
    }
}
