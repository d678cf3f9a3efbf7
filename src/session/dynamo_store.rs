use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, TimeToLiveSpecification};
use chrono::{DateTime, Utc};

use super::policy::ExpiryPolicy;
use super::store::SessionStore;
use super::{SessionData, SessionRecord};
use crate::config::ExpiryConfig;
use crate::{SessionError, key_prefix};

pub const DEFAULT_TABLE: &str = "sessions";
pub const DEFAULT_KEY_ATTRIBUTE: &str = "session_key";

/// TTL attribute: expiry in epoch seconds, rounded up.
const EXPIRES_ATTRIBUTE: &str = "expires";
/// Exact expiry in epoch milliseconds.
const EXPIRES_MS_ATTRIBUTE: &str = "expires_ms";
const DATA_ATTRIBUTE: &str = "data";

type Item = HashMap<String, AttributeValue>;

/// DynamoDB-backed session store.
///
/// One item per session. The session key is used directly as the
/// partition key rather than stored beside a generated item id. The
/// `expires` attribute is registered as the table's TTL attribute (see
/// [`ensure_ttl`](Self::ensure_ttl)) so DynamoDB removes dead sessions on
/// its own. TTL deletion runs in the background and may lag, so
/// [`get`](SessionStore::get) still deletes expired items it comes across.
///
/// # Table Schema
///
/// | attribute     | type | role                                   |
/// |---------------|------|----------------------------------------|
/// | `session_key` | S    | partition key (name configurable)      |
/// | `expires`     | N    | TTL attribute, epoch seconds           |
/// | `expires_ms`  | N    | exact expiry, epoch milliseconds       |
/// | `data`        | S    | JSON-encoded session payload           |
#[derive(Clone)]
pub struct DynamoSessionStore {
    client: Client,
    table: String,
    key_attribute: String,
    policy: ExpiryPolicy,
}

fn sdk_error<E: std::error::Error>(operation: &'static str, err: E) -> SessionError {
    let message = DisplayErrorContext(&err).to_string();
    log::error!(target: "sessiontoken", "msg=\"dynamodb error\", operation=\"{operation}\", error=\"{message}\"");
    SessionError::Storage(message)
}

impl DynamoSessionStore {
    pub fn new(client: Client, config: ExpiryConfig) -> Self {
        Self::with_table(client, DEFAULT_TABLE, DEFAULT_KEY_ATTRIBUTE, config)
    }

    pub fn with_table(
        client: Client,
        table: impl Into<String>,
        key_attribute: impl Into<String>,
        config: ExpiryConfig,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            key_attribute: key_attribute.into(),
            policy: ExpiryPolicy::new(config),
        }
    }

    /// Builds a client from the standard AWS environment (region, credentials).
    pub async fn from_env(table: impl Into<String>, config: ExpiryConfig) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self::with_table(
            Client::new(&sdk_config),
            table,
            DEFAULT_KEY_ATTRIBUTE,
            config,
        )
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Enables native TTL on the `expires` attribute.
    pub async fn ensure_ttl(&self) -> Result<(), SessionError> {
        let spec = TimeToLiveSpecification::builder()
            .enabled(true)
            .attribute_name(EXPIRES_ATTRIBUTE)
            .build()
            .map_err(|e| SessionError::ConfigurationError(e.to_string()))?;

        let result = self
            .client
            .update_time_to_live()
            .table_name(&self.table)
            .time_to_live_specification(spec)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            // DynamoDB rejects re-enabling TTL that is already on.
            Err(e) if DisplayErrorContext(&e).to_string().contains("already enabled") => Ok(()),
            Err(e) => Err(sdk_error("update_time_to_live", e)),
        }
    }

    async fn find(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(&self.key_attribute, AttributeValue::S(key.to_owned()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| sdk_error("get_item", e))?;

        output
            .item
            .map(|item| item_to_record(key, &item))
            .transpose()
    }
}

fn record_to_item(key_attribute: &str, record: &SessionRecord) -> Result<Item, SessionError> {
    let millis = record.expires_at.timestamp_millis();
    let seconds = millis.div_euclid(1000) + i64::from(millis.rem_euclid(1000) > 0);

    let mut item = Item::new();
    item.insert(key_attribute.to_owned(), AttributeValue::S(record.key.clone()));
    item.insert(EXPIRES_ATTRIBUTE.to_owned(), AttributeValue::N(seconds.to_string()));
    item.insert(EXPIRES_MS_ATTRIBUTE.to_owned(), AttributeValue::N(millis.to_string()));
    item.insert(
        DATA_ATTRIBUTE.to_owned(),
        AttributeValue::S(serde_json::to_string(&record.data)?),
    );
    Ok(item)
}

fn item_to_record(key: &str, item: &Item) -> Result<SessionRecord, SessionError> {
    let number = |name: &str| -> Option<i64> {
        item.get(name)
            .and_then(|value| value.as_n().ok())
            .and_then(|n| n.parse().ok())
    };

    let expires_at = number(EXPIRES_MS_ATTRIBUTE)
        .or_else(|| number(EXPIRES_ATTRIBUTE).map(|seconds| seconds.saturating_mul(1000)))
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| {
            SessionError::Serialization(format!("session item {} has no expiry", key_prefix(key)))
        })?;

    let data = match item.get(DATA_ATTRIBUTE).and_then(|value| value.as_s().ok()) {
        Some(json) => serde_json::from_str(json)?,
        None => SessionData::new(),
    };

    Ok(SessionRecord::new(key, expires_at, data))
}

#[async_trait]
impl SessionStore for DynamoSessionStore {
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

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record_to_item(&self.key_attribute, &record)?))
            .send()
            .await
            .map_err(|e| sdk_error("put_item", e))?;

        Ok(Some(record))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn destroy(&self, key: &str) -> Result<(), SessionError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(&self.key_attribute, AttributeValue::S(key.to_owned()))
            .send()
            .await
            .map_err(|e| sdk_error("delete_item", e))?;

        Ok(())
    }

    /// Expired items are removed by DynamoDB TTL; nothing to do here.
    async fn prune_expired(&self) -> Result<u64, SessionError> {
        log::debug!(target: "sessiontoken", "msg=\"prune skipped, table relies on native TTL\", table=\"{}\"", self.table);
        Ok(0)
    }
}
