//! Sliding expiration rules.
//!
//! Pure functions of the current time, the configured durations and the
//! stored record. No I/O happens here.

use chrono::{DateTime, Duration, SubsecRound, Utc};

use super::{SessionData, SessionRecord};
use crate::config::ExpiryConfig;

/// Result of applying the policy to a stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    /// The record after the update, `None` when nothing exists or would be created.
    pub record: Option<SessionRecord>,
    /// Whether the record must be written back.
    pub dirty: bool,
}

impl PolicyOutcome {
    /// Returns the record only when it needs persisting.
    pub fn into_dirty_record(self) -> Option<SessionRecord> {
        if self.dirty { self.record } else { None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    duration: Duration,
    active_duration: Duration,
}

impl ExpiryPolicy {
    pub fn new(config: ExpiryConfig) -> Self {
        Self {
            duration: config.duration,
            active_duration: config.active_duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn active_duration(&self) -> Duration {
        self.active_duration
    }

    /// Applies an update to `existing`.
    ///
    /// - nothing stored and no data: nothing to persist
    /// - nothing stored and data: new record expiring at `now + duration`
    /// - stored record: data is replaced when given; when less than
    ///   `active_duration` remains, the expiry moves forward by
    ///   `active_duration` from its current value
    ///
    /// A stored record that has already expired counts as nothing stored.
    /// `now` is truncated to whole milliseconds, the precision every backend
    /// persists, so a returned record equals the one read back later.
    pub fn apply(
        &self,
        key: &str,
        now: DateTime<Utc>,
        existing: Option<SessionRecord>,
        data: Option<SessionData>,
    ) -> PolicyOutcome {
        let now = now.trunc_subsecs(3);
        let existing = existing.filter(|record| !record.is_expired_at(now));

        match (existing, data) {
            (None, None) => PolicyOutcome {
                record: None,
                dirty: false,
            },
            (None, Some(data)) => PolicyOutcome {
                record: Some(SessionRecord::new(key, now + self.duration, data)),
                dirty: true,
            },
            (Some(mut record), data) => {
                let mut dirty = false;

                if let Some(data) = data {
                    record.data = data;
                    dirty = true;
                }

                if self.needs_renewal(&record, now) {
                    record.expires_at += self.active_duration;
                    dirty = true;
                }

                PolicyOutcome {
                    record: Some(record),
                    dirty,
                }
            }
        }
    }

    pub fn needs_renewal(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        record.expires_at - now < self.active_duration
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(ExpiryConfig::default())
    }
}
