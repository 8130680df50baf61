use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::quota::util::serialize_timestamp;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionQuota {
    pub percent_used: Option<u8>,
    pub resets_in: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeeklyQuota {
    pub percent_used: Option<u8>,
    pub resets: String,
}

/// Full structured result for one screenshot. Every field is always present;
/// unreadable values are `null` or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaReading {
    #[serde(serialize_with = "serialize_timestamp")]
    pub captured_at: DateTime<Utc>,
    pub current_session: SessionQuota,
    pub weekly_limits: WeeklyQuota,
}

impl QuotaReading {
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            current_session: SessionQuota::default(),
            weekly_limits: WeeklyQuota::default(),
        }
    }

    pub fn has_session(&self) -> bool {
        self.current_session.percent_used.is_some()
    }
}

/// The subset of a reading the status line consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactStatus {
    pub quota_used_pct: Option<u8>,
    pub weekly_used_pct: Option<u8>,
    pub resets_in: String,
    pub weekly_resets: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated: DateTime<Utc>,
    pub valid: bool,
    pub source_image: String,
}

impl CompactStatus {
    pub fn from_reading(
        reading: &QuotaReading,
        source_image: impl Into<String>,
        updated: DateTime<Utc>,
    ) -> Self {
        Self {
            quota_used_pct: reading.current_session.percent_used,
            weekly_used_pct: reading.weekly_limits.percent_used,
            resets_in: reading.current_session.resets_in.clone(),
            weekly_resets: reading.weekly_limits.resets.clone(),
            updated,
            valid: reading.has_session(),
            source_image: source_image.into(),
        }
    }
}
