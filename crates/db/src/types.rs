use chrono::{DateTime, Utc};
use metering_core::UsageRecord;

/// Rows fetched per page when scanning raw usage.
pub const DEFAULT_SCAN_CHUNK: usize = 2000;

/// Optional filters shared by the ad-hoc usage queries. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
}

impl UsageFilter {
    pub fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            user_id: None,
        }
    }
}

/// Filters of the admin record listing, on top of the shared range and user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordListFilter {
    pub usage: UsageFilter,
    /// Case-insensitive substring of the stored model name.
    pub model: Option<String>,
    pub success: Option<bool>,
}

/// A stored record with its raw metadata JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUsageRecord {
    pub record: UsageRecord,
    pub metadata: Option<String>,
}
