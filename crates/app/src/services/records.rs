use chrono::Utc;
use metering_core::UsageRecord;
use metering_db::{RecordListFilter, StoredUsageRecord, UsageFilter};
use serde::Serialize;
use serde_json::Value;

use crate::config::RecordListParams;
use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};
use crate::util::time::{parse_end_date, parse_start_date};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecordEntry {
    #[serde(flatten)]
    pub record: UsageRecord,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecordPage {
    pub results: Vec<UsageRecordEntry>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// A validated listing request. `page` is 1-based and `page_size` is
/// clamped to `1..=100`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordListQuery {
    pub page: u32,
    pub page_size: u32,
    pub filter: RecordListFilter,
}

impl RecordListQuery {
    pub fn from_params(params: &RecordListParams) -> Result<Self> {
        let page = parse_number(params.page.as_deref(), "page")?.unwrap_or(1).max(1);
        let page_size = parse_number(params.page_size.as_deref(), "page_size")?
            .unwrap_or(i64::from(DEFAULT_PAGE_SIZE))
            .clamp(1, i64::from(MAX_PAGE_SIZE));
        let success = match non_blank(params.success.as_deref())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };
        Ok(Self {
            page: u32::try_from(page).unwrap_or(u32::MAX),
            page_size: u32::try_from(page_size).unwrap_or(MAX_PAGE_SIZE),
            filter: RecordListFilter {
                usage: UsageFilter {
                    start: parse_start_date(params.start_date.as_deref())?
                        .map(|value| value.with_timezone(&Utc)),
                    end: parse_end_date(params.end_date.as_deref())?
                        .map(|value| value.with_timezone(&Utc)),
                    user_id: non_blank(params.user_id.as_deref()).map(str::to_string),
                },
                model: non_blank(params.model.as_deref()).map(str::to_string),
                success,
            },
        })
    }

    fn offset(&self) -> usize {
        let skipped = u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size);
        usize::try_from(skipped).unwrap_or(usize::MAX)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_number(value: Option<&str>, name: &str) -> Result<Option<i64>> {
    non_blank(value)
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|_| AppError::InvalidInput(format!("{name} must be an integer, got {value:?}")))
        })
        .transpose()
}

#[derive(Clone)]
pub struct RecordService {
    config: SharedConfig,
}

impl RecordService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    pub fn list_from_params(&self, params: &RecordListParams) -> Result<UsageRecordPage> {
        self.list(&RecordListQuery::from_params(params)?)
    }

    pub fn list(&self, query: &RecordListQuery) -> Result<UsageRecordPage> {
        let db = open_db(&self.config)?;
        let (rows, total) = db.list_usage_records(
            &query.filter,
            query.page_size as usize,
            query.offset(),
        )?;
        let results = rows
            .into_iter()
            .map(|StoredUsageRecord { record, metadata }| -> Result<UsageRecordEntry> {
                let metadata = metadata
                    .as_deref()
                    .map(serde_json::from_str::<Value>)
                    .transpose()?;
                Ok(UsageRecordEntry { record, metadata })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(UsageRecordPage {
            results,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, page_size: Option<&str>) -> RecordListParams {
        RecordListParams {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            ..RecordListParams::default()
        }
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        let query = RecordListQuery::from_params(&RecordListParams::default()).expect("query");
        assert_eq!((query.page, query.page_size), (1, 20));
        assert_eq!(query.offset(), 0);

        let query = RecordListQuery::from_params(&params(Some("0"), Some("500"))).expect("query");
        assert_eq!((query.page, query.page_size), (1, 100));

        let query = RecordListQuery::from_params(&params(Some("3"), Some("-4"))).expect("query");
        assert_eq!((query.page, query.page_size), (3, 1));
        assert_eq!(query.offset(), 2);
    }

    #[test]
    fn non_numeric_page_is_invalid() {
        let err = RecordListQuery::from_params(&params(Some("two"), None)).expect_err("page");
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn filters_are_normalized() {
        let query = RecordListQuery::from_params(&RecordListParams {
            user_id: Some("  ".to_string()),
            model: Some(" gpt ".to_string()),
            success: Some("FALSE".to_string()),
            end_date: Some("2026-02-21".to_string()),
            ..RecordListParams::default()
        })
        .expect("query");
        assert_eq!(query.filter.usage.user_id, None);
        assert_eq!(query.filter.model.as_deref(), Some("gpt"));
        assert_eq!(query.filter.success, Some(false));
        assert_eq!(
            query.filter.usage.end.map(|end| end.to_rfc3339()),
            Some("2026-02-21T23:59:59.999999+00:00".to_string())
        );

        let ignored = RecordListQuery::from_params(&RecordListParams {
            success: Some("maybe".to_string()),
            ..RecordListParams::default()
        })
        .expect("query");
        assert_eq!(ignored.filter.success, None);
    }
}
