use metering_app::{AggregateParams, RecordListParams, StatsParams};
use serde::Deserialize;

pub use metering_app::CompletedCall as RecordRequest;

#[derive(Debug, Deserialize, Default)]
pub struct StatsRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub user_id: Option<String>,
    pub granularity: Option<String>,
    pub use_series: Option<String>,
}

impl From<StatsRequest> for StatsParams {
    fn from(req: StatsRequest) -> Self {
        StatsParams {
            start_date: req.start_date,
            end_date: req.end_date,
            user_id: req.user_id,
            granularity: req.granularity,
            use_series: req.use_series,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ChartRequest {
    pub granularity: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AggregateRequest {
    pub granularity: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl From<AggregateRequest> for AggregateParams {
    fn from(req: AggregateRequest) -> Self {
        AggregateParams {
            granularity: req.granularity,
            start: req.start,
            end: req.end,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RecordListRequest {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub user_id: Option<String>,
    pub model: Option<String>,
    pub success: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl From<RecordListRequest> for RecordListParams {
    fn from(req: RecordListRequest) -> Self {
        RecordListParams {
            page: req.page,
            page_size: req.page_size,
            user_id: req.user_id,
            model: req.model,
            success: req.success,
            start_date: req.start_date,
            end_date: req.end_date,
        }
    }
}
