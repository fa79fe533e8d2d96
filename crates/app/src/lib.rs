pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod services;
pub mod util;

pub use app::{AppConfig, AppState};
pub use config::{AggregateParams, RecordListParams, StatsParams};
pub use error::{ApiError, AppError, Result};
pub use scheduler::{RetryPolicy, run_with_retry};
pub use services::{
    AggregationService, AppServices, ChartService, CompletedCall, CostEstimateError,
    CostEstimator, JobOutcome, JobRequest, PatternPricing, RecordListQuery, RecordService,
    StatsQuery, StatsService, TrackingService, UsageRecordEntry, UsageRecordPage,
    normalize_usage,
};
pub use util::time::{default_range, parse_datetime, parse_end_date, parse_start_date, parse_timezone};
