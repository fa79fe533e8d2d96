mod aggregation;
mod charts;
mod records;
mod stats;
mod tracking;

use std::sync::Arc;

use crate::app::AppConfig;
use crate::error::Result;
use metering_db::Db;

pub use aggregation::{AggregationService, JobOutcome, JobRequest};
pub use charts::ChartService;
pub use records::{RecordListQuery, RecordService, UsageRecordEntry, UsageRecordPage};
pub use stats::{StatsQuery, StatsService};
pub use tracking::{
    CompletedCall, CostEstimateError, CostEstimator, PatternPricing, TrackingService,
    normalize_usage,
};

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub stats: StatsService,
    pub charts: ChartService,
    pub aggregation: AggregationService,
    pub records: RecordService,
    pub tracking: TrackingService,
}

impl AppServices {
    pub fn new(config: SharedConfig, estimator: Arc<dyn CostEstimator>) -> Self {
        Self {
            stats: StatsService::new(config.clone()),
            charts: ChartService::new(config.clone()),
            aggregation: AggregationService::new(config.clone()),
            records: RecordService::new(config.clone()),
            tracking: TrackingService::new(config, estimator),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}
