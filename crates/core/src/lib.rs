mod bucket;
mod granularity;
mod pricing;
mod record;
mod series;
mod stats;

pub use bucket::{IntoUtc, bucket_end, expected_buckets, format_bucket, truncate};
pub use granularity::{Granularity, GranularityError, ViewGranularity};
pub use pricing::{PricingRate, compute_cost, model_matches_pattern};
pub use record::{DEFAULT_COST_CURRENCY, RecordError, TokenCounts, UNKNOWN_MODEL, UsageRecord};
pub use series::{ChartPoint, GroupStats, SeriesAggregator, SeriesRow};
pub use stats::{
    ModelUsage, SeriesPoint, TimeSeries, TokenTotals, UsageStats, UsageSummary, UsageTotals,
};
