use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use metering_core::{
    ChartPoint, ModelUsage, SeriesPoint, TimeSeries, UsageStats, UsageSummary, UsageTotals,
    ViewGranularity, expected_buckets, format_bucket,
};
use metering_db::{Db, UsageFilter};

use crate::config::StatsParams;
use crate::error::Result;
use crate::services::charts::{read_with_fallback, recompute};
use crate::services::{SharedConfig, open_db};
use crate::util::time::{parse_end_date, parse_start_date};

/// Validated form of [`StatsParams`]. Bounds keep the caller's offset so the
/// year view can read calendar months in it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsQuery {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub user_id: Option<String>,
    pub granularity: Option<ViewGranularity>,
    pub use_series: bool,
}

impl StatsQuery {
    pub fn from_params(params: &StatsParams) -> Result<Self> {
        let granularity = match params
            .granularity
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(value) => Some(value.parse::<ViewGranularity>()?),
            None => None,
        };
        Ok(Self {
            start: parse_start_date(params.start_date.as_deref())?,
            end: parse_end_date(params.end_date.as_deref())?,
            user_id: params
                .user_id
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            granularity,
            use_series: params.wants_materialized_series(),
        })
    }

    fn filter(&self) -> UsageFilter {
        UsageFilter {
            start: self.start.map(|value| value.with_timezone(&Utc)),
            end: self.end.map(|value| value.with_timezone(&Utc)),
            user_id: self.user_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct StatsService {
    config: SharedConfig,
}

impl StatsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn stats_from_params(&self, params: &StatsParams) -> Result<UsageStats> {
        self.stats(&StatsQuery::from_params(params)?)
    }

    /// Summary, per-model breakdown and, when a view is requested, the time
    /// series. The series is zero-filled only when both bounds are given.
    pub fn stats(&self, query: &StatsQuery) -> Result<UsageStats> {
        let db = self.db()?;
        let filter = query.filter();
        let totals = db.usage_totals(&filter)?;
        let by_model = db
            .usage_totals_by_model(&filter)?
            .into_iter()
            .map(|(model, totals)| ModelUsage::new(model, totals))
            .collect();

        let mut stats = UsageStats {
            summary: UsageSummary::from(totals.clone()),
            by_model,
            series: None,
            expected_buckets: None,
            series_by_model: None,
        };
        let Some(view) = query.granularity else {
            return Ok(stats);
        };

        let granularity = view.series_granularity();
        let rows = db.usage_totals_by_bucket(&filter, granularity)?;
        let items = match (query.start, query.end) {
            (Some(start), Some(end)) => {
                let expected = expected_buckets(view, &start, &end);
                let mut by_bucket: HashMap<DateTime<Utc>, UsageTotals> = rows.into_iter().collect();
                stats.expected_buckets = Some(
                    expected
                        .iter()
                        .map(|bucket| format_bucket(*bucket, granularity))
                        .collect(),
                );
                // Rows are grouped by UTC bucket. A year view whose end sits in
                // a negative offset expects its last month by the caller's
                // calendar, so calls already in the next UTC month count in
                // the summary but fall outside the filled series.
                expected
                    .into_iter()
                    .map(|bucket| {
                        let key = format_bucket(bucket, granularity);
                        match by_bucket.remove(&bucket) {
                            Some(totals) => SeriesPoint::new(key, totals),
                            None => SeriesPoint::zero(key),
                        }
                    })
                    .collect()
            }
            // TODO: decide with product whether an open range should default
            // its missing bound instead of returning an unfilled series.
            _ => rows
                .into_iter()
                .map(|(bucket, totals)| SeriesPoint::new(format_bucket(bucket, granularity), totals))
                .collect(),
        };
        stats.series = Some(TimeSeries {
            granularity: view,
            items,
        });

        if query.use_series
            && let (Some(start), Some(end)) = (query.start, query.end)
        {
            let start = start.with_timezone(&Utc);
            let end = end.with_timezone(&Utc);
            stats.series_by_model = Some(self.series_by_model(&db, view, start, end, &filter, &totals)?);
        }
        Ok(stats)
    }

    /// Materialized per-model rows, discarded for a recompute when they cover
    /// less than half of the calls actually recorded in the range.
    fn series_by_model(
        &self,
        db: &Db,
        view: ViewGranularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &UsageFilter,
        totals: &UsageTotals,
    ) -> Result<Vec<ChartPoint>> {
        let points = read_with_fallback(db, view, start, end)?;
        let series_calls: u64 = points.iter().map(|point| point.call_count).sum();
        // Chart rows are not per user, so compare against the whole range.
        let range_calls = if filter.user_id.is_some() {
            db.usage_totals(&UsageFilter::range(start, end))?.calls
        } else {
            totals.calls
        };
        if range_calls > 0 && series_calls.saturating_mul(2) < range_calls {
            tracing::warn!(
                view = view.as_str(),
                series_calls,
                range_calls,
                "materialized usage series is stale, recomputing"
            );
            return recompute(db, view, start, end);
        }
        Ok(points)
    }
}
