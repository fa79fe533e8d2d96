use chrono::{DateTime, Utc};
use metering_core::{Granularity, SeriesAggregator, SeriesRow, bucket_end, truncate};
use metering_db::{DEFAULT_SCAN_CHUNK, Db};
use serde::{Deserialize, Serialize};

use crate::config::AggregateParams;
use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};
use crate::util::time::{default_range, parse_end_date, parse_start_date};

/// Groups every record with `created_at` in `[start, end]` without holding
/// the whole range in memory.
pub(super) fn aggregate_range(
    db: &Db,
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<SeriesAggregator> {
    let mut aggregator = SeriesAggregator::new(granularity);
    db.scan_usage_records(start, end, DEFAULT_SCAN_CHUNK, |page| {
        aggregator.extend(page);
        Ok(())
    })?;
    Ok(aggregator)
}

/// A scheduled or manual aggregation run. Missing fields fall back to the
/// default range of each granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRequest {
    pub granularity: Option<Granularity>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl JobRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_params(params: &AggregateParams) -> Result<Self> {
        let granularity = match params
            .granularity
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(value) => Some(value.parse::<Granularity>()?),
            None => None,
        };
        Ok(Self {
            granularity,
            start: parse_start_date(params.start.as_deref())?.map(|value| value.with_timezone(&Utc)),
            end: parse_end_date(params.end.as_deref())?.map(|value| value.with_timezone(&Utc)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub upserted: usize,
    /// The granularity that ran, or `all`.
    pub granularity: String,
}

#[derive(Clone)]
pub struct AggregationService {
    config: SharedConfig,
}

impl AggregationService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    /// Computes series rows for the range without persisting them.
    pub fn aggregate(
        &self,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SeriesRow>> {
        let db = self.db()?;
        Ok(aggregate_range(&db, granularity, start, end)?.into_rows())
    }

    /// Recomputes and upserts every `(bucket, model)` row touched by the
    /// range in one transaction. The range is widened to whole buckets so a
    /// stored row always covers its full bucket. Returns the number of rows
    /// written.
    pub fn materialize(
        &self,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize> {
        if start > end {
            return Err(AppError::InvalidInput(format!(
                "start {start} is after end {end}"
            )));
        }
        let start = truncate(start, granularity);
        let end = bucket_end(end, granularity);
        let mut db = self.db()?;
        let rows = aggregate_range(&db, granularity, start, end)?.into_rows();
        let written = db.upsert_series_rows(&rows)?;
        tracing::info!(
            granularity = granularity.as_str(),
            start = %start,
            end = %end,
            rows = written,
            "materialized usage series"
        );
        Ok(written)
    }

    pub fn run(&self, request: &JobRequest) -> Result<JobOutcome> {
        self.run_at(request, Utc::now())
    }

    /// Runs the job as if invoked at `now`.
    pub fn run_at(&self, request: &JobRequest, now: DateTime<Utc>) -> Result<JobOutcome> {
        let Some(granularity) = request.granularity else {
            let mut upserted = 0;
            for granularity in Granularity::ALL {
                let (start, end) = default_range(granularity, now, self.config.aggregation_timezone)?;
                upserted += self.materialize(granularity, start, end)?;
            }
            return Ok(JobOutcome {
                upserted,
                granularity: "all".to_string(),
            });
        };
        let (start, end) = match (request.start, request.end) {
            (Some(start), Some(end)) => (start, end),
            _ => default_range(granularity, now, self.config.aggregation_timezone)?,
        };
        Ok(JobOutcome {
            upserted: self.materialize(granularity, start, end)?,
            granularity: granularity.as_str().to_string(),
        })
    }
}
