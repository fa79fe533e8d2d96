use chrono::{DateTime, Utc};
use metering_core::{ChartPoint, SeriesRow, ViewGranularity, truncate};
use metering_db::Db;

use crate::error::Result;
use crate::services::aggregation::aggregate_range;
use crate::services::{SharedConfig, open_db};

/// Materialized rows for the view, or an on-demand recompute when the
/// series store has nothing for the range yet.
pub(super) fn read_with_fallback(
    db: &Db,
    view: ViewGranularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<ChartPoint>> {
    let granularity = view.series_granularity();
    let rows = db.load_series_rows(granularity, truncate(start, granularity), end)?;
    if rows.is_empty() {
        tracing::warn!(
            view = view.as_str(),
            start = %start,
            end = %end,
            "no materialized usage series, computing from raw records"
        );
        return recompute(db, view, start, end);
    }
    Ok(rows.iter().map(SeriesRow::to_chart_point).collect())
}

pub(super) fn recompute(
    db: &Db,
    view: ViewGranularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<ChartPoint>> {
    let rows = aggregate_range(db, view.series_granularity(), start, end)?.into_rows();
    Ok(rows.iter().map(SeriesRow::to_chart_point).collect())
}

#[derive(Clone)]
pub struct ChartService {
    config: SharedConfig,
}

impl ChartService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    /// Per-`(bucket, model)` rows for a chart view, ordered by bucket then
    /// model.
    pub fn read_chart_series(
        &self,
        view: ViewGranularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ChartPoint>> {
        let db = self.db()?;
        read_with_fallback(&db, view, start, end)
    }
}
