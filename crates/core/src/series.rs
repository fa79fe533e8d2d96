use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bucket::{format_bucket, truncate};
use crate::granularity::Granularity;
use crate::record::{DEFAULT_COST_CURRENCY, TokenCounts, UsageRecord};
use crate::stats::TokenTotals;

const LATENCY_PLACES: i32 = 4;
const THROUGHPUT_PLACES: i32 = 2;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, sample: Option<f64>) {
        if let Some(sample) = sample {
            self.sum += sample;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Running totals for one `(bucket, model)` group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    pub call_count: u64,
    pub success_count: u64,
    pub tokens: TokenCounts,
    /// `None` until some record in the group carries a cost.
    pub total_cost: Option<Decimal>,
    pub cost_currency: Option<String>,
    e2e_latency: Mean,
    ttft: Mean,
    output_tps: Mean,
}

impl GroupStats {
    pub fn push(&mut self, record: &UsageRecord) {
        self.call_count += 1;
        if record.success {
            self.success_count += 1;
        }
        self.tokens = self.tokens.saturating_add(record.tokens);
        if let Some(cost) = record.cost {
            self.total_cost = Some(self.total_cost.unwrap_or_default() + cost);
        }
        // Currency is assumed constant system-wide; the last one seen wins.
        let currency = record.cost_currency.trim();
        if !currency.is_empty() {
            self.cost_currency = Some(currency.to_string());
        }
        self.e2e_latency.push(record.e2e_latency_secs());
        self.ttft.push(record.ttft_secs());
        self.output_tps.push(record.output_tps());
    }

    pub fn avg_e2e_latency_sec(&self) -> Option<f64> {
        self.e2e_latency
            .value()
            .map(|value| round_to(value, LATENCY_PLACES))
    }

    pub fn avg_ttft_sec(&self) -> Option<f64> {
        self.ttft.value().map(|value| round_to(value, LATENCY_PLACES))
    }

    /// Mean of per-call throughputs, not total tokens over total time.
    pub fn avg_output_tps(&self) -> Option<f64> {
        self.output_tps
            .value()
            .map(|value| round_to(value, THROUGHPUT_PLACES))
    }
}

/// Materialized per-`(granularity, bucket, model)` usage.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub granularity: Granularity,
    pub bucket: DateTime<Utc>,
    pub model: String,
    pub call_count: u64,
    pub success_count: u64,
    pub tokens: TokenCounts,
    pub total_cost: Option<Decimal>,
    pub cost_currency: String,
    pub avg_e2e_latency_sec: Option<f64>,
    pub avg_ttft_sec: Option<f64>,
    pub avg_output_tps: Option<f64>,
}

impl SeriesRow {
    pub fn from_group(
        granularity: Granularity,
        bucket: DateTime<Utc>,
        model: String,
        group: &GroupStats,
    ) -> Self {
        Self {
            granularity,
            bucket,
            model,
            call_count: group.call_count,
            success_count: group.success_count,
            tokens: group.tokens,
            total_cost: group.total_cost,
            cost_currency: group
                .cost_currency
                .clone()
                .unwrap_or_else(|| DEFAULT_COST_CURRENCY.to_string()),
            avg_e2e_latency_sec: group.avg_e2e_latency_sec(),
            avg_ttft_sec: group.avg_ttft_sec(),
            avg_output_tps: group.avg_output_tps(),
        }
    }

    pub fn to_chart_point(&self) -> ChartPoint {
        ChartPoint {
            bucket: format_bucket(self.bucket, self.granularity),
            model: self.model.clone(),
            call_count: self.call_count,
            success_count: self.success_count,
            avg_e2e_latency_sec: self.avg_e2e_latency_sec,
            avg_ttft_sec: self.avg_ttft_sec,
            avg_output_tps: self.avg_output_tps,
            tokens: self.tokens.into(),
            total_cost: self.total_cost,
            cost_currency: self.cost_currency.clone(),
        }
    }
}

/// By-model chart row as served to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub bucket: String,
    pub model: String,
    pub call_count: u64,
    pub success_count: u64,
    pub avg_e2e_latency_sec: Option<f64>,
    pub avg_ttft_sec: Option<f64>,
    pub avg_output_tps: Option<f64>,
    #[serde(flatten)]
    pub tokens: TokenTotals,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub total_cost: Option<Decimal>,
    pub cost_currency: String,
}

/// Groups usage records by `(bucket, model)` for one granularity.
#[derive(Debug, Clone)]
pub struct SeriesAggregator {
    granularity: Granularity,
    groups: BTreeMap<(DateTime<Utc>, String), GroupStats>,
}

impl SeriesAggregator {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            groups: BTreeMap::new(),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn push(&mut self, record: &UsageRecord) {
        let bucket = truncate(record.created_at, self.granularity);
        self.groups
            .entry((bucket, record.model_key().to_string()))
            .or_default()
            .push(record);
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a UsageRecord>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, bucket: DateTime<Utc>, model: &str) -> Option<&GroupStats> {
        self.groups.get(&(bucket, model.to_string()))
    }

    /// Rows ordered by bucket, then model.
    pub fn into_rows(self) -> Vec<SeriesRow> {
        let granularity = self.granularity;
        self.groups
            .into_iter()
            .map(|((bucket, model), group)| SeriesRow::from_group(granularity, bucket, model, &group))
            .collect()
    }
}
