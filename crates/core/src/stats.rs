use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::granularity::ViewGranularity;
use crate::record::{DEFAULT_COST_CURRENCY, TokenCounts};
use crate::series::ChartPoint;

/// Token sums in their reporting shape (`total_*` keys).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_tokens: u64,
    pub total_cached_tokens: u64,
    pub total_reasoning_tokens: u64,
}

impl From<TokenCounts> for TokenTotals {
    fn from(tokens: TokenCounts) -> Self {
        Self {
            total_prompt_tokens: tokens.prompt_tokens,
            total_completion_tokens: tokens.completion_tokens,
            total_tokens: tokens.total_tokens,
            total_cached_tokens: tokens.cached_tokens,
            total_reasoning_tokens: tokens.reasoning_tokens,
        }
    }
}

/// Aggregate over a set of usage records as read from storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTotals {
    pub calls: u64,
    pub successful_calls: u64,
    pub tokens: TokenCounts,
    pub cost: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    #[serde(flatten)]
    pub tokens: TokenTotals,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    pub total_cost_currency: String,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
}

impl From<UsageTotals> for UsageSummary {
    fn from(totals: UsageTotals) -> Self {
        Self {
            tokens: totals.tokens.into(),
            total_cost: totals.cost.unwrap_or_default(),
            total_cost_currency: DEFAULT_COST_CURRENCY.to_string(),
            total_calls: totals.calls,
            successful_calls: totals.successful_calls,
            failed_calls: totals.calls.saturating_sub(totals.successful_calls),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub total_calls: u64,
    #[serde(flatten)]
    pub tokens: TokenTotals,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    pub total_cost_currency: String,
}

impl ModelUsage {
    pub fn new(model: String, totals: UsageTotals) -> Self {
        Self {
            model,
            total_calls: totals.calls,
            tokens: totals.tokens.into(),
            total_cost: totals.cost.unwrap_or_default(),
            total_cost_currency: DEFAULT_COST_CURRENCY.to_string(),
        }
    }
}

/// One bucket of the ad-hoc time series. Missing cost reads as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub bucket: String,
    pub total_calls: u64,
    #[serde(flatten)]
    pub tokens: TokenTotals,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
}

impl SeriesPoint {
    pub fn new(bucket: String, totals: UsageTotals) -> Self {
        Self {
            bucket,
            total_calls: totals.calls,
            tokens: totals.tokens.into(),
            total_cost: totals.cost.unwrap_or_default(),
        }
    }

    pub fn zero(bucket: String) -> Self {
        Self::new(bucket, UsageTotals::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub granularity: ViewGranularity,
    pub items: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub summary: UsageSummary,
    pub by_model: Vec<ModelUsage>,
    pub series: Option<TimeSeries>,
    /// Bucket keys the series was filled against; absent when unfilled.
    pub expected_buckets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_by_model: Option<Vec<ChartPoint>>,
}
