use std::sync::Arc;

use chrono::{DateTime, Utc};
use metering_core::{DEFAULT_COST_CURRENCY, PricingRate, TokenCounts, UsageRecord, compute_cost};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};

const CACHED_TOKEN_DETAILS: &[&str] = &["prompt_tokens_details", "input_token_details"];
const CACHED_TOKEN_KEYS: &[&str] = &["cached_tokens", "cache_read_tokens", "cache_read"];
const REASONING_TOKEN_DETAILS: &[&str] = &["completion_tokens_details", "output_token_details"];
const REASONING_TOKEN_KEYS: &[&str] = &["reasoning_tokens", "reasoning"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CostEstimateError {
    #[error("no pricing for model {0:?}")]
    UnknownModel(String),
    #[error("cost estimation failed: {0}")]
    Failed(String),
}

/// Prices a call when the provider did not report a cost.
pub trait CostEstimator: Send + Sync {
    fn estimate(&self, model: &str, tokens: &TokenCounts) -> std::result::Result<Decimal, CostEstimateError>;
}

/// Per-million-token rates; the first matching pattern wins.
#[derive(Debug, Clone, Default)]
pub struct PatternPricing {
    rates: Vec<PricingRate>,
}

impl PatternPricing {
    pub fn new(rates: Vec<PricingRate>) -> Self {
        Self { rates }
    }
}

impl CostEstimator for PatternPricing {
    fn estimate(&self, model: &str, tokens: &TokenCounts) -> std::result::Result<Decimal, CostEstimateError> {
        self.rates
            .iter()
            .find(|rate| rate.matches(model))
            .map(|rate| compute_cost(*tokens, rate))
            .ok_or_else(|| CostEstimateError::UnknownModel(model.to_string()))
    }
}

fn default_success() -> bool {
    true
}

/// A finished LLM call as reported by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_chunk_at: Option<DateTime<Utc>>,
    /// Completion time; defaults to when the call is recorded.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub cost_currency: Option<String>,
    /// Provider usage payload in any of the common shapes.
    #[serde(default)]
    pub usage: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn read_count(object: &Value, key: &str) -> u64 {
    object.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn read_nested_count(object: &Value, containers: &[&str], keys: &[&str]) -> u64 {
    let Some(details) = containers
        .iter()
        .filter_map(|container| object.get(*container))
        .find(|details| details.is_object())
    else {
        return 0;
    };
    keys.iter()
        .map(|key| read_count(details, key))
        .find(|value| *value > 0)
        .unwrap_or(0)
}

/// Canonical token counts from a provider usage object. Missing, negative
/// or non-integer values count as zero.
pub fn normalize_usage(usage: &Value) -> TokenCounts {
    if !usage.is_object() {
        return TokenCounts::default();
    }
    let prompt_tokens = read_count(usage, "prompt_tokens");
    let completion_tokens = read_count(usage, "completion_tokens");
    let total_tokens = match read_count(usage, "total_tokens") {
        0 => prompt_tokens.saturating_add(completion_tokens),
        total => total,
    };
    let cached_tokens = match read_count(usage, "cached_tokens") {
        0 => read_nested_count(usage, CACHED_TOKEN_DETAILS, CACHED_TOKEN_KEYS),
        cached => cached,
    };
    let reasoning_tokens = match read_count(usage, "reasoning_tokens") {
        0 => read_nested_count(usage, REASONING_TOKEN_DETAILS, REASONING_TOKEN_KEYS),
        reasoning => reasoning,
    };
    TokenCounts {
        prompt_tokens,
        completion_tokens,
        total_tokens,
        cached_tokens,
        reasoning_tokens,
    }
}

#[derive(Clone)]
pub struct TrackingService {
    config: SharedConfig,
    estimator: Arc<dyn CostEstimator>,
}

impl TrackingService {
    pub(super) fn new(config: SharedConfig, estimator: Arc<dyn CostEstimator>) -> Self {
        Self { config, estimator }
    }

    /// Builds the stored record for a call without persisting it.
    pub fn to_record(&self, call: &CompletedCall) -> Result<UsageRecord> {
        let tokens = normalize_usage(&call.usage);
        let cost = match call.cost {
            Some(cost) => Some(cost),
            None => match self.estimator.estimate(&call.model, &tokens) {
                Ok(cost) => Some(cost),
                Err(err) => {
                    tracing::debug!(model = %call.model, error = %err, "no cost for usage record");
                    None
                }
            },
        };
        let record = UsageRecord {
            id: call
                .id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id: call.user_id.clone().filter(|id| !id.trim().is_empty()),
            model: call.model.trim().to_string(),
            tokens,
            cost,
            cost_currency: call
                .cost_currency
                .clone()
                .filter(|currency| !currency.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COST_CURRENCY.to_string()),
            success: call.success && call.error.is_none(),
            error: call.error.clone(),
            is_streaming: call.is_streaming,
            started_at: call.started_at,
            first_chunk_at: call.first_chunk_at,
            created_at: call.finished_at.unwrap_or_else(Utc::now),
        };
        record.validate()?;
        Ok(record)
    }

    /// Normalizes and stores one call.
    pub fn record(&self, call: &CompletedCall) -> Result<UsageRecord> {
        let record = self.to_record(call)?;
        let metadata = call.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let mut db = open_db(&self.config)?;
        db.insert_usage_record(&record, metadata.as_deref())?;
        Ok(record)
    }
}
