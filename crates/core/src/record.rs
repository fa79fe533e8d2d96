use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COST_CURRENCY: &str = "USD";
pub const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cached_tokens: u64,
    pub reasoning_tokens: u64,
}

impl TokenCounts {
    pub fn saturating_add(self, other: TokenCounts) -> TokenCounts {
        TokenCounts {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
            cached_tokens: self.cached_tokens.saturating_add(other.cached_tokens),
            reasoning_tokens: self.reasoning_tokens.saturating_add(other.reasoning_tokens),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("first_chunk_at {first_chunk_at} is before started_at {started_at}")]
    FirstChunkBeforeStart {
        started_at: DateTime<Utc>,
        first_chunk_at: DateTime<Utc>,
    },
    #[error("created_at {created_at} is before started_at {started_at}")]
    CreatedBeforeStart {
        started_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    },
}

/// One tracked LLM call. `created_at` marks completion and is always set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub model: String,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub cost: Option<Decimal>,
    pub cost_currency: String,
    pub success: bool,
    pub error: Option<String>,
    pub is_streaming: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub first_chunk_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn seconds(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

impl UsageRecord {
    pub fn validate(&self) -> Result<(), RecordError> {
        let Some(started_at) = self.started_at else {
            return Ok(());
        };
        if let Some(first_chunk_at) = self.first_chunk_at
            && first_chunk_at < started_at
        {
            return Err(RecordError::FirstChunkBeforeStart {
                started_at,
                first_chunk_at,
            });
        }
        if self.created_at < started_at {
            return Err(RecordError::CreatedBeforeStart {
                started_at,
                created_at: self.created_at,
            });
        }
        Ok(())
    }

    /// Grouping key for the model; blank names collapse into `unknown`.
    pub fn model_key(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty() { UNKNOWN_MODEL } else { model }
    }

    pub fn e2e_latency_secs(&self) -> Option<f64> {
        let started_at = self.started_at?;
        Some(seconds(self.created_at - started_at).max(0.0))
    }

    /// Only streamed calls have a meaningful first chunk.
    pub fn ttft_secs(&self) -> Option<f64> {
        if !self.is_streaming {
            return None;
        }
        let started_at = self.started_at?;
        let first_chunk_at = self.first_chunk_at?;
        Some(seconds(first_chunk_at - started_at).max(0.0))
    }

    pub fn output_tps(&self) -> Option<f64> {
        let e2e = self.e2e_latency_secs()?;
        if e2e <= 0.0 {
            return None;
        }
        Some(self.tokens.completion_tokens as f64 / e2e)
    }
}
