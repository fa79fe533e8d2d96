use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::record::TokenCounts;

/// Per-million-token rates for models matching `model_pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRate {
    pub model_pattern: String,
    pub input_per_1m: Decimal,
    #[serde(default)]
    pub cached_input_per_1m: Decimal,
    pub output_per_1m: Decimal,
}

impl PricingRate {
    pub fn matches(&self, model: &str) -> bool {
        model_matches_pattern(model, &self.model_pattern)
    }
}

/// Case-insensitive match where `*` stands for any run of characters.
pub fn model_matches_pattern(model: &str, pattern: &str) -> bool {
    let model = model.trim().to_ascii_lowercase();
    let pattern = pattern.trim().to_ascii_lowercase();
    let mut segments = pattern.split('*');
    let Some(head) = segments.next() else {
        return false;
    };
    if !pattern.contains('*') {
        return model == pattern;
    }
    let Some(mut rest) = model.strip_prefix(head) else {
        return false;
    };
    let tail: Vec<&str> = segments.collect();
    let Some((last, middle)) = tail.split_last() else {
        return true;
    };
    for segment in middle.iter().filter(|segment| !segment.is_empty()) {
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Cost of one call. Cached prompt tokens are billed at the cached rate and
/// reasoning tokens are part of the completion count.
pub fn compute_cost(tokens: TokenCounts, rate: &PricingRate) -> Decimal {
    let per_token = Decimal::from(1_000_000u32);
    let cached = tokens.cached_tokens.min(tokens.prompt_tokens);
    let uncached = tokens.prompt_tokens - cached;
    let input = Decimal::from(uncached) * rate.input_per_1m;
    let cached_input = Decimal::from(cached) * rate.cached_input_per_1m;
    let output = Decimal::from(tokens.completion_tokens) * rate.output_per_1m;
    (input + cached_input + output) / per_token
}
