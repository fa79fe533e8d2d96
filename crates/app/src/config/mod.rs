use serde::{Deserialize, Serialize};

/// Raw query parameters of the usage stats endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StatsParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub user_id: Option<String>,
    pub granularity: Option<String>,
    pub use_series: Option<String>,
}

impl StatsParams {
    pub fn wants_materialized_series(&self) -> bool {
        matches!(
            self.use_series
                .as_deref()
                .map(|value| value.trim().to_ascii_lowercase())
                .as_deref(),
            Some("1" | "true" | "yes")
        )
    }
}

/// Raw parameters of a manual aggregation run.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AggregateParams {
    pub granularity: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Raw query parameters of the admin record listing.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RecordListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub user_id: Option<String>,
    pub model: Option<String>,
    pub success: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}
