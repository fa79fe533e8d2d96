use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GranularityError {
    #[error("Unsupported granularity {0:?}. Use one of: day, month, year.")]
    UnsupportedView(String),
    #[error("granularity must be one of: hour, day, month; got {0:?}")]
    UnsupportedSeries(String),
}

/// Step size of a materialized series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Hour, Granularity::Day, Granularity::Month];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = GranularityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            _ => Err(GranularityError::UnsupportedSeries(value.to_string())),
        }
    }
}

/// Chart zoom level requested by a dashboard. Each view is drawn one step
/// finer than its own span: a day view plots hours, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewGranularity {
    Day,
    Month,
    Year,
}

impl ViewGranularity {
    pub fn series_granularity(self) -> Granularity {
        match self {
            ViewGranularity::Day => Granularity::Hour,
            ViewGranularity::Month => Granularity::Day,
            ViewGranularity::Year => Granularity::Month,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewGranularity::Day => "day",
            ViewGranularity::Month => "month",
            ViewGranularity::Year => "year",
        }
    }
}

impl fmt::Display for ViewGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewGranularity {
    type Err = GranularityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(ViewGranularity::Day),
            "month" => Ok(ViewGranularity::Month),
            "year" => Ok(ViewGranularity::Year),
            _ => Err(GranularityError::UnsupportedView(value.to_string())),
        }
    }
}
