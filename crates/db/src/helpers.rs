use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use metering_core::Granularity;
use rusqlite::Row;
use rusqlite::types::{Type, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{DbError, Result};
use crate::types::{RecordListFilter, UsageFilter};

const MICROS_SCALE: u32 = 6;

/// Fixed-width UTC text so that string order matches time order.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_ts(&value).map_err(|err| conversion_failure(idx, err))
}

pub(crate) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|value| parse_ts(&value).map_err(|err| conversion_failure(idx, err)))
        .transpose()
}

pub(crate) fn get_granularity(row: &Row<'_>, idx: usize) -> rusqlite::Result<Granularity> {
    let value: String = row.get(idx)?;
    value
        .parse::<Granularity>()
        .map_err(|err| conversion_failure(idx, err))
}

pub(crate) fn get_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0).max(0) as u64)
}

pub(crate) fn get_cost(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(micros_to_decimal))
}

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn decimal_to_micros(value: Decimal) -> Result<i64> {
    value
        .round_dp(MICROS_SCALE)
        .checked_mul(Decimal::from(1_000_000))
        .and_then(|micros| micros.to_i64())
        .ok_or_else(|| DbError::InvalidValue(format!("cost {value} out of range")))
}

pub(crate) fn micros_to_decimal(micros: i64) -> Decimal {
    Decimal::new(micros, MICROS_SCALE)
}

pub(crate) fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Prefix of the stored timestamp that identifies a bucket.
pub(crate) fn bucket_prefix_len(granularity: Granularity) -> i64 {
    match granularity {
        Granularity::Hour => 13,
        Granularity::Day => 10,
        Granularity::Month => 7,
    }
}

pub(crate) fn parse_bucket_prefix(prefix: &str, granularity: Granularity) -> Result<DateTime<Utc>> {
    let full = match granularity {
        Granularity::Hour => format!("{prefix}:00:00"),
        Granularity::Day => format!("{prefix}T00:00:00"),
        Granularity::Month => format!("{prefix}-01T00:00:00"),
    };
    Ok(NaiveDateTime::parse_from_str(&full, "%Y-%m-%dT%H:%M:%S")?.and_utc())
}

/// Stored models are trimmed on insert; the ASCII whitespace set here also
/// covers rows written before that.
pub(crate) const MODEL_KEY_SQL: &str = "CASE WHEN trim(model, ' ' || char(9, 10, 11, 12, 13)) = '' \
     THEN 'unknown' ELSE trim(model, ' ' || char(9, 10, 11, 12, 13)) END";

pub(crate) fn filter_clause(filter: &UsageFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    push_usage_conditions(filter, &mut clauses, &mut values);
    (where_clause(&clauses), values)
}

/// Range and user conditions plus the listing's model and success filters.
pub(crate) fn list_filter_clause(filter: &RecordListFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    push_usage_conditions(&filter.usage, &mut clauses, &mut values);
    if let Some(model) = filter.model.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        values.push(Value::Text(model.to_lowercase()));
        clauses.push(format!("instr(lower(model), ?{}) > 0", values.len()));
    }
    if let Some(success) = filter.success {
        values.push(Value::Integer(i64::from(success)));
        clauses.push(format!("success = ?{}", values.len()));
    }
    (where_clause(&clauses), values)
}

fn push_usage_conditions(filter: &UsageFilter, clauses: &mut Vec<String>, values: &mut Vec<Value>) {
    if let Some(start) = filter.start {
        values.push(Value::Text(format_ts(start)));
        clauses.push(format!("created_at >= ?{}", values.len()));
    }
    if let Some(end) = filter.end {
        values.push(Value::Text(format_ts(end)));
        clauses.push(format!("created_at <= ?{}", values.len()));
    }
    if let Some(user_id) = filter.user_id.as_deref().filter(|value| !value.is_empty()) {
        values.push(Value::Text(user_id.to_string()));
        clauses.push(format!("user_id = ?{}", values.len()));
    }
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}
