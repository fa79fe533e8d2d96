use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use metering_core::Granularity;

use crate::error::{AppError, Result};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const HOURLY_LOOKBACK_HOURS: i64 = 2;

/// Blank means UTC; unknown names are rejected.
pub fn parse_timezone(value: &str) -> Result<Tz> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(chrono_tz::UTC);
    }
    value
        .parse::<Tz>()
        .map_err(|_| AppError::InvalidInput(format!("unknown timezone {value:?}")))
}

/// Parses an ISO-8601 datetime or a bare date, keeping the caller's offset.
/// Values without an offset are taken as UTC.
pub fn parse_datetime(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(parsed);
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    }
    Err(AppError::InvalidInput(format!("invalid date {value:?}")))
}

pub fn parse_start_date(value: Option<&str>) -> Result<Option<DateTime<FixedOffset>>> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_datetime(value).map(Some),
        None => Ok(None),
    }
}

/// Like [`parse_start_date`], but a bare date covers that whole day.
pub fn parse_end_date(value: Option<&str>) -> Result<Option<DateTime<FixedOffset>>> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let parsed = parse_datetime(value)?;
    if is_date_only(value) {
        return end_of_day(parsed.date_naive()).map(|end| Some(end.fixed_offset()));
    }
    Ok(Some(parsed))
}

fn is_date_only(value: &str) -> bool {
    !value.contains('T') && !value.contains(' ') && value.len() <= 10
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_micro_opt(23, 59, 59, 999_999)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::InvalidInput(format!("invalid date {date}")))
}

fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    // Midnight can fall inside a DST gap; the first valid instant after it wins.
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| AppError::Message(format!("no local time {naive} in {tz}")))
}

fn local_day_range(tz: Tz, first: NaiveDate, last: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_to_utc(tz, first.and_time(NaiveTime::MIN))?;
    let next = last
        .succ_opt()
        .ok_or_else(|| AppError::Message(format!("no day after {last}")))?;
    let end = local_to_utc(tz, next.and_time(NaiveTime::MIN))? - TimeDelta::microseconds(1);
    Ok((start, end))
}

/// Range a scheduled run covers when none is given: the last two hours for
/// `hour`, yesterday for `day` and the previous month for `month`. Calendar
/// boundaries are read in `tz` and returned in UTC.
pub fn default_range(
    granularity: Granularity,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let today = now.with_timezone(&tz).date_naive();
    match granularity {
        Granularity::Hour => Ok((now - TimeDelta::hours(HOURLY_LOOKBACK_HOURS), now)),
        Granularity::Day => {
            let yesterday = today
                .pred_opt()
                .ok_or_else(|| AppError::Message(format!("no day before {today}")))?;
            local_day_range(tz, yesterday, yesterday)
        }
        Granularity::Month => {
            let first_this_month = today.with_day(1).unwrap_or(today);
            let last_prev = first_this_month
                .pred_opt()
                .ok_or_else(|| AppError::Message(format!("no day before {first_this_month}")))?;
            let first_prev = last_prev.with_day(1).unwrap_or(last_prev);
            local_day_range(tz, first_prev, last_prev)
        }
    }
}
