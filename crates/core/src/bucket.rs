use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta,
    TimeZone, Timelike, Utc,
};

use crate::granularity::{Granularity, ViewGranularity};

/// Normalizes a timestamp to UTC. Naive values are taken to already be UTC
/// wall-clock time.
pub trait IntoUtc {
    fn into_utc(self) -> DateTime<Utc>;
}

impl IntoUtc for NaiveDateTime {
    fn into_utc(self) -> DateTime<Utc> {
        self.and_utc()
    }
}

impl<Tz: TimeZone> IntoUtc for DateTime<Tz> {
    fn into_utc(self) -> DateTime<Utc> {
        self.with_timezone(&Utc)
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(i64::from(date.day0()))
}

/// Start of the bucket containing `ts`, in UTC.
pub fn truncate(ts: impl IntoUtc, granularity: Granularity) -> DateTime<Utc> {
    let ts = ts.into_utc();
    let date = ts.date_naive();
    match granularity {
        Granularity::Hour => start_of_day(date) + TimeDelta::hours(i64::from(ts.hour())),
        Granularity::Day => start_of_day(date),
        Granularity::Month => start_of_day(first_of_month(date)),
    }
}

/// Last stored instant (microsecond precision) of the bucket containing `ts`.
pub fn bucket_end(ts: impl IntoUtc, granularity: Granularity) -> DateTime<Utc> {
    let start = truncate(ts, granularity);
    let next = match granularity {
        Granularity::Hour => start.checked_add_signed(TimeDelta::hours(1)),
        Granularity::Day => start.checked_add_signed(TimeDelta::days(1)),
        Granularity::Month => start.checked_add_months(Months::new(1)),
    };
    next.map_or(DateTime::<Utc>::MAX_UTC, |next| next - TimeDelta::microseconds(1))
}

/// Every bucket a filled series over `[start, end]` must contain, oldest
/// first, with no gaps.
///
/// Hour and day stepping work on the UTC-normalized bounds. Month stepping
/// (year view) reads year and month from each bound in its own offset, so an
/// end of `2026-12-31T23:59:59-08:00` still stops at December 2026 even though
/// it is already January 2027 in UTC.
pub fn expected_buckets<Tz: TimeZone>(
    view: ViewGranularity,
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
) -> Vec<DateTime<Utc>> {
    match view {
        ViewGranularity::Day => hour_buckets(start.clone().into_utc(), end.clone().into_utc()),
        ViewGranularity::Month => day_buckets(
            start.clone().into_utc().date_naive(),
            end.clone().into_utc().date_naive(),
        ),
        ViewGranularity::Year => month_buckets(
            (start.year(), start.month()),
            (end.year(), end.month()),
        ),
    }
}

fn hour_buckets(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut current = truncate(start, Granularity::Hour);
    let end = truncate(end, Granularity::Hour);
    let mut out = Vec::new();
    while current <= end {
        out.push(current);
        current += TimeDelta::hours(1);
    }
    out
}

fn day_buckets(start: NaiveDate, end: NaiveDate) -> Vec<DateTime<Utc>> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(start_of_day)
        .collect()
}

fn month_buckets(start: (i32, u32), end: (i32, u32)) -> Vec<DateTime<Utc>> {
    let month_index = |(year, month): (i32, u32)| i64::from(year) * 12 + i64::from(month) - 1;
    (month_index(start)..=month_index(end))
        .filter_map(|index| {
            let year = i32::try_from(index.div_euclid(12)).ok()?;
            let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
            NaiveDate::from_ymd_opt(year, month, 1)
        })
        .map(start_of_day)
        .collect()
}

/// Display form of a bucket: date-only for day buckets, full RFC 3339 with an
/// explicit `+00:00` offset otherwise.
pub fn format_bucket(bucket: DateTime<Utc>, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => bucket.date_naive().format("%Y-%m-%d").to_string(),
        Granularity::Hour | Granularity::Month => bucket.to_rfc3339_opts(SecondsFormat::Secs, false),
    }
}
