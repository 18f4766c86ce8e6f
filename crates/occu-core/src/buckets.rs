//! Time axis generation and sample bucketing
//!
//! All calendar arithmetic happens in UTC. Keys produced by [`bucket_key`]
//! always line up with the keys generated by [`bucket_axis`] for the same
//! granularity, so assignment is a plain lookup.

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
    Utc,
};

use crate::types::{BucketKey, DateRange, Granularity, GranularityHint};

/// Weeks per quarter; later days fold into the last week
pub const MAX_QUARTER_WEEK: u32 = 13;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Pick the bucket size for a range and display period
pub fn select_granularity(range: &DateRange, hint: Option<GranularityHint>) -> Granularity {
    let span = range.span();

    if hint == Some(GranularityHint::Daily) || span <= Duration::days(1) {
        Granularity::Hourly
    } else if hint == Some(GranularityHint::Quarterly) {
        Granularity::WeeklyInQuarter
    } else if hint == Some(GranularityHint::Yearly) || span > Duration::days(365) {
        Granularity::Monthly
    } else {
        Granularity::Daily
    }
}

/// Complete ordered list of bucket keys covering the range
pub fn bucket_axis(granularity: Granularity, range: &DateRange) -> Vec<BucketKey> {
    let first_day = range.start.date_naive();
    let last_day = range.end.date_naive();

    match granularity {
        Granularity::Hourly => {
            let midnight = start_of_day(first_day);
            (0..24)
                .map(|hour| BucketKey::Instant(midnight + Duration::hours(hour)))
                .collect()
        }
        Granularity::Daily => days(first_day, last_day)
            .map(|day| BucketKey::Instant(start_of_day(day)))
            .collect(),
        Granularity::Monthly => {
            let last = start_of_month(last_day);
            std::iter::successors(Some(start_of_month(first_day)), |month| {
                month.checked_add_months(Months::new(1))
            })
            .take_while(|month| *month <= last)
            .map(|month| BucketKey::Instant(start_of_day(month)))
            .collect()
        }
        Granularity::WeeklyInQuarter => {
            let mut axis: Vec<BucketKey> = Vec::new();
            for day in days(first_day, last_day) {
                let key = quarter_week(day);
                if axis.last() != Some(&key) {
                    axis.push(key);
                }
            }
            axis
        }
    }
}

/// Bucket an instant falls into (left-closed: boundaries start their bucket)
pub fn bucket_key(granularity: Granularity, instant: DateTime<Utc>) -> BucketKey {
    let day = instant.date_naive();

    match granularity {
        Granularity::Hourly => {
            BucketKey::Instant(start_of_day(day) + Duration::hours(i64::from(instant.hour())))
        }
        Granularity::Daily => BucketKey::Instant(start_of_day(day)),
        Granularity::Monthly => BucketKey::Instant(start_of_day(start_of_month(day))),
        Granularity::WeeklyInQuarter => quarter_week(day),
    }
}

/// Week-of-quarter key, clamped to [`MAX_QUARTER_WEEK`]
pub fn quarter_week(day: NaiveDate) -> BucketKey {
    let quarter = day.month0() / 3 + 1;

    let mut quarter_start = start_of_month(day);
    for _ in 0..(day.month0() % 3) {
        quarter_start = start_of_month(quarter_start - Duration::days(1));
    }

    let days_since = (day - quarter_start).num_days();
    let week = ((days_since + 1 + 6) / 7) as u32;

    BucketKey::QuarterWeek {
        year: day.year(),
        quarter,
        week: week.min(MAX_QUARTER_WEEK),
    }
}

/// Human readable label for a bucket
pub fn bucket_label(granularity: Granularity, key: &BucketKey) -> String {
    match (granularity, key) {
        (Granularity::Hourly, BucketKey::Instant(t)) => t.format("%Y-%m-%d %H:%M").to_string(),
        (Granularity::Daily, BucketKey::Instant(t)) => t.format("%a-%-d").to_string(),
        (Granularity::Monthly, BucketKey::Instant(t)) => t.format("%b %Y").to_string(),
        _ => key.to_string(),
    }
}

/// Parse a backend timestamp; offset-less timestamps are taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

fn start_of_month(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.day0()))
}

fn days(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    // succ_opt ends the walk at the last representable date
    std::iter::successors(Some(first), |day| day.succ_opt()).take_while(move |day| *day <= last)
}
