//! Core data types for counter series and aggregated buckets

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A raw counter sample as delivered by the occupancy backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSample {
    /// ISO-8601 timestamp, parsed during aggregation
    pub timestamp: String,

    pub value: f64,
}

impl RawSample {
    pub fn new(timestamp: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
        }
    }

    /// Build a sample from an already-resolved instant
    pub fn at(instant: DateTime<Utc>, value: f64) -> Self {
        Self::new(instant.to_rfc3339_opts(SecondsFormat::Secs, true), value)
    }
}

/// All samples reported for one counter of a site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawCounterSeries {
    /// Counter name, unique within one aggregation call
    pub name: String,

    /// Incremental counts (summed) rather than instantaneous levels (averaged)
    pub is_cumulative: bool,

    #[serde(default)]
    pub samples: Vec<RawSample>,
}

impl RawCounterSeries {
    pub fn new(name: impl Into<String>, is_cumulative: bool) -> Self {
        Self {
            name: name.into(),
            is_cumulative,
            samples: Vec::new(),
        }
    }

    pub fn with_sample(mut self, timestamp: impl Into<String>, value: f64) -> Self {
        self.samples.push(RawSample::new(timestamp, value));
        self
    }

    /// How samples of this counter combine within a bucket
    pub fn aggregate_type(&self) -> AggregateType {
        if self.is_cumulative {
            AggregateType::Sum
        } else {
            AggregateType::Avg
        }
    }
}

/// Closed time range `[start, end]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Display period requested by the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranularityHint {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl GranularityHint {
    /// Lenient parse; unknown periods yield `None` so callers fall back to daily buckets
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// Bucket size actually used on the output axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    Daily,
    WeeklyInQuarter,
    Monthly,
}

/// Aggregation type for counter buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Sum,
    Avg,
}

/// Position of a bucket on the time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    /// Start of an hour, day or month
    Instant(DateTime<Utc>),

    /// Week number (1..=13) inside a calendar quarter
    QuarterWeek { year: i32, quarter: u32, week: u32 },
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Instant(instant) => {
                f.write_str(&instant.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            BucketKey::QuarterWeek {
                year,
                quarter,
                week,
            } => write!(f, "{}-Q{}-W{:02}", year, quarter, week),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid bucket key: {0}")]
pub struct BucketKeyParseError(String);

impl FromStr for BucketKey {
    type Err = BucketKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BucketKeyParseError(s.to_string());

        if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
            return Ok(BucketKey::Instant(instant.with_timezone(&Utc)));
        }

        let mut parts = s.splitn(3, '-');
        let year = parts.next().and_then(|p| p.parse::<i32>().ok());
        let quarter = parts
            .next()
            .and_then(|p| p.strip_prefix('Q'))
            .and_then(|p| p.parse::<u32>().ok());
        let week = parts
            .next()
            .and_then(|p| p.strip_prefix('W'))
            .and_then(|p| p.parse::<u32>().ok());

        match (year, quarter, week) {
            (Some(year), Some(quarter @ 1..=4), Some(week @ 1..=13)) => Ok(BucketKey::QuarterWeek {
                year,
                quarter,
                week,
            }),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BucketKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Keys every bucket and chart row carries next to the flattened counter values
pub const RESERVED_ROW_KEYS: [&str; 2] = ["time", "timeLabel"];

/// One point on the aggregated axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub time: BucketKey,

    pub time_label: String,

    /// Counter name -> aggregate; `None` when no sample fell into the bucket
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl Bucket {
    pub fn value(&self, counter: &str) -> Option<f64> {
        self.values.get(counter).copied().flatten()
    }
}

/// Sample accounting for one aggregation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    pub accepted: usize,
    pub unparseable_timestamps: usize,
    pub invalid_values: usize,
    pub out_of_range: usize,
}

impl AggregationReport {
    pub fn excluded(&self) -> usize {
        self.unparseable_timestamps + self.invalid_values + self.out_of_range
    }
}

/// Dense, gap-filled series ready for charting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSeries {
    pub granularity: Granularity,

    /// Counter names in input order
    pub counters: Vec<String>,

    pub buckets: Vec<Bucket>,

    pub report: AggregationReport,
}

impl AggregatedSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Per-bucket values of one counter, in axis order
    pub fn column(&self, counter: &str) -> Vec<Option<f64>> {
        self.buckets.iter().map(|b| b.value(counter)).collect()
    }
}

/// How a counter is drawn by the chart layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Line,
    #[default]
    Bar,
}

impl DisplayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayType::Line => "line",
            DisplayType::Bar => "bar",
        }
    }
}

/// One row handed to the chart renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRow {
    pub time: BucketKey,

    pub time_label: String,

    /// Series key (e.g. `bar_Entry_positive`) -> value
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl ChartRow {
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied().flatten()
    }
}
