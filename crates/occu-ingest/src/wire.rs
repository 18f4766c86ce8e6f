//! Backend occupancy payload and its mapping to counter series

use occu_core::{RawCounterSeries, RawSample, RESERVED_ROW_KEYS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::IngestResult;

/// A sample value as the backend sends it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WireValue {
    Number(f64),
    Text(String),
    #[default]
    Null,
}

impl WireValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Number(v) => Some(*v),
            WireValue::Text(s) => s.trim().parse::<f64>().ok(),
            WireValue::Null => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireSample {
    #[serde(alias = "timestamp")]
    pub time: String,

    #[serde(default)]
    pub value: WireValue,
}

/// One counter in the occupancy response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireCounter {
    pub name: String,

    /// `true` for counters whose values are summed (entries/exits)
    #[serde(rename = "type", default)]
    pub cumulative: bool,

    #[serde(default)]
    pub data: Vec<WireSample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OccupancyPayload {
    #[serde(default)]
    pub counters: Vec<WireCounter>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PayloadShape {
    Wrapped(OccupancyPayload),
    Bare(Vec<WireCounter>),
}

/// Outcome of mapping a payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingReport {
    pub counters: usize,
    pub samples: usize,
    pub dropped_values: usize,
    pub merged_duplicates: usize,
    /// Counters dropped because their name collides with a row key
    pub reserved_names: usize,
}

/// Parse either `{"counters": [...]}` or a bare counter array
pub fn parse_payload(bytes: &[u8]) -> IngestResult<OccupancyPayload> {
    let shape: PayloadShape = serde_json::from_slice(bytes)?;
    Ok(match shape {
        PayloadShape::Wrapped(payload) => payload,
        PayloadShape::Bare(counters) => OccupancyPayload { counters },
    })
}

impl OccupancyPayload {
    /// Map into counter series with unique names.
    ///
    /// Samples without a numeric value are dropped. A repeated counter name
    /// is merged into its first occurrence, keeping that occurrence's type.
    /// Counters named like a row key (`time`, `timeLabel`) are dropped.
    pub fn into_series(self) -> (Vec<RawCounterSeries>, MappingReport) {
        let mut report = MappingReport::default();
        let mut series: Vec<RawCounterSeries> = Vec::with_capacity(self.counters.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for counter in self.counters {
            if RESERVED_ROW_KEYS.contains(&counter.name.as_str()) {
                warn!(counter = %counter.name, "Counter name collides with a row key; dropped");
                report.reserved_names += 1;
                continue;
            }

            let slot = match index.get(&counter.name) {
                Some(&slot) => {
                    report.merged_duplicates += 1;
                    if series[slot].is_cumulative != counter.cumulative {
                        warn!(counter = %counter.name, "Duplicate counter with conflicting type");
                    }
                    slot
                }
                None => {
                    index.insert(counter.name.clone(), series.len());
                    series.push(RawCounterSeries::new(counter.name.clone(), counter.cumulative));
                    series.len() - 1
                }
            };

            for sample in counter.data {
                match sample.value.as_f64() {
                    Some(value) => {
                        series[slot].samples.push(RawSample::new(sample.time, value));
                        report.samples += 1;
                    }
                    None => report.dropped_values += 1,
                }
            }
        }

        report.counters = series.len();
        let cleaned = report.dropped_values + report.merged_duplicates + report.reserved_names;
        if cleaned > 0 {
            warn!(
                dropped = report.dropped_values,
                merged = report.merged_duplicates,
                reserved = report.reserved_names,
                "Occupancy payload needed cleanup"
            );
        }

        (series, report)
    }
}
