//! Reshape aggregated buckets into chart rows

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::types::{AggregatedSeries, ChartRow, DisplayType};

/// Separate running totals for positive and negative contributions
#[derive(Debug, Clone, Copy, Default)]
struct RunningTotals {
    positive: f64,
    negative: f64,
}

impl RunningTotals {
    /// Add a value and return the total on its side of zero
    fn push(&mut self, value: f64) -> f64 {
        if value >= 0.0 {
            self.positive += value;
            self.positive
        } else {
            self.negative += value;
            self.negative
        }
    }
}

/// Build chart rows for the selected counters.
///
/// Series keys are `{type}_{name}`; every emitted value is mirrored under an
/// `_original` suffix for tooltips. In stacked mode bars split into
/// `_positive`/`_negative` keys and lines become running totals kept apart per
/// sign. Buckets where a counter has no data get no keys for that counter.
pub fn reshape_for_chart(
    aggregated: &AggregatedSeries,
    selected: &[String],
    display_types: &HashMap<String, DisplayType>,
    stacked: bool,
) -> Vec<ChartRow> {
    let mut seen = HashSet::new();
    let counters: Vec<(&str, DisplayType)> = selected
        .iter()
        .filter(|name| seen.insert(*name))
        .filter_map(|name| {
            if !aggregated.counters.contains(name) {
                debug!(counter = %name, "Selected counter missing from aggregated series");
                return None;
            }
            let display = display_types.get(name).copied().unwrap_or_default();
            Some((name.as_str(), display))
        })
        .collect();

    let mut running = vec![RunningTotals::default(); counters.len()];

    aggregated
        .buckets
        .iter()
        .map(|bucket| {
            let mut values = BTreeMap::new();

            for ((name, display), totals) in counters.iter().zip(running.iter_mut()) {
                let Some(value) = bucket.value(name) else {
                    continue;
                };

                let series_key = format!("{}_{}", display.as_str(), name);
                values.insert(format!("{}_original", series_key), Some(value));

                match (stacked, display) {
                    (false, _) => {
                        values.insert(series_key, Some(value));
                    }
                    (true, DisplayType::Bar) => {
                        let (positive, negative) = if value >= 0.0 {
                            (Some(value), None)
                        } else {
                            (None, Some(value))
                        };
                        values.insert(format!("{}_positive", series_key), positive);
                        values.insert(format!("{}_negative", series_key), negative);
                    }
                    (true, DisplayType::Line) => {
                        values.insert(series_key, Some(totals.push(value)));
                    }
                }
            }

            ChartRow {
                time: bucket.time,
                time_label: bucket.time_label.clone(),
                values,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::types::{DateRange, RawCounterSeries};
    use chrono::{DateTime, Utc};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    /// One value per day starting 2024-03-01, `None` leaves the day empty
    fn daily_series(name: &str, values: &[Option<f64>]) -> AggregatedSeries {
        let mut series = RawCounterSeries::new(name, true);
        for (day, value) in values.iter().enumerate() {
            if let Some(v) = value {
                series = series.with_sample(format!("2024-03-{:02}T12:00:00Z", day + 1), *v);
            }
        }
        let end = format!("2024-03-{:02}T23:00:00Z", values.len());
        let range = DateRange::new(utc("2024-03-01T00:00:00Z"), utc(&end));
        aggregate(&[series], &range, None).unwrap()
    }

    fn types(name: &str, display: DisplayType) -> HashMap<String, DisplayType> {
        HashMap::from([(name.to_string(), display)])
    }

    fn column(rows: &[ChartRow], key: &str) -> Vec<Option<f64>> {
        rows.iter().map(|r| r.value(key)).collect()
    }

    #[test]
    fn test_non_stacked_passthrough() {
        let aggregated = daily_series("Entries", &[Some(5.0), Some(-3.0), Some(0.0)]);
        let rows = reshape_for_chart(
            &aggregated,
            &["Entries".to_string()],
            &types("Entries", DisplayType::Line),
            false,
        );

        assert_eq!(rows.len(), 3);
        assert_eq!(column(&rows, "line_Entries"), vec![Some(5.0), Some(-3.0), Some(0.0)]);
        assert_eq!(
            column(&rows, "line_Entries_original"),
            vec![Some(5.0), Some(-3.0), Some(0.0)]
        );
        assert_eq!(rows[0].time_label, aggregated.buckets[0].time_label);
    }

    #[test]
    fn test_stacked_bar_sign_separation() {
        let aggregated = daily_series("Flow", &[Some(5.0), Some(-3.0), Some(0.0)]);
        let rows = reshape_for_chart(
            &aggregated,
            &["Flow".to_string()],
            &types("Flow", DisplayType::Bar),
            true,
        );

        assert_eq!(column(&rows, "bar_Flow_positive"), vec![Some(5.0), None, Some(0.0)]);
        assert_eq!(column(&rows, "bar_Flow_negative"), vec![None, Some(-3.0), None]);
        assert_eq!(
            column(&rows, "bar_Flow_original"),
            vec![Some(5.0), Some(-3.0), Some(0.0)]
        );
        // Nulls are explicit so both stacks stay aligned
        assert_eq!(rows[1].values.get("bar_Flow_positive"), Some(&None));
        assert!(!rows[0].values.contains_key("bar_Flow"));
    }

    #[test]
    fn test_stacked_line_keeps_separate_running_totals() {
        let aggregated = daily_series("Net", &[Some(5.0), Some(-3.0), Some(2.0), Some(-1.0)]);
        let rows = reshape_for_chart(
            &aggregated,
            &["Net".to_string()],
            &types("Net", DisplayType::Line),
            true,
        );

        assert_eq!(
            column(&rows, "line_Net"),
            vec![Some(5.0), Some(-3.0), Some(7.0), Some(-4.0)]
        );
        assert_eq!(
            column(&rows, "line_Net_original"),
            vec![Some(5.0), Some(-3.0), Some(2.0), Some(-1.0)]
        );
    }

    #[test]
    fn test_null_bucket_contributes_no_keys() {
        let aggregated = daily_series("Net", &[Some(2.0), None, Some(3.0)]);
        let rows = reshape_for_chart(
            &aggregated,
            &["Net".to_string()],
            &types("Net", DisplayType::Line),
            true,
        );

        assert!(rows[1].values.is_empty());
        assert_eq!(column(&rows, "line_Net"), vec![Some(2.0), None, Some(5.0)]);
    }

    #[test]
    fn test_default_display_type_is_bar() {
        let aggregated = daily_series("Entries", &[Some(1.0), Some(2.0)]);
        let rows = reshape_for_chart(&aggregated, &["Entries".to_string()], &HashMap::new(), false);

        assert_eq!(column(&rows, "bar_Entries"), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_unselected_and_unknown_counters_skipped() {
        let aggregated = daily_series("Entries", &[Some(1.0), Some(2.0)]);
        let rows = reshape_for_chart(&aggregated, &["Missing".to_string()], &HashMap::new(), false);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.values.is_empty()));

        let rows = reshape_for_chart(&aggregated, &[], &HashMap::new(), true);
        assert!(rows.iter().all(|r| r.values.is_empty()));
    }
}
