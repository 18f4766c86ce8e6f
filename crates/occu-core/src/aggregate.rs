//! Counter series aggregation onto a dense bucket axis

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::buckets::{bucket_axis, bucket_key, bucket_label, parse_timestamp, select_granularity};
use crate::rollups::Accumulator;
use crate::types::{
    AggregatedSeries, AggregationReport, Bucket, BucketKey, DateRange, GranularityHint,
    RawCounterSeries,
};
use crate::{AggregateError, CoreResult};

/// Bucket raw counter samples into a gap-filled series covering the whole range.
///
/// Every generated bucket appears in the output and every input counter has a
/// value (possibly `None`) in every bucket. Samples with unparseable
/// timestamps, non-finite values or instants outside the range are excluded
/// and counted in [`AggregatedSeries::report`].
pub fn aggregate(
    series: &[RawCounterSeries],
    range: &DateRange,
    hint: Option<GranularityHint>,
) -> CoreResult<AggregatedSeries> {
    if range.start > range.end {
        return Err(AggregateError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }

    let granularity = select_granularity(range, hint);
    let axis = bucket_axis(granularity, range);
    let slots: HashMap<BucketKey, usize> = axis
        .iter()
        .enumerate()
        .map(|(slot, key)| (*key, slot))
        .collect();

    let mut report = AggregationReport::default();
    let mut columns: Vec<(&str, Vec<Accumulator>)> = Vec::with_capacity(series.len());

    for counter in series {
        let mut accumulators = vec![Accumulator::new(counter.aggregate_type()); axis.len()];

        for sample in &counter.samples {
            let Some(instant) = parse_timestamp(&sample.timestamp) else {
                debug!(counter = %counter.name, timestamp = %sample.timestamp, "unparseable sample timestamp");
                report.unparseable_timestamps += 1;
                continue;
            };

            if !sample.value.is_finite() {
                report.invalid_values += 1;
                continue;
            }

            if !range.contains(instant) {
                report.out_of_range += 1;
                continue;
            }

            match slots.get(&bucket_key(granularity, instant)) {
                Some(&slot) => {
                    accumulators[slot].add(sample.value);
                    report.accepted += 1;
                }
                None => report.out_of_range += 1,
            }
        }

        columns.push((counter.name.as_str(), accumulators));
    }

    let buckets = axis
        .iter()
        .enumerate()
        .map(|(slot, key)| Bucket {
            time: *key,
            time_label: bucket_label(granularity, key),
            values: columns
                .iter()
                .map(|(name, accumulators)| (name.to_string(), accumulators[slot].result()))
                .collect(),
        })
        .collect::<Vec<_>>();

    if report.excluded() > 0 {
        warn!(
            unparseable = report.unparseable_timestamps,
            invalid = report.invalid_values,
            out_of_range = report.out_of_range,
            "Excluded samples during aggregation"
        );
    }

    debug!(
        ?granularity,
        buckets = buckets.len(),
        counters = series.len(),
        accepted = report.accepted,
        "Aggregated counter series"
    );

    Ok(AggregatedSeries {
        granularity,
        counters: series.iter().map(|s| s.name.clone()).collect(),
        buckets,
        report,
    })
}
