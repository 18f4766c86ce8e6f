//! Per-bucket accumulation of counter samples

use crate::types::AggregateType;

/// Accumulator for the samples falling into one bucket of one counter
#[derive(Debug, Clone, Copy)]
pub struct Accumulator {
    sum: f64,
    count: usize,
    aggregate_type: AggregateType,
}

impl Accumulator {
    pub fn new(aggregate_type: AggregateType) -> Self {
        Self {
            sum: 0.0,
            count: 0,
            aggregate_type,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// `None` when no sample was added; an empty bucket is never reported as zero
    pub fn result(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        Some(match self.aggregate_type {
            AggregateType::Sum => self.sum,
            AggregateType::Avg => round2(self.sum / self.count as f64),
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
