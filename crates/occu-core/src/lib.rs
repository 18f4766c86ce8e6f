//! Core data types, bucketing and aggregation for occupancy counters
//!
//! This crate turns raw per-counter samples into dense, gap-filled bucket
//! series and reshapes them into rows for the chart layer. Everything here
//! is pure and synchronous; fetching and scheduling live in other crates.

pub mod aggregate;
pub mod buckets;
pub mod export;
pub mod pipeline;
pub mod reshape;
pub mod rollups;
pub mod types;

pub use aggregate::*;
pub use buckets::*;
pub use export::*;
pub use pipeline::*;
pub use reshape::*;
pub use rollups::*;
pub use types::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

pub type CoreResult<T> = Result<T, AggregateError>;
