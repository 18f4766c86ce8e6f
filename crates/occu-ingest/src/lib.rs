//! Counter sources for the occupancy backend
//!
//! The backend reports counters as loosely typed JSON (`type: bool`,
//! string or null values). This crate maps that payload into
//! [`occu_core::RawCounterSeries`] at the boundary and provides the
//! [`occu_core::CounterSource`] implementations used by the service.

pub mod file;
pub mod http;
pub mod wire;

pub use file::*;
pub use http::*;
pub use wire::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

pub type IngestResult<T> = Result<T, IngestError>;
