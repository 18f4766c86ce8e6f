//! Counter source seam between fetching and aggregation

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{DateRange, RawCounterSeries};

/// What to fetch: one site's counters over a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteQuery {
    pub site_id: String,
    pub range: DateRange,
}

/// Upstream supplier of raw counter series
#[async_trait::async_trait]
pub trait CounterSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &SiteQuery) -> Result<Vec<RawCounterSeries>>;
}
