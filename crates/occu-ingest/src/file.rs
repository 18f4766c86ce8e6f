//! Occupancy payload read from a local JSON file (offline and demo use)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use occu_core::{CounterSource, RawCounterSeries, SiteQuery};
use tracing::debug;

use crate::{parse_payload, IngestResult, OccupancyPayload};

pub struct FileCounterSource {
    path: PathBuf,
}

impl FileCounterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> IngestResult<OccupancyPayload> {
        let bytes = tokio::fs::read(&self.path).await?;
        parse_payload(&bytes)
    }
}

#[async_trait::async_trait]
impl CounterSource for FileCounterSource {
    fn name(&self) -> &str {
        "file"
    }

    /// The file holds one snapshot for any site; range filtering happens during aggregation
    async fn fetch(&self, query: &SiteQuery) -> Result<Vec<RawCounterSeries>> {
        let payload = self
            .load()
            .await
            .with_context(|| format!("Failed to load {}", self.path.display()))?;
        let (series, report) = payload.into_series();
        debug!(site = %query.site_id, counters = report.counters, "Loaded occupancy file");
        Ok(series)
    }
}
