//! Occupancy backend over HTTP

use std::time::Duration;

use anyhow::Result;
use chrono::SecondsFormat;
use occu_core::{CounterSource, RawCounterSeries, SiteQuery};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::{parse_payload, IngestError, IngestResult, OccupancyPayload};

pub struct HttpCounterSource {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpCounterSource {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> IngestResult<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `{base}/sites/{site}/occupancy?start=..&end=..`
    pub fn occupancy_url(&self, query: &SiteQuery) -> IngestResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IngestError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["sites", query.site_id.as_str(), "occupancy"]);
        url.query_pairs_mut()
            .append_pair(
                "start",
                &query.range.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .append_pair(
                "end",
                &query.range.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        Ok(url)
    }

    #[instrument(skip(self), fields(site = %query.site_id))]
    pub async fn fetch_payload(&self, query: &SiteQuery) -> IngestResult<OccupancyPayload> {
        let url = self.occupancy_url(query)?;
        debug!(%url, "Fetching occupancy");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IngestError::Status { status, body });
        }

        let bytes = resp.bytes().await?;
        parse_payload(&bytes)
    }
}

#[async_trait::async_trait]
impl CounterSource for HttpCounterSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, query: &SiteQuery) -> Result<Vec<RawCounterSeries>> {
        let payload = self.fetch_payload(query).await?;
        let (series, report) = payload.into_series();
        debug!(counters = report.counters, samples = report.samples, "Mapped occupancy payload");
        Ok(series)
    }
}
