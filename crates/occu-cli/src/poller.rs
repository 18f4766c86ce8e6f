//! Periodic counter refresh

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use occu_core::{CounterSource, DateRange, SiteQuery};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::{begin_refresh, set_ready, store_snapshot, AppState};

/// Poller re-fetches the dashboard site's counters on a fixed interval
pub struct Poller {
    source: Box<dyn CounterSource>,
    state: Arc<AppState>,
    site_id: String,
    interval: Duration,
    window_days: i64,
}

impl Poller {
    pub fn new(
        source: Box<dyn CounterSource>,
        state: Arc<AppState>,
        site_id: String,
        interval: Duration,
        window_days: i64,
    ) -> Self {
        Self {
            source,
            state,
            site_id,
            interval,
            window_days,
        }
    }

    /// Run the refresh loop forever; fetch errors are logged and the next tick retries
    pub async fn run(self) {
        info!(
            source = self.source.name(),
            site = %self.site_id,
            interval_secs = self.interval.as_secs(),
            "Poller started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh_once().await {
                error!("Refresh failed: {:#}", e);
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Fetch once and store the result; returns the generation of this refresh
    pub async fn refresh_once(&self) -> Result<u64> {
        let generation = begin_refresh(&self.state);
        let end = Utc::now();
        let start = chrono::Duration::try_days(self.window_days)
            .and_then(|window| end.checked_sub_signed(window))
            .ok_or_else(|| anyhow!("Refresh window of {} days is out of range", self.window_days))?;
        let query = SiteQuery {
            site_id: self.site_id.clone(),
            range: DateRange::new(start, end),
        };

        let series = self
            .source
            .fetch(&query)
            .await
            .with_context(|| format!("Failed to fetch counters from {}", self.source.name()))?;

        let counters = series.len();
        if store_snapshot(&self.state, generation, Some(self.site_id.clone()), series).await {
            info!(generation, counters, "Snapshot refreshed");
            set_ready(&self.state, true);
        } else {
            warn!(generation, "Refresh finished after a newer one; result dropped");
        }

        Ok(generation)
    }
}
