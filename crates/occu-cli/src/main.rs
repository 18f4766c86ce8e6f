//! Occupancy chart service
//!
//! This binary coordinates:
//! - Periodic counter refresh from the backend (or a local snapshot file)
//! - Aggregation and chart reshaping on request
//! - Health, readiness and Prometheus metrics

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use occu_core::CounterSource;
use occu_ingest::{FileCounterSource, HttpCounterSource};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Observability
    occu_obs::init("occud");

    // Config
    let cfg = match occu_config::AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "config not loaded, using defaults");
            occu_config::AppConfig::default()
        }
    };
    let dashboard = cfg.dashboard();

    // Build app and state
    let (app, state) = occu_cli::build_app(dashboard.clone());

    // Start the refresher when there is something to poll
    let source: Option<Box<dyn CounterSource>> = match (cfg.source_file(), cfg.api.as_ref()) {
        (Some(path), _) => Some(Box::new(FileCounterSource::new(path))),
        (None, Some(api)) => Some(Box::new(
            HttpCounterSource::new(
                &api.base_url,
                api.token.clone(),
                Duration::from_secs(cfg.api_timeout_secs()),
            )
            .context("Invalid backend configuration")?,
        )),
        (None, None) => None,
    };

    match source {
        Some(source) => {
            let site_id = dashboard.site_id.clone().unwrap_or_else(|| "default".to_string());
            occu_cli::Poller::new(
                source,
                state.clone(),
                site_id,
                Duration::from_secs(cfg.poll_interval_secs()),
                cfg.poll_window_days(),
            )
            .spawn();
        }
        None => {
            tracing::info!("no counter source configured; accepting pushed snapshots only");
            occu_cli::set_ready(&state, true);
        }
    }

    // Start HTTP server
    let http_bind = cfg.http_bind();
    let addr: SocketAddr = http_bind
        .parse()
        .with_context(|| format!("Invalid HTTP bind address: {}", http_bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;

    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
