use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use occu_config::DashboardConfig;
use occu_core::{
    aggregate, parse_timestamp, reshape_for_chart, to_csv, AggregatedSeries, AggregationReport,
    ChartRow, DateRange, Granularity, GranularityHint, RawCounterSeries,
};
use occu_ingest::parse_payload;
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub mod poller;

pub use poller::Poller;

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    refresh_total: Counter<u64>,
    excluded_samples_total: Counter<u64>,
    dashboard: DashboardConfig,
    next_generation: AtomicU64,
    snapshot: RwLock<Option<Snapshot>>,
}

/// Latest counter series fetched for the dashboard site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Increases with every refresh started; older results never replace newer ones
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    pub site_id: Option<String>,
    pub series: Vec<RawCounterSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub granularity: Granularity,
    pub stacked: bool,
    pub report: AggregationReport,
    pub rows: Vec<ChartRow>,
}

pub fn build_app(dashboard: DashboardConfig) -> (Router, Arc<AppState>) {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .expect("prom exporter");
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("occu-cli");

    let requests_total = meter
        .u64_counter("occu_requests_total")
        .with_description("Total HTTP requests served")
        .init();
    let refresh_total = meter
        .u64_counter("occu_refresh_total")
        .with_description("Counter snapshots stored")
        .init();
    let excluded_samples_total = meter
        .u64_counter("occu_excluded_samples_total")
        .with_description("Samples excluded during aggregation")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        refresh_total,
        excluded_samples_total,
        dashboard,
        next_generation: AtomicU64::new(0),
        snapshot: RwLock::new(None),
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/series", get(series).post(push_series))
        .route("/api/v1/aggregate", get(aggregated))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/export.csv", get(export_csv))
        .with_state(Arc::clone(&state));

    (router, state)
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

/// Reserve the generation for a refresh that is about to start
pub fn begin_refresh(state: &Arc<AppState>) -> u64 {
    state.next_generation.fetch_add(1, Ordering::Relaxed) + 1
}

/// Store a fetch result unless a newer refresh already landed. Returns whether it was stored.
pub async fn store_snapshot(
    state: &Arc<AppState>,
    generation: u64,
    site_id: Option<String>,
    series: Vec<RawCounterSeries>,
) -> bool {
    let mut slot = state.snapshot.write().await;
    if let Some(current) = slot.as_ref() {
        if current.generation > generation {
            tracing::debug!(
                generation,
                current = current.generation,
                "discarding stale snapshot"
            );
            return false;
        }
    }

    *slot = Some(Snapshot {
        generation,
        fetched_at: Utc::now(),
        site_id,
        series,
    });
    state.refresh_total.add(1, &[]);
    true
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.requests_total.add(1, &[]);
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> ([(header::HeaderName, HeaderValue); 1], String) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

async fn series(State(state): State<Arc<AppState>>) -> Response {
    state.requests_total.add(1, &[]);
    let snapshot = state.snapshot.read().await;
    match snapshot.as_ref() {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Accept a backend occupancy payload pushed by an external fetcher
async fn push_series(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    state.requests_total.add(1, &[]);
    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(e) => return bad_request(e.to_string()),
    };
    let (series, report) = payload.into_series();

    let generation = begin_refresh(&state);
    let site_id = state.dashboard.site_id.clone();
    store_snapshot(&state, generation, site_id, series).await;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "generation": generation,
            "counters": report.counters,
            "droppedValues": report.dropped_values,
            "reservedNames": report.reserved_names,
        })),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub period: Option<String>,
    pub stacked: Option<bool>,
    /// Comma separated counter names
    pub counters: Option<String>,
}

async fn aggregated(State(state): State<Arc<AppState>>, Query(q): Query<ChartQuery>) -> Response {
    state.requests_total.add(1, &[]);
    match aggregate_snapshot(&state, &q).await {
        Ok(aggregated) => (StatusCode::OK, Json(aggregated)).into_response(),
        Err(resp) => resp,
    }
}

async fn chart(State(state): State<Arc<AppState>>, Query(q): Query<ChartQuery>) -> Response {
    state.requests_total.add(1, &[]);
    let aggregated = match aggregate_snapshot(&state, &q).await {
        Ok(aggregated) => aggregated,
        Err(resp) => return resp,
    };

    let dashboard = &state.dashboard;
    let stacked = q.stacked.unwrap_or(dashboard.stacked);
    let selected: Vec<String> = match q.counters.as_deref() {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect(),
        None if !dashboard.counters.is_empty() => dashboard.counters.clone(),
        None => aggregated.counters.clone(),
    };

    let rows = reshape_for_chart(&aggregated, &selected, &dashboard.display_types, stacked);
    let response = ChartResponse {
        granularity: aggregated.granularity,
        stacked,
        report: aggregated.report,
        rows,
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn export_csv(State(state): State<Arc<AppState>>, Query(q): Query<ChartQuery>) -> Response {
    state.requests_total.add(1, &[]);
    let aggregated = match aggregate_snapshot(&state, &q).await {
        Ok(aggregated) => aggregated,
        Err(resp) => return resp,
    };

    match to_csv(&aggregated) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
                (
                    header::CONTENT_DISPOSITION,
                    HeaderValue::from_static("attachment; filename=\"occupancy.csv\""),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error=?e, "csv export failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn aggregate_snapshot(state: &AppState, q: &ChartQuery) -> Result<AggregatedSeries, Response> {
    let range = resolve_range(q).map_err(bad_request)?;
    let hint = match q.period.as_deref() {
        Some(raw) => GranularityHint::parse(raw),
        None => state.dashboard.period,
    };

    let snapshot = state.snapshot.read().await;
    let series = snapshot.as_ref().map(|s| s.series.as_slice()).unwrap_or(&[]);
    let aggregated = aggregate(series, &range, hint).map_err(|e| bad_request(e.to_string()))?;

    let excluded = aggregated.report.excluded() as u64;
    if excluded > 0 {
        state.excluded_samples_total.add(excluded, &[]);
    }
    Ok(aggregated)
}

/// Missing `end` means now, missing `start` means the start of `end`'s day.
/// Plain dates cover the whole day.
fn resolve_range(q: &ChartQuery) -> Result<DateRange, String> {
    let end = match q.end.as_deref() {
        Some(raw) => parse_bound(raw, true).ok_or_else(|| format!("invalid end: {}", raw))?,
        None => Utc::now(),
    };
    let start = match q.start.as_deref() {
        Some(raw) => parse_bound(raw, false).ok_or_else(|| format!("invalid start: {}", raw))?,
        None => Utc.from_utc_datetime(&end.date_naive().and_time(NaiveTime::MIN)),
    };
    Ok(DateRange::new(start, end))
}

fn parse_bound(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Some(instant) = parse_timestamp(raw) {
        return Some(instant);
    }
    let day = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        NaiveTime::MIN
    };
    Some(Utc.from_utc_datetime(&day.and_time(time)))
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}
