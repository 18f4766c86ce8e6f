use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use occu_cli::{Poller, Snapshot};
use occu_config::DashboardConfig;
use occu_core::{CounterSource, RawCounterSeries, SiteQuery};
use tower::ServiceExt;

/// Source that returns one counter per call, failing on every call listed in `fail_on`
struct ScriptedSource {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
}

#[async_trait::async_trait]
impl CounterSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, query: &SiteQuery) -> Result<Vec<RawCounterSeries>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&call) {
            return Err(anyhow!("backend unavailable"));
        }
        assert_eq!(query.site_id, "hq");
        assert!(query.range.start < query.range.end);
        Ok(vec![RawCounterSeries::new(format!("call-{}", call), true)
            .with_sample("2024-01-01T00:00:00Z", 1.0)])
    }
}

#[tokio::test]
async fn refresh_stores_snapshot_and_marks_ready() {
    let (app, state) = occu_cli::build_app(DashboardConfig::default());
    let source = ScriptedSource {
        calls: AtomicUsize::new(0),
        fail_on: vec![],
    };
    let poller = Poller::new(
        Box::new(source),
        state.clone(),
        "hq".to_string(),
        Duration::from_secs(300),
        1,
    );

    let generation = poller.refresh_once().await.unwrap();
    assert_eq!(generation, 1);

    let res = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/series")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let snapshot: Snapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.site_id.as_deref(), Some("hq"));
    assert_eq!(snapshot.series[0].name, "call-0");
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let (_app, state) = occu_cli::build_app(DashboardConfig::default());
    let source = ScriptedSource {
        calls: AtomicUsize::new(0),
        fail_on: vec![1],
    };
    let poller = Poller::new(
        Box::new(source),
        state.clone(),
        "hq".to_string(),
        Duration::from_secs(300),
        1,
    );

    poller.refresh_once().await.unwrap();
    assert!(poller.refresh_once().await.is_err());

    let generation = occu_cli::begin_refresh(&state);
    assert_eq!(generation, 3);
    assert!(occu_cli::store_snapshot(&state, generation, None, vec![]).await);
}

#[tokio::test]
async fn oversized_window_is_an_error_not_a_panic() {
    let (app, state) = occu_cli::build_app(DashboardConfig::default());
    let source = ScriptedSource {
        calls: AtomicUsize::new(0),
        fail_on: vec![],
    };
    let poller = Poller::new(
        Box::new(source),
        state,
        "hq".to_string(),
        Duration::from_secs(300),
        1_000_000_000,
    );

    let outcome = tokio::spawn(async move { poller.refresh_once().await }).await;
    let err = outcome.expect("refresh task must not panic").unwrap_err();
    assert!(err.to_string().contains("out of range"));

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/series")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn stale_result_is_discarded() {
    let (_app, state) = occu_cli::build_app(DashboardConfig::default());

    let older = occu_cli::begin_refresh(&state);
    let newer = occu_cli::begin_refresh(&state);
    assert!(newer > older);

    let fresh = vec![RawCounterSeries::new("fresh", true)];
    let stale = vec![RawCounterSeries::new("stale", true)];

    assert!(occu_cli::store_snapshot(&state, newer, None, fresh).await);
    assert!(!occu_cli::store_snapshot(&state, older, None, stale).await);
}

#[tokio::test]
async fn spawned_poller_refreshes_immediately() {
    let (_app, state) = occu_cli::build_app(DashboardConfig::default());
    let source = Arc::new(AtomicUsize::new(0));

    struct CountingSource(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl CounterSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(&self, _query: &SiteQuery) -> Result<Vec<RawCounterSeries>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    let handle = Poller::new(
        Box::new(CountingSource(source.clone())),
        state,
        "hq".to_string(),
        Duration::from_secs(3600),
        1,
    )
    .spawn();

    // First tick of a tokio interval fires immediately
    for _ in 0..20 {
        if source.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    handle.abort();
    assert_eq!(source.load(Ordering::SeqCst), 1);
}
