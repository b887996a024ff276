//! Inbound request counting: sync core and axum middleware.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower::ServiceExt;

use calltally_core::failure::HttpStatusError;
use calltally_core::meter::MetricId;
use calltally_instrument::exchange::RequestHead;
use calltally_instrument::filter::count_requests;
use calltally_instrument::config::CallTallyConfig;
use calltally_instrument::{Registry, RequestCountFilter};

const SOME_URI: &str = "/abc";
const INVOLVED_URI: &str =
    "https://server.example.com:666/path/morepath/7897/path/578?field=74289&field2=secret";
const INVOLVED_TEMPLATE: &str = "server:666/path/morepath/{}/path/{}?field={}&field2={}";

fn call_id(method: &str, uri: &str, type_value: &str, status: &str, exception: &str) -> MetricId {
    MetricId::with_tags(
        "call",
        &[
            ("method", method),
            ("uri", uri),
            ("type", type_value),
            ("status", status),
            ("exception", exception),
        ],
    )
}

fn setup(enabled: bool) -> (Arc<Registry>, RequestCountFilter) {
    let registry = Arc::new(Registry::new());
    let filter = RequestCountFilter::new(registry.clone(), enabled);
    (registry, filter)
}

#[test]
fn calls_next_exactly_once() {
    let (_, filter) = setup(true);
    let mut calls = 0;
    let out = filter.filter_exchange(&RequestHead::new("GET", SOME_URI), |_| {
        calls += 1;
        Ok::<_, HttpStatusError>(StatusCode::OK)
    });
    assert_eq!(out.unwrap(), StatusCode::OK);
    assert_eq!(calls, 1);
}

#[test]
fn disabled_filter_does_not_count() {
    let (registry, filter) = setup(false);
    let mut calls = 0;
    let _ = filter.filter_exchange(&RequestHead::new("GET", SOME_URI), |_| {
        calls += 1;
        Ok::<_, HttpStatusError>(200u16)
    });
    assert_eq!(calls, 1);
    assert_eq!(registry.counter(&call_id("GET", SOME_URI, "successful", "200", "none")), None);
    assert!(registry.counters_named("call").is_empty());
}

#[test]
fn counts_successful_calls() {
    let (registry, filter) = setup(true);
    let _ = filter.filter_exchange(&RequestHead::new("GET", SOME_URI), |_| Ok::<_, HttpStatusError>(200u16));
    assert_eq!(registry.counter(&call_id("GET", SOME_URI, "successful", "200", "none")), Some(1));
}

#[test]
fn templates_involved_uris() {
    let (registry, filter) = setup(true);
    let _ = filter.filter_exchange(&RequestHead::new("GET", INVOLVED_URI), |_| Ok::<_, HttpStatusError>(200u16));
    assert_eq!(
        registry.counter(&call_id("GET", INVOLVED_TEMPLATE, "successful", "200", "none")),
        Some(1)
    );
}

#[test]
fn client_and_server_errors_are_failures() {
    let (registry, filter) = setup(true);
    let _ = filter.filter_exchange(&RequestHead::new("GET", SOME_URI), |_| Ok::<_, HttpStatusError>(400u16));
    let _ = filter.filter_exchange(&RequestHead::new("POST", SOME_URI), |_| Ok::<_, HttpStatusError>(500u16));

    assert_eq!(registry.counter(&call_id("GET", SOME_URI, "failed", "400", "unknown")), Some(1));
    assert_eq!(registry.counter(&call_id("POST", SOME_URI, "failed", "500", "unknown")), Some(1));
}

#[test]
fn failure_is_propagated_and_counted() {
    let (registry, filter) = setup(true);
    let err = filter
        .filter_exchange(&RequestHead::new("GET", SOME_URI), |_| {
            Err::<StatusCode, _>(HttpStatusError::new(500, "handler failed"))
        })
        .unwrap_err();
    assert_eq!(err.status, 500);
    assert_eq!(
        registry.counter(&call_id("GET", SOME_URI, "failed", "500", "HttpServerError")),
        Some(1)
    );
}

#[test]
fn failure_without_status_uses_sentinel() {
    let (registry, filter) = setup(true);
    let _ = filter.filter_exchange(&RequestHead::new("GET", SOME_URI), |_| {
        Err::<StatusCode, _>(std::io::Error::other("broken pipe"))
    });
    assert_eq!(registry.counter(&call_id("GET", SOME_URI, "failed", "-1", "IoError")), Some(1));
}

#[test]
fn panic_is_counted_once() {
    let (registry, filter) = setup(true);
    let caught = catch_unwind(AssertUnwindSafe(|| {
        let _ = filter.filter_exchange(&RequestHead::new("GET", SOME_URI), |_| -> Result<u16, HttpStatusError> {
            panic!("handler panicked")
        });
    }));
    assert!(caught.is_err());
    assert_eq!(registry.counter(&call_id("GET", SOME_URI, "failed", "-1", "panic")), Some(1));
    assert_eq!(registry.counters_named("call").len(), 1);
}

fn router(filter: Arc<RequestCountFilter>) -> Router {
    Router::new()
        .route(
            "/abc",
            get(|| async { "hello" }).post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .route("/sed/:id", get(|| async { StatusCode::NOT_FOUND }))
        .route("/stuck", get(|| pending::<StatusCode>()))
        .layer(from_fn_with_state(filter, count_requests))
}

#[tokio::test]
async fn middleware_counts_routed_requests() {
    let (registry, filter) = setup(true);
    let app = router(Arc::new(filter));

    let res = app
        .clone()
        .oneshot(Request::builder().uri("/abc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/abc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let res = app
        .oneshot(Request::builder().uri("/sed/687?x=12").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    assert_eq!(registry.counter(&call_id("GET", "/abc", "successful", "200", "none")), Some(1));
    assert_eq!(registry.counter(&call_id("POST", "/abc", "failed", "500", "unknown")), Some(1));
    assert_eq!(registry.counter(&call_id("GET", "/sed/{}", "failed", "404", "unknown")), Some(1));
}

#[tokio::test]
async fn disabled_middleware_passes_through() {
    let (registry, filter) = setup(false);
    let app = router(Arc::new(filter));

    let res = app.oneshot(Request::builder().uri("/abc").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(registry.counters_named("call").is_empty());
}

#[tokio::test]
async fn middleware_tags_path_without_query() {
    let (registry, filter) = setup(true);
    let app = router(Arc::new(filter));

    for uri in ["/sed/687?x=12", "/sed/688?y=secret&z=1", "/sed/689"] {
        let _ = app.clone().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    }
    assert_eq!(registry.counter(&call_id("GET", "/sed/{}", "failed", "404", "unknown")), Some(3));
    assert_eq!(registry.counters_named("call").len(), 1);
}

#[tokio::test]
async fn dropped_request_is_counted_as_cancelled() {
    let (registry, filter) = setup(true);
    let app = router(Arc::new(filter));

    let call = app.oneshot(Request::builder().uri("/stuck").body(Body::empty()).unwrap());
    assert!(tokio::time::timeout(Duration::from_millis(10), call).await.is_err());

    assert_eq!(registry.counter(&call_id("GET", "/stuck", "failed", "-1", "cancelled")), Some(1));
}

#[tokio::test]
async fn config_enables_middleware() {
    let registry = Arc::new(Registry::new());
    let mut cfg = CallTallyConfig::default();
    cfg.filter.enabled = true;
    let app = router(Arc::new(RequestCountFilter::from_config(registry.clone(), &cfg)));

    let _ = app.oneshot(Request::builder().uri("/abc").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(registry.counter(&call_id("GET", "/abc", "successful", "200", "none")), Some(1));
}
