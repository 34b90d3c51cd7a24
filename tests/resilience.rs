//! Retries, rate limiting and request filters through a live gateway.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use route_gateway::config::FilterConfig;
use route_gateway::routing::predicate::always;
use route_gateway::{GatewayConfig, Route};

mod common;

/// Backend answering 503 for the first `failures` calls, then 200.
async fn start_flaky_backend(failures: u32) -> (SocketAddr, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = common::start_programmable_backend(move |_| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < failures {
                (503, "Service Unavailable".to_string())
            } else {
                (200, "Success".to_string())
            }
        }
    })
    .await;
    (addr, calls)
}

fn catch_all(backend: SocketAddr) -> Route {
    Route::builder("flaky")
        .uri(format!("http://{backend}"))
        .predicate(always())
        .build()
        .unwrap()
}

#[tokio::test]
async fn no_retries_by_default() {
    let (backend, calls) = start_flaky_backend(1).await;
    let gateway =
        common::start_gateway_with_routes(GatewayConfig::default(), vec![catch_all(backend)]).await;

    let res = common::client().get(gateway.url("/")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn idempotent_requests_retry_when_configured() {
    let (backend, calls) = start_flaky_backend(2).await;

    let mut config = GatewayConfig::default();
    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    let gateway = common::start_gateway_with_routes(config, vec![catch_all(backend)]).await;

    let res = common::client().get(gateway.url("/")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "Success");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn post_is_never_retried() {
    let (backend, calls) = start_flaky_backend(1).await;

    let mut config = GatewayConfig::default();
    config.retries.max_attempts = 3;
    let gateway = common::start_gateway_with_routes(config, vec![catch_all(backend)]).await;

    let res = common::client()
        .post(gateway.url("/"))
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rate_limiter_answers_429_without_upstream() {
    let (backend, calls) = start_flaky_backend(0).await;

    let mut config = GatewayConfig::default();
    config.shorthand_routes = vec![format!("limited=http://{backend},Path=/**")];
    config.default_filters.push(FilterConfig::RequestRateLimiter {
        replenish_rate: 1,
        burst_capacity: 2,
    });
    let gateway = common::start_gateway(config).await;
    let client = common::client();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(client.get(gateway.url("/x")).send().await.unwrap().status());
    }

    assert_eq!(statuses, [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn request_filters_rewrite_before_forwarding() {
    let backend = common::start_programmable_backend(|head| async move { (200, head) }).await;

    let route = Route::builder("rewrite")
        .uri(format!("http://{backend}"))
        .predicate(always())
        .filter(route_gateway::filter::prefix_path("/v1").unwrap())
        .filter(route_gateway::filter::add_request_header("X-Gateway", "route-gateway").unwrap())
        .filter(route_gateway::filter::remove_request_header("X-Secret").unwrap())
        .build()
        .unwrap();
    let gateway = common::start_gateway_with_routes(GatewayConfig::default(), vec![route]).await;

    let head = common::client()
        .get(gateway.url("/users?id=7"))
        .header("X-Secret", "hunter2")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
        .to_ascii_lowercase();

    assert!(head.starts_with("get /v1/users?id=7 http/1.1"), "{head}");
    assert!(head.contains("x-gateway: route-gateway"));
    assert!(!head.contains("x-secret"));
    assert!(head.contains("x-request-id: "));
}
