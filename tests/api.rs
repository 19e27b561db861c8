use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use service_map_metrics::{
    api::{router, AppState},
    config::Config,
    fetcher::{EdgeMetricsFetcher, QueryExecutor},
    models::TimeRange,
    Result, ServiceMapError,
};

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn app() -> Router {
    router(AppState::default())
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = call(app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn build_query_endpoint() {
    let (status, body) = call(
        app(),
        "POST",
        "/query/build",
        Some(json!({
            "metricName": "fault",
            "filters": {"service": "api-gateway"},
            "interval": "5m",
            "stat": "sum"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"query": "sum(rate(fault{service=\"api-gateway\"}[5m]))"}));
}

#[tokio::test]
async fn build_query_keeps_filter_order() {
    let (_, body) = call(
        app(),
        "POST",
        "/query/build",
        Some(json!({
            "metricName": "custom_metric",
            "filters": {"zone": "eu", "app": "shop"},
            "interval": "5m"
        })),
    )
    .await;
    assert_eq!(body["query"], "custom_metric{zone=\"eu\",app=\"shop\"}");
}

#[tokio::test]
async fn extract_endpoint_handles_any_shape() {
    let (status, body) = call(
        app(),
        "POST",
        "/edges/extract",
        Some(json!({
            "type": "data_frame",
            "fields": [
                {"name": "Series", "values": ["{service=\"frontend\",environment=\"generic:default\",remoteService=\"api\"}"]},
                {"name": "Value", "values": [100]}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"frontend::generic:default->api": 100.0}));

    let (status, body) = call(app(), "POST", "/edges/extract", Some(Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn merge_endpoint() {
    let (status, body) = call(
        app(),
        "POST",
        "/edges/merge",
        Some(json!({
            "requests": {"A": 100},
            "latency": {"A": 50, "B": 9},
            "faultRate": {}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"A": {"edgeId": "A", "requestCount": 100.0, "latencyP95": 50.0, "errorRate": 0.0}})
    );
}

#[tokio::test]
async fn normalize_endpoint() {
    let (status, body) = call(
        app(),
        "POST",
        "/edges/normalize",
        Some(json!({
            "requests": {"data": {"result": [
                {"metric": {"service": "a", "remoteService": "b"}, "values": [[1000, "50"], [1060, "100"]]}
            ]}},
            "faultRate": {"meta": {"instantData": {"rows": [
                {"service": "a", "remoteService": "b", "Value": 0.02}
            ]}}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["a::generic:default->b"],
        json!({"edgeId": "a::generic:default->b", "requestCount": 100.0, "latencyP95": 0.0, "errorRate": 0.02})
    );
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (status, body) = call(
        app(),
        "POST",
        "/query/build",
        Some(json!({"filters": {"service": 3}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
}

#[tokio::test]
async fn unparseable_body_gets_json_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/edges/extract")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn service_map_without_endpoint_is_unavailable() {
    let (status, body) = call(app(), "POST", "/service-map/edges", Some(json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("no query endpoint"));
}

struct FixedExecutor {
    fail: bool,
}

#[async_trait]
impl QueryExecutor for FixedExecutor {
    async fn execute(&self, query: &str, _time_range: &TimeRange) -> Result<Value> {
        if self.fail {
            return Err(ServiceMapError::Upstream("connection refused".to_string()));
        }
        let value = if query.contains("request") { "40" } else { "0.5" };
        Ok(json!({"body": {"data": {"result": [
            {"metric": {"service": "web", "environment": "prod", "remoteService": "db"}, "value": [1, value]}
        ]}}}))
    }
}

fn app_with(executor: FixedExecutor) -> Router {
    let fetcher = EdgeMetricsFetcher::new(Arc::new(executor), &Config::default());
    router(AppState {
        fetcher: Some(Arc::new(fetcher)),
    })
}

#[tokio::test]
async fn service_map_fetches_and_merges() {
    let (status, body) = call(
        app_with(FixedExecutor { fail: false }),
        "POST",
        "/service-map/edges",
        Some(json!({"filters": {"namespace": "shop"}, "latencyStat": "p90"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"web::prod->db": {"edgeId": "web::prod->db", "requestCount": 40.0, "latencyP95": 0.5, "errorRate": 0.5}})
    );
}

#[tokio::test]
async fn service_map_upstream_failure_is_bad_gateway() {
    let (status, body) = call(
        app_with(FixedExecutor { fail: true }),
        "POST",
        "/service-map/edges",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn metrics_endpoint_exposes_text() {
    // touch the builder so at least one series exists
    call(
        app(),
        "POST",
        "/query/build",
        Some(json!({"metricName": "error", "interval": "1m"})),
    )
    .await;

    let response = app()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("service_map_queries_built_total"));
}
