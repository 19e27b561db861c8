use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use super::{extract::ApiJson, server::AppState};
use crate::{
    fetcher::FetchOutcome,
    metrics::{self, RequestTimer},
    models::{
        BuiltQuery, EdgeMetricsMap, EdgeMetricsRequest, EdgeValues, MergeRequest,
        MetricQueryRequest, NormalizeRequest,
    },
    normalizer, query, Result, ServiceMapError,
};

fn extract_observed(raw: Option<&Value>) -> EdgeValues {
    metrics::observe_extraction(normalizer::extract_detailed(raw))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn prometheus_metrics() -> Result<impl IntoResponse> {
    let body = metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

pub async fn build_query(ApiJson(request): ApiJson<MetricQueryRequest>) -> Json<BuiltQuery> {
    let _timer = RequestTimer::new("build_query");
    let query = query::build_from_request(&request);
    metrics::record_query_built(query::MetricFamily::of(&request.metric_name).as_str());
    info!("Built {} query: {}", request.metric_name, query);
    Json(BuiltQuery { query })
}

pub async fn extract_edges(ApiJson(raw): ApiJson<Value>) -> Json<EdgeValues> {
    let _timer = RequestTimer::new("extract_edges");
    Json(extract_observed(Some(&raw)))
}

pub async fn merge_edges(ApiJson(request): ApiJson<MergeRequest>) -> Json<EdgeMetricsMap> {
    let _timer = RequestTimer::new("merge_edges");
    Json(metrics::observe_merge(normalizer::merge_edge_metrics(
        &request.requests,
        &request.latency,
        &request.fault_rate,
    )))
}

pub async fn normalize_edges(ApiJson(request): ApiJson<NormalizeRequest>) -> Json<EdgeMetricsMap> {
    let _timer = RequestTimer::new("normalize_edges");
    Json(metrics::observe_merge(normalizer::merge_edge_metrics(
        &extract_observed(request.requests.as_ref()),
        &extract_observed(request.latency.as_ref()),
        &extract_observed(request.fault_rate.as_ref()),
    )))
}

pub async fn fetch_service_map(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EdgeMetricsRequest>,
) -> Result<Json<EdgeMetricsMap>> {
    let _timer = RequestTimer::new("fetch_service_map");
    let fetcher = state.fetcher.as_ref().ok_or_else(|| {
        ServiceMapError::Config("no query endpoint configured for edge fetching".to_string())
    })?;

    match fetcher.fetch(&request).await? {
        FetchOutcome::Fresh(edges) => Ok(Json(edges)),
        FetchOutcome::Stale => Err(ServiceMapError::Stale),
    }
}
