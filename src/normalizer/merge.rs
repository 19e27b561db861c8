use super::shapes::extract_edge_data;
use crate::models::{EdgeMetrics, EdgeMetricsMap, EdgeValues, NormalizeRequest};

/// Joins the three per-metric maps into one row per edge.
///
/// The requests map decides which edges exist; latency and fault-rate
/// entries without a matching request entry are dropped, and missing
/// latency or fault-rate values default to 0.
pub fn merge_edge_metrics(
    requests: &EdgeValues,
    latency: &EdgeValues,
    fault_rate: &EdgeValues,
) -> EdgeMetricsMap {
    requests
        .iter()
        .map(|(edge_id, &request_count)| {
            let row = EdgeMetrics {
                edge_id: edge_id.clone(),
                request_count,
                latency_p95: latency.get(edge_id).copied().unwrap_or(0.0),
                error_rate: fault_rate.get(edge_id).copied().unwrap_or(0.0),
            };
            (edge_id.clone(), row)
        })
        .collect()
}

/// Extracts each raw response and merges the results.
pub fn normalize(request: &NormalizeRequest) -> EdgeMetricsMap {
    let requests = extract_edge_data(request.requests.as_ref());
    let latency = extract_edge_data(request.latency.as_ref());
    let fault_rate = extract_edge_data(request.fault_rate.as_ref());
    merge_edge_metrics(&requests, &latency, &fault_rate)
}
