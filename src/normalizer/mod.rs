//! Edge metrics normalization.
//!
//! Query-engine responses arrive in one of several incompatible shapes.
//! [`extract_edge_data`] reduces any of them to `edge key -> value`, and
//! [`merge_edge_metrics`] joins the requests, latency and fault-rate maps
//! into one [`EdgeMetrics`](crate::models::EdgeMetrics) per edge.
//!
//! Nothing in this module returns an error: malformed input simply
//! contributes no edges. Nothing here touches the metrics registry or logs
//! either; callers report on an [`Extraction`] themselves.

pub mod labels;
pub mod merge;
pub mod shapes;

pub use merge::{merge_edge_metrics, normalize};
pub use shapes::{extract_detailed, extract_edge_data, Extraction, ResponseShape};

/// Environment used when a series carries no (or an empty) `environment`
/// label.
pub const DEFAULT_ENVIRONMENT: &str = "generic:default";

/// Canonical edge identity: `{service}::{environment}->{remoteService}`.
pub fn edge_key(service: &str, environment: Option<&str>, remote_service: &str) -> String {
    let environment = match environment {
        Some(env) if !env.is_empty() => env,
        _ => DEFAULT_ENVIRONMENT,
    };
    format!("{}::{}->{}", service, environment, remote_service)
}
