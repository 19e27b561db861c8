use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;
use tracing::debug;

use crate::models::{EdgeMetricsMap, EdgeValues};
use crate::normalizer::Extraction;
use crate::{Result, ServiceMapError};

lazy_static! {
    // Query builder
    pub static ref QUERIES_BUILT: IntCounterVec = register_int_counter_vec!(
        "service_map_queries_built_total",
        "PromQL queries built, by metric family",
        &["family"]
    ).unwrap();

    // Normalizer
    pub static ref EXTRACTIONS: IntCounterVec = register_int_counter_vec!(
        "service_map_extractions_total",
        "Responses extracted, by detected shape",
        &["shape"]
    ).unwrap();

    pub static ref ROWS_SKIPPED: IntCounter = register_int_counter!(
        "service_map_rows_skipped_total",
        "Rows dropped during extraction for missing edge labels or samples"
    ).unwrap();

    pub static ref EDGES_MERGED: IntCounter = register_int_counter!(
        "service_map_edges_merged_total",
        "Edges emitted by the metrics merge"
    ).unwrap();

    // Fetcher
    pub static ref FETCHES: IntCounterVec = register_int_counter_vec!(
        "service_map_fetches_total",
        "Edge metric fetches, by outcome",
        &["outcome"]
    ).unwrap();

    // HTTP
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "service_map_request_duration_seconds",
        "Request duration in seconds",
        &["endpoint"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();
}

/// Forces registration so every series shows up on the first scrape.
pub fn init_metrics() {
    lazy_static::initialize(&QUERIES_BUILT);
    lazy_static::initialize(&EXTRACTIONS);
    lazy_static::initialize(&ROWS_SKIPPED);
    lazy_static::initialize(&EDGES_MERGED);
    lazy_static::initialize(&FETCHES);
    lazy_static::initialize(&REQUEST_DURATION);
}

/// Observes the lifetime of one HTTP request.
pub struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        REQUEST_DURATION
            .with_label_values(&[self.endpoint])
            .observe(duration);
    }
}

pub fn record_query_built(family: &str) {
    QUERIES_BUILT.with_label_values(&[family]).inc();
}

/// Counts one extraction and hands its edges back.
pub fn observe_extraction(extraction: Extraction) -> EdgeValues {
    match extraction.shape {
        Some(shape) => {
            EXTRACTIONS.with_label_values(&[shape.as_str()]).inc();
            ROWS_SKIPPED.inc_by(extraction.stats.skipped as u64);
            debug!(
                "Extracted {} edges from {} response ({} rows, {} skipped)",
                extraction.edges.len(),
                shape.as_str(),
                extraction.stats.rows,
                extraction.stats.skipped
            );
        }
        None => debug!("No recognizable response shape, contributing no edges"),
    }
    extraction.edges
}

pub fn observe_merge(merged: EdgeMetricsMap) -> EdgeMetricsMap {
    EDGES_MERGED.inc_by(merged.len() as u64);
    debug!("Merged metrics for {} edges", merged.len());
    merged
}

pub fn record_fetch(outcome: &str) {
    FETCHES.with_label_values(&[outcome]).inc();
}

/// Renders the default registry in the text exposition format.
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ServiceMapError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ServiceMapError::Internal(format!("Metrics are not valid UTF-8: {}", e)))
}
