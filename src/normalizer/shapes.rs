//! Response shape detection and per-shape extraction.
//!
//! Shapes are tried in [`ResponseShape::PRIORITY`] order and the first
//! structural match wins; a response is never read as a blend of formats.

use serde_json::Value;

use super::edge_key;
use super::labels::LabelSet;
use crate::models::EdgeValues;

const SERIES_FIELD: &str = "Series";
const VALUE_FIELD: &str = "Value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"type": "data_frame", "fields": [{"name": "Series", "values": [..]}, ..]}`
    DataFrame,
    /// `{"meta": {"instantData": {"rows": [{"service": .., "Value": ..}]}}}`
    InstantRows,
    /// Prometheus API result: `{"data": {"result": [{"metric": {..}, "value"|"values": ..}]}}`
    TimeSeries,
}

/// Counters gathered while extracting one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub rows: usize,
    pub skipped: usize,
}

impl ResponseShape {
    pub const PRIORITY: [ResponseShape; 3] = [
        ResponseShape::DataFrame,
        ResponseShape::InstantRows,
        ResponseShape::TimeSeries,
    ];

    /// First shape in priority order that structurally matches `raw`.
    pub fn detect(raw: &Value) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|shape| shape.matches(raw))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseShape::DataFrame => "data_frame",
            ResponseShape::InstantRows => "instant_rows",
            ResponseShape::TimeSeries => "time_series",
        }
    }

    pub fn matches(&self, raw: &Value) -> bool {
        match self {
            ResponseShape::DataFrame => {
                raw.get("type").and_then(Value::as_str) == Some("data_frame")
                    && raw.get("fields").map_or(false, Value::is_array)
            }
            ResponseShape::InstantRows => instant_rows(raw).is_some(),
            ResponseShape::TimeSeries => series_results(raw).is_some(),
        }
    }

    pub fn extract(&self, raw: &Value) -> (EdgeValues, ExtractStats) {
        match self {
            ResponseShape::DataFrame => extract_data_frame(raw),
            ResponseShape::InstantRows => extract_instant_rows(raw),
            ResponseShape::TimeSeries => extract_time_series(raw),
        }
    }
}

/// Result of reading one response: the shape it was read as (none when
/// nothing matched), the edges and the row counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub shape: Option<ResponseShape>,
    pub edges: EdgeValues,
    pub stats: ExtractStats,
}

/// Reduces one raw response to `edge key -> value`.
///
/// Null, unrecognized or damaged payloads yield an empty map. A `{"body": ..}`
/// envelope is looked through when the outer object matches no shape itself.
pub fn extract_edge_data(raw: Option<&Value>) -> EdgeValues {
    extract_detailed(raw).edges
}

/// Same as [`extract_edge_data`], keeping the detected shape and counters
/// for callers that report on them.
pub fn extract_detailed(raw: Option<&Value>) -> Extraction {
    let Some(mut payload) = raw else {
        return Extraction::default();
    };

    loop {
        if let Some(shape) = ResponseShape::detect(payload) {
            let (edges, stats) = shape.extract(payload);
            return Extraction {
                shape: Some(shape),
                edges,
                stats,
            };
        }
        match payload.get("body") {
            Some(inner) if inner.is_object() => payload = inner,
            _ => return Extraction::default(),
        }
    }
}

fn extract_data_frame(raw: &Value) -> (EdgeValues, ExtractStats) {
    let mut edges = EdgeValues::new();
    let mut stats = ExtractStats::default();

    let (Some(series), Some(values)) = (frame_field(raw, SERIES_FIELD), frame_field(raw, VALUE_FIELD))
    else {
        return (edges, stats);
    };

    for (label_str, value) in series.iter().zip(values) {
        stats.rows += 1;
        let labels = LabelSet::parse(label_str.as_str().unwrap_or_default());
        match edge_from(
            labels.get("service"),
            labels.get("environment"),
            labels.get("remoteService"),
        ) {
            Some(key) => merge_max(&mut edges, key, numeric(value)),
            None => stats.skipped += 1,
        }
    }
    (edges, stats)
}

fn extract_instant_rows(raw: &Value) -> (EdgeValues, ExtractStats) {
    let mut edges = EdgeValues::new();
    let mut stats = ExtractStats::default();

    for row in instant_rows(raw).into_iter().flatten() {
        stats.rows += 1;
        match edge_from(
            str_field(row, "service"),
            str_field(row, "environment"),
            str_field(row, "remoteService"),
        ) {
            Some(key) => {
                let value = row
                    .get(VALUE_FIELD)
                    .or_else(|| row.get("value"))
                    .map_or(0.0, numeric);
                // last row wins for this shape
                edges.insert(key, value);
            }
            None => stats.skipped += 1,
        }
    }
    (edges, stats)
}

fn extract_time_series(raw: &Value) -> (EdgeValues, ExtractStats) {
    let mut edges = EdgeValues::new();
    let mut stats = ExtractStats::default();

    for result in series_results(raw).into_iter().flatten() {
        stats.rows += 1;
        let metric = result.get("metric");
        let label = |name: &str| metric.and_then(|m| str_field(m, name));
        let key = edge_from(label("service"), label("environment"), label("remoteService"));
        let sample = latest_sample(result);

        match (key, sample) {
            (Some(key), Some(sample)) => merge_max(&mut edges, key, numeric(sample)),
            _ => stats.skipped += 1,
        }
    }
    (edges, stats)
}

/// Value half of the representative `[timestamp, value]` pair: the last
/// entry of `values` for range queries, else the single `value`.
fn latest_sample(result: &Value) -> Option<&Value> {
    let pair = result
        .get("values")
        .and_then(Value::as_array)
        .and_then(|values| values.last())
        .or_else(|| result.get("value"))?;
    pair.as_array()?.get(1)
}

fn frame_field<'a>(raw: &'a Value, name: &str) -> Option<&'a Vec<Value>> {
    raw.get("fields")?
        .as_array()?
        .iter()
        .find(|field| field.get("name").and_then(Value::as_str) == Some(name))?
        .get("values")?
        .as_array()
}

fn instant_rows(raw: &Value) -> Option<&Vec<Value>> {
    raw.pointer("/meta/instantData/rows")?.as_array()
}

fn series_results(raw: &Value) -> Option<&Vec<Value>> {
    raw.pointer("/data/result")
        .or_else(|| raw.get("result"))?
        .as_array()
}

fn str_field<'a>(obj: &'a Value, name: &str) -> Option<&'a str> {
    obj.get(name).and_then(Value::as_str)
}

fn edge_from(service: Option<&str>, environment: Option<&str>, remote: Option<&str>) -> Option<String> {
    match (service, remote) {
        (Some(service), Some(remote)) if !service.is_empty() && !remote.is_empty() => {
            Some(edge_key(service, environment, remote))
        }
        _ => None,
    }
}

/// Numbers pass through; numeric strings are parsed. Anything else,
/// including NaN and infinities, becomes 0.
fn numeric(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn merge_max(edges: &mut EdgeValues, key: String, value: f64) {
    edges
        .entry(key)
        .and_modify(|current| {
            if value > *current {
                *current = value;
            }
        })
        .or_insert(value);
}
