use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Label filters in the order the caller supplied them.
///
/// Serialized as a plain JSON object; entries keep document order so the
/// generated PromQL selector is deterministic for a given request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilters(Vec<(String, String)>);

impl LabelFilters {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a filter, replacing the value in place if the label is
    /// already present.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == label) {
            Some(entry) => entry.1 = value,
            None => self.0.push((label, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelFilters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = LabelFilters::new();
        for (k, v) in iter {
            filters.insert(k, v);
        }
        filters
    }
}

impl Serialize for LabelFilters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelFilters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FiltersVisitor;

        impl<'de> Visitor<'de> for FiltersVisitor {
            type Value = LabelFilters;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of label names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut filters = LabelFilters::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    filters.insert(k, v);
                }
                Ok(filters)
            }
        }

        deserializer.deserialize_map(FiltersVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQueryRequest {
    pub metric_name: String,
    #[serde(default)]
    pub filters: LabelFilters,
    pub interval: String,
    #[serde(default)]
    pub stat: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltQuery {
    pub query: String,
}

/// Per-edge metrics row handed to the graph renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetrics {
    pub edge_id: String,
    pub request_count: f64,
    /// Result of whichever latency statistic was queried, not only p95.
    pub latency_p95: f64,
    pub error_rate: f64,
}

/// Edge key to value, as produced by extraction.
pub type EdgeValues = BTreeMap<String, f64>;

/// Edge id to merged metrics.
pub type EdgeMetricsMap = BTreeMap<String, EdgeMetrics>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    #[serde(default)]
    pub requests: EdgeValues,
    #[serde(default)]
    pub latency: EdgeValues,
    #[serde(default)]
    pub fault_rate: EdgeValues,
}

/// Three raw query-engine responses, any of which may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeRequest {
    #[serde(default)]
    pub requests: Option<Value>,
    #[serde(default)]
    pub latency: Option<Value>,
    #[serde(default)]
    pub fault_rate: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetricsRequest {
    #[serde(default)]
    pub filters: LabelFilters,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub latency_stat: Option<String>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

// ===== Query execution wire format =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryBody {
    pub query: QuerySpec,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    pub language: String,
    pub dataset: Dataset,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(rename = "type")]
    pub dataset_type: String,
    #[serde(default)]
    pub meta: Value,
}
