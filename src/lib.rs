pub mod api;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod query;

pub use error::{Result, ServiceMapError};
pub use models::{EdgeMetrics, EdgeMetricsMap, EdgeValues, LabelFilters};
pub use normalizer::{edge_key, extract_edge_data, merge_edge_metrics, DEFAULT_ENVIRONMENT};
pub use query::build_query;
