//! Issues the three service map queries and folds the answers into edge
//! metrics.
//!
//! Each call to [`EdgeMetricsFetcher::fetch`] takes a ticket from a
//! generation counter. If another fetch (or [`EdgeMetricsFetcher::invalidate`])
//! bumps the counter while the queries are in flight, the result is reported
//! as [`FetchOutcome::Stale`] instead of being returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::Config;
use crate::metrics;
use crate::models::{
    Dataset, EdgeMetricsMap, EdgeMetricsRequest, ExecuteQueryBody, QuerySpec, TimeRange,
};
use crate::normalizer::{extract_detailed, merge_edge_metrics};
use crate::query::{build_query, MetricFamily};
use crate::{Result, ServiceMapError};

/// Runs one PromQL query over a time range and returns the raw response.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str, time_range: &TimeRange) -> Result<Value>;
}

/// Executes queries against the query-execution HTTP endpoint.
pub struct HttpQueryExecutor {
    client: reqwest::Client,
    endpoint: String,
    dataset_id: String,
    dataset_type: String,
    language: String,
}

impl HttpQueryExecutor {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .query_endpoint
            .clone()
            .ok_or_else(|| ServiceMapError::Config("QUERY_ENDPOINT is not set".to_string()))?;
        Self::with_endpoint(endpoint, config)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.query_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            dataset_id: config.dataset_id.clone(),
            dataset_type: config.dataset_type.clone(),
            language: config.query_language.clone(),
        })
    }

    fn body(&self, query: &str, time_range: &TimeRange) -> ExecuteQueryBody {
        ExecuteQueryBody {
            query: QuerySpec {
                query: query.to_string(),
                language: self.language.clone(),
                dataset: Dataset {
                    id: self.dataset_id.clone(),
                    dataset_type: self.dataset_type.clone(),
                    meta: json!({}),
                },
                format: "jdbc".to_string(),
            },
            time_range: time_range.clone(),
        }
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self, query: &str, time_range: &TimeRange) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.body(query, time_range))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

/// The three queries behind one service map refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeQueries {
    pub requests: String,
    pub latency: String,
    pub fault_rate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fresh(EdgeMetricsMap),
    /// A newer fetch started before this one finished.
    Stale,
}

pub struct EdgeMetricsFetcher {
    executor: Arc<dyn QueryExecutor>,
    generation: AtomicU64,
    default_interval: String,
    default_lookback: chrono::Duration,
}

impl EdgeMetricsFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>, config: &Config) -> Self {
        Self {
            executor,
            generation: AtomicU64::new(0),
            default_interval: config.default_interval.clone(),
            default_lookback: config.default_lookback,
        }
    }

    pub fn queries(&self, request: &EdgeMetricsRequest) -> EdgeQueries {
        let interval = request
            .interval
            .as_deref()
            .unwrap_or(&self.default_interval);
        EdgeQueries {
            requests: build_query("request", &request.filters, interval, None),
            latency: build_query(
                "latency",
                &request.filters,
                interval,
                request.latency_stat.as_deref(),
            ),
            fault_rate: build_query("fault", &request.filters, interval, None),
        }
    }

    /// `[now - lookback, now]` as ISO-8601 timestamps.
    pub fn default_time_range(&self, now: DateTime<Utc>) -> TimeRange {
        TimeRange {
            from: (now - self.default_lookback).to_rfc3339_opts(SecondsFormat::Millis, true),
            to: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Marks every in-flight fetch as stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn fetch(&self, request: &EdgeMetricsRequest) -> Result<FetchOutcome> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let queries = self.queries(request);
        for metric in ["request", "latency", "fault"] {
            metrics::record_query_built(MetricFamily::of(metric).as_str());
        }
        let time_range = request
            .time_range
            .clone()
            .unwrap_or_else(|| self.default_time_range(Utc::now()));

        info!(
            "Fetching edge metrics (generation {}) from {} to {}",
            ticket, time_range.from, time_range.to
        );

        let (requests, latency, fault_rate) = tokio::join!(
            self.executor.execute(&queries.requests, &time_range),
            self.executor.execute(&queries.latency, &time_range),
            self.executor.execute(&queries.fault_rate, &time_range),
        );

        if self.generation.load(Ordering::SeqCst) != ticket {
            info!("Discarding edge metrics for superseded generation {}", ticket);
            metrics::record_fetch("stale");
            return Ok(FetchOutcome::Stale);
        }

        let (requests, latency, fault_rate) = match (requests, latency, fault_rate) {
            (Ok(r), Ok(l), Ok(f)) => (r, l, f),
            (r, l, f) => {
                let err = [r.err(), l.err(), f.err()]
                    .into_iter()
                    .flatten()
                    .next()
                    .unwrap_or_else(|| ServiceMapError::Internal("unknown fetch failure".into()));
                error!("Edge metrics fetch failed: {}", err);
                metrics::record_fetch("failed");
                return Err(err);
            }
        };

        let merged = metrics::observe_merge(merge_edge_metrics(
            &metrics::observe_extraction(extract_detailed(Some(&requests))),
            &metrics::observe_extraction(extract_detailed(Some(&latency))),
            &metrics::observe_extraction(extract_detailed(Some(&fault_rate))),
        ));
        metrics::record_fetch("fresh");
        Ok(FetchOutcome::Fresh(merged))
    }
}
