use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::handlers;
use crate::{
    config::Config,
    fetcher::{EdgeMetricsFetcher, HttpQueryExecutor},
    Result, ServiceMapError,
};

#[derive(Clone, Default)]
pub struct AppState {
    /// Present only when a query endpoint is configured.
    pub fetcher: Option<Arc<EdgeMetricsFetcher>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = match config.query_endpoint {
            Some(ref endpoint) => {
                info!(
                    "Edge fetching enabled against {} (timeout {:?})",
                    endpoint, config.query_timeout
                );
                let executor = Arc::new(HttpQueryExecutor::new(config)?);
                Some(Arc::new(EdgeMetricsFetcher::new(executor, config)))
            }
            None => {
                info!("QUERY_ENDPOINT not set, edge fetching disabled");
                None
            }
        };
        Ok(Self { fetcher })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/query/build", post(handlers::build_query))
        .route("/edges/extract", post(handlers::extract_edges))
        .route("/edges/merge", post(handlers::merge_edges))
        .route("/edges/normalize", post(handlers::normalize_edges))
        .route("/service-map/edges", post(handlers::fetch_service_map))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = router(state);

    let addr = config.bind_addr();
    info!("Starting service map metrics server on {}", addr);

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        ServiceMapError::Internal(format!("Failed to bind to address: {}", e))
    })?;

    axum::serve(listener, app).await.map_err(|e| {
        ServiceMapError::Internal(format!("Server error: {}", e))
    })?;

    Ok(())
}
