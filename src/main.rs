use service_map_metrics::{api, config::Config, logging, metrics};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    logging::init_logger(config.log_json);

    // Initialize metrics
    metrics::init_metrics();

    if let Err(e) = api::start_server(config).await {
        tracing::error!("Server exited: {}", e);
        std::process::exit(1);
    }
}
