use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::{Result, ServiceMapError};

/// Service settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    /// Query-execution endpoint; edge fetching is disabled when unset.
    pub query_endpoint: Option<String>,
    pub dataset_id: String,
    pub dataset_type: String,
    pub query_language: String,
    pub query_timeout: Duration,
    pub default_interval: String,
    pub default_lookback: chrono::Duration,
    /// `LOG_FORMAT=json` switches to JSON log lines.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            query_endpoint: None,
            dataset_id: "default".to_string(),
            dataset_type: "PROMETHEUS".to_string(),
            query_language: "PROMQL".to_string(),
            query_timeout: Duration::from_millis(10_000),
            default_interval: "5m".to_string(),
            default_lookback: chrono::Duration::minutes(15),
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&env::vars().collect())
    }

    /// Builds a config from an explicit variable map; unset variables keep
    /// their defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let defaults = Config::default();
        let text = |name: &str, default: String| -> String {
            vars.get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or(default)
        };

        let port = parse_var(vars, "PORT")?.unwrap_or(defaults.port);
        let timeout_ms: Option<u64> = parse_var(vars, "QUERY_TIMEOUT_MS")?;
        let lookback_minutes: Option<i64> = parse_var(vars, "DEFAULT_LOOKBACK_MINUTES")?;

        Ok(Self {
            port,
            query_endpoint: vars.get("QUERY_ENDPOINT").filter(|v| !v.is_empty()).cloned(),
            dataset_id: text("DATASET_ID", defaults.dataset_id),
            dataset_type: text("DATASET_TYPE", defaults.dataset_type),
            query_language: text("QUERY_LANGUAGE", defaults.query_language),
            query_timeout: timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.query_timeout),
            default_interval: text("DEFAULT_INTERVAL", defaults.default_interval),
            default_lookback: lookback_minutes
                .map(chrono::Duration::minutes)
                .unwrap_or(defaults.default_lookback),
            log_json: vars
                .get("LOG_FORMAT")
                .map_or(false, |v| v.eq_ignore_ascii_case("json")),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match vars.get(name).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ServiceMapError::Config(format!("{}={:?}: {}", name, raw, e))),
        None => Ok(None),
    }
}
