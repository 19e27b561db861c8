//! PromQL construction for service map metrics.
//!
//! Counter families (`error`, `fault`, `request`) are queried through a
//! windowed `rate`, optionally wrapped in an aggregation. The `latency`
//! histogram family is queried either as a ratio of rates or through one of
//! the quantile/extreme forms. Any other metric name is passed through as a
//! bare selector.

use crate::models::{LabelFilters, MetricQueryRequest};

/// Metric family a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    Rate,
    Latency,
    Generic,
}

impl MetricFamily {
    pub fn of(metric_name: &str) -> Self {
        match metric_name {
            "error" | "fault" | "request" => MetricFamily::Rate,
            "latency" => MetricFamily::Latency,
            _ => MetricFamily::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricFamily::Rate => "rate",
            MetricFamily::Latency => "latency",
            MetricFamily::Generic => "generic",
        }
    }
}

/// Statistic selector, parsed case-insensitively. Unknown selectors map to
/// `None` and are ignored by every family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Sum,
    Avg,
    Max,
    Min,
    P99,
    P90,
    P50,
}

impl Stat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "sum" => Some(Stat::Sum),
            "avg" | "average" => Some(Stat::Avg),
            "max" | "maximum" => Some(Stat::Max),
            "min" | "minimum" => Some(Stat::Min),
            "p99" => Some(Stat::P99),
            "p90" => Some(Stat::P90),
            "p50" => Some(Stat::P50),
            _ => None,
        }
    }
}

/// Renders `{k1="v1",k2="v2"}`, or nothing when there are no filters.
pub fn label_selector(filters: &LabelFilters) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let clauses: Vec<String> = filters
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect();
    format!("{{{}}}", clauses.join(","))
}

/// Builds the PromQL text for one metric request.
///
/// Never fails: every input produces a best-effort query string.
pub fn build_query(
    metric_name: &str,
    filters: &LabelFilters,
    interval: &str,
    stat: Option<&str>,
) -> String {
    let family = MetricFamily::of(metric_name);
    let selector = label_selector(filters);
    let stat = stat.and_then(Stat::parse);

    match family {
        MetricFamily::Rate => rate_query(metric_name, &selector, interval, stat),
        MetricFamily::Latency => latency_query(&selector, interval, stat),
        MetricFamily::Generic => format!("{}{}", metric_name, selector),
    }
}

/// Convenience wrapper over [`build_query`] for a deserialized request.
pub fn build_from_request(request: &MetricQueryRequest) -> String {
    build_query(
        &request.metric_name,
        &request.filters,
        &request.interval,
        request.stat.as_deref(),
    )
}

fn rate_query(metric_name: &str, selector: &str, interval: &str, stat: Option<Stat>) -> String {
    let base = format!("rate({}{}[{}])", metric_name, selector, interval);
    match stat {
        Some(Stat::Sum) => format!("sum({})", base),
        Some(Stat::Avg) => format!("avg({})", base),
        Some(Stat::Max) => format!("max({})", base),
        Some(Stat::Min) => format!("min({})", base),
        // quantiles mean nothing for a counter rate
        Some(Stat::P99 | Stat::P90 | Stat::P50) | None => base,
    }
}

fn latency_query(selector: &str, interval: &str, stat: Option<Stat>) -> String {
    let quantile = |q: &str| {
        format!(
            "histogram_quantile({}, rate(latency_seconds_bucket{}[{}]))",
            q, selector, interval
        )
    };
    match stat {
        Some(Stat::P99) => quantile("0.99"),
        Some(Stat::P90) => quantile("0.90"),
        Some(Stat::P50) => quantile("0.50"),
        Some(Stat::Max) => format!("max_over_time(latency_seconds_max{}[{}])", selector, interval),
        Some(Stat::Min) => format!("min_over_time(latency_seconds_min{}[{}])", selector, interval),
        Some(Stat::Avg | Stat::Sum) | None => format!(
            "rate(latency_seconds_sum{sel}[{iv}]) / rate(latency_seconds_count{sel}[{iv}])",
            sel = selector,
            iv = interval
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filters(pairs: &[(&str, &str)]) -> LabelFilters {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_rate_family_without_stat() {
        let f = filters(&[("service", "api-gateway")]);
        assert_eq!(
            build_query("error", &f, "5m", None),
            r#"rate(error{service="api-gateway"}[5m])"#
        );
        assert_eq!(
            build_query("request", &LabelFilters::new(), "1h", None),
            "rate(request[1h])"
        );
    }

    #[test]
    fn test_rate_family_wrapping() {
        let f = filters(&[("service", "api-gateway")]);
        assert_eq!(
            build_query("fault", &f, "5m", Some("sum")),
            r#"sum(rate(fault{service="api-gateway"}[5m]))"#
        );
        assert_eq!(
            build_query("request", &f, "5m", Some("Average")),
            r#"avg(rate(request{service="api-gateway"}[5m]))"#
        );
        assert_eq!(
            build_query("request", &f, "5m", Some("MAXIMUM")),
            r#"max(rate(request{service="api-gateway"}[5m]))"#
        );
        assert_eq!(
            build_query("error", &f, "5m", Some("min")),
            r#"min(rate(error{service="api-gateway"}[5m]))"#
        );
    }

    #[test]
    fn test_rate_family_ignores_unknown_stat() {
        let f = filters(&[("service", "a")]);
        let base = build_query("fault", &f, "5m", None);
        for stat in ["", "median", "p99", "count", "sum "] {
            assert_eq!(build_query("fault", &f, "5m", Some(stat)), base, "stat {:?}", stat);
        }
    }

    #[test]
    fn test_latency_default_matches_avg() {
        let expected = "rate(latency_seconds_sum[5m]) / rate(latency_seconds_count[5m])";
        let empty = LabelFilters::new();
        assert_eq!(build_query("latency", &empty, "5m", None), expected);
        assert_eq!(build_query("latency", &empty, "5m", Some("avg")), expected);
        assert_eq!(build_query("latency", &empty, "5m", Some("AVERAGE")), expected);
        assert_eq!(build_query("latency", &empty, "5m", Some("bogus")), expected);
    }

    #[test]
    fn test_latency_quantiles_and_extremes() {
        let empty = LabelFilters::new();
        assert_eq!(
            build_query("latency", &empty, "5m", Some("p99")),
            "histogram_quantile(0.99, rate(latency_seconds_bucket[5m]))"
        );
        assert_eq!(
            build_query("latency", &empty, "5m", Some("P90")),
            "histogram_quantile(0.90, rate(latency_seconds_bucket[5m]))"
        );
        assert_eq!(
            build_query("latency", &empty, "5m", Some("p50")),
            "histogram_quantile(0.50, rate(latency_seconds_bucket[5m]))"
        );
        assert_eq!(
            build_query("latency", &empty, "10m", Some("maximum")),
            "max_over_time(latency_seconds_max[10m])"
        );
        assert_eq!(
            build_query("latency", &empty, "10m", Some("Min")),
            "min_over_time(latency_seconds_min[10m])"
        );
    }

    #[test]
    fn test_latency_with_filters() {
        let f = filters(&[("service", "cart"), ("environment", "prod")]);
        assert_eq!(
            build_query("latency", &f, "5m", None),
            r#"rate(latency_seconds_sum{service="cart",environment="prod"}[5m]) / rate(latency_seconds_count{service="cart",environment="prod"}[5m])"#
        );
    }

    #[test]
    fn test_generic_metric_passthrough() {
        let empty = LabelFilters::new();
        assert_eq!(build_query("custom_metric", &empty, "5m", None), "custom_metric");
        assert_eq!(build_query("custom_metric", &empty, "5m", Some("sum")), "custom_metric");
        assert_eq!(
            build_query("up", &filters(&[("job", "node")]), "ignored", Some("p99")),
            r#"up{job="node"}"#
        );
        assert_eq!(build_query("", &empty, "5m", None), "");
    }

    #[test]
    fn test_selector_has_one_clause_per_filter() {
        assert_eq!(label_selector(&LabelFilters::new()), "");

        let f = filters(&[("b", "2"), ("a", "1"), ("c", "x y")]);
        let selector = label_selector(&f);
        assert!(selector.starts_with('{') && selector.ends_with('}'));
        let inner = &selector[1..selector.len() - 1];
        assert_eq!(inner.split(',').collect::<Vec<_>>(), vec![r#"b="2""#, r#"a="1""#, r#"c="x y""#]);
    }

    #[test]
    fn test_build_from_request() {
        let request = MetricQueryRequest {
            metric_name: "request".to_string(),
            filters: filters(&[("service", "web")]),
            interval: "1m".to_string(),
            stat: Some("SUM".to_string()),
        };
        assert_eq!(build_from_request(&request), r#"sum(rate(request{service="web"}[1m]))"#);
    }
}
