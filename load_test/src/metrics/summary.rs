//! Machine-readable run summary, written with `--summary-export`.
//!
//! The layout follows k6's `--summary-export` file: a `metrics` object keyed
//! by metric name, so report tooling built for k6 reads it unchanged.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::types::MetricName;
use crate::scenarios::RunReport;

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub state: RunState,
    pub metrics: SummaryMetrics,
    pub passed: bool,
}

#[derive(Debug, Serialize)]
pub struct RunState {
    #[serde(rename = "testRunDurationMs")]
    pub test_run_duration_ms: f64,
    pub interrupted: bool,
    pub peak_workers: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryMetrics {
    pub http_reqs: CounterMetric,
    pub http_req_duration: TrendMetric,
    #[serde(flatten)]
    pub rates: BTreeMap<MetricName, RateMetric>,
}

#[derive(Debug, Serialize)]
pub struct CounterMetric {
    pub count: u64,
    /// Per second over the whole run.
    pub rate: f64,
}

/// Response latency in milliseconds.
#[derive(Debug, Serialize)]
pub struct TrendMetric {
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    #[serde(rename = "p(95)")]
    pub p95: f64,
    #[serde(rename = "p(99)")]
    pub p99: f64,
}

#[derive(Debug, Serialize)]
pub struct RateMetric {
    pub value: f64,
    /// Requests in the category.
    pub passes: u64,
    /// Requests outside it.
    pub fails: u64,
    /// Expression to `true` when it was crossed, as k6 writes it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, bool>,
}

impl RunSummary {
    pub fn from_report(report: &RunReport) -> Self {
        let elapsed = report.elapsed.as_secs_f64();
        let rates = &report.rates;
        let latency = &report.latency;

        let rate_metrics = MetricName::ALL
            .into_iter()
            .map(|metric| {
                let count = rates.count(metric);
                let thresholds = report
                    .thresholds
                    .iter()
                    .filter(|t| t.metric == metric)
                    .map(|t| (t.expression.clone(), !t.passed))
                    .collect();
                (
                    metric,
                    RateMetric {
                        value: rates.rate(metric),
                        passes: count,
                        fails: rates.total - count,
                        thresholds,
                    },
                )
            })
            .collect();

        Self {
            state: RunState {
                test_run_duration_ms: elapsed * 1000.0,
                interrupted: report.interrupted,
                peak_workers: report.peak_workers,
            },
            metrics: SummaryMetrics {
                http_reqs: CounterMetric {
                    count: rates.total,
                    rate: if elapsed > 0.0 {
                        rates.total as f64 / elapsed
                    } else {
                        0.0
                    },
                },
                http_req_duration: TrendMetric {
                    avg: latency.mean,
                    min: latency.min as f64,
                    med: latency.p50 as f64,
                    max: latency.max as f64,
                    p95: latency.p95 as f64,
                    p99: latency.p99 as f64,
                },
                rates: rate_metrics,
            },
            passed: report.passed(),
        }
    }
}

pub fn write_summary(path: &Path, report: &RunReport) -> Result<()> {
    let summary = RunSummary::from_report(report);
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write summary to {}", path.display()))?;
    tracing::info!("Summary written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::collector::LatencyStats;
    use crate::metrics::types::RateSnapshot;
    use crate::thresholds::ThresholdOutcome;
    use std::time::Duration;

    fn report() -> RunReport {
        RunReport {
            rates: RateSnapshot {
                total: 10,
                throttled: 2,
                server_errors: 0,
                network_failures: 5,
            },
            latency: LatencyStats {
                min: 3,
                p50: 12,
                p95: 40,
                p99: 55,
                max: 61,
                mean: 17.5,
                count: 5,
            },
            elapsed: Duration::from_millis(2500),
            peak_workers: 5,
            thresholds: vec![
                ThresholdOutcome {
                    metric: MetricName::Rate429,
                    expression: "rate<0.05".to_string(),
                    observed: 0.2,
                    passed: false,
                },
                ThresholdOutcome {
                    metric: MetricName::RateTimeout,
                    expression: "rate<0.80".to_string(),
                    observed: 0.5,
                    passed: true,
                },
            ],
            interrupted: false,
        }
    }

    #[test]
    fn test_summary_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k6_summary.json");
        write_summary(&path, &report()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let metrics = &value["metrics"];

        assert_eq!(metrics["http_reqs"]["count"], 10);
        assert_eq!(metrics["http_reqs"]["rate"], 4.0);

        let duration = &metrics["http_req_duration"];
        assert_eq!(duration["p(95)"], 40.0);
        assert_eq!(duration["p(99)"], 55.0);
        assert_eq!(duration["max"], 61.0);
        assert_eq!(duration["med"], 12.0);
        assert_eq!(duration["avg"], 17.5);

        assert_eq!(metrics["rate_429"]["value"], 0.2);
        assert_eq!(metrics["rate_429"]["passes"], 2);
        assert_eq!(metrics["rate_429"]["fails"], 8);
        assert_eq!(metrics["rate_429"]["thresholds"]["rate<0.05"], true);
        assert_eq!(metrics["rate_timeout"]["value"], 0.5);
        assert_eq!(metrics["rate_timeout"]["thresholds"]["rate<0.80"], false);
        assert_eq!(metrics["rate_5xx"]["value"], 0.0);
        assert!(metrics["rate_5xx"].get("thresholds").is_none());

        assert_eq!(value["state"]["testRunDurationMs"], 2500.0);
        assert_eq!(value["passed"], false);
    }

    #[test]
    fn test_empty_run_has_zero_rates() {
        let mut empty = report();
        empty.rates = RateSnapshot::default();
        empty.latency = LatencyStats::default();
        empty.elapsed = Duration::ZERO;
        empty.thresholds.clear();

        let value = serde_json::to_value(RunSummary::from_report(&empty)).unwrap();
        assert_eq!(value["metrics"]["http_reqs"]["count"], 0);
        assert_eq!(value["metrics"]["http_reqs"]["rate"], 0.0);
        for metric in MetricName::ALL {
            assert_eq!(value["metrics"][metric.as_str()]["value"], 0.0);
        }
        assert_eq!(value["passed"], true);
    }
}
