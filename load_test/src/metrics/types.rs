//! Metric types

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Category a single request attempt falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeClass {
    /// Any status that is neither 429 nor 5xx.
    Success,
    /// 429 Too Many Requests.
    Throttled,
    /// Status >= 500.
    ServerError,
    /// No status was received: connection error or timeout.
    NetworkFailure,
}

impl OutcomeClass {
    /// The rate this outcome counts towards, if any.
    pub fn metric(self) -> Option<MetricName> {
        match self {
            OutcomeClass::Success => None,
            OutcomeClass::Throttled => Some(MetricName::Rate429),
            OutcomeClass::ServerError => Some(MetricName::Rate5xx),
            OutcomeClass::NetworkFailure => Some(MetricName::RateTimeout),
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, OutcomeClass::ServerError | OutcomeClass::NetworkFailure)
    }
}

/// Rates that thresholds may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricName {
    #[serde(rename = "rate_429")]
    Rate429,
    #[serde(rename = "rate_5xx")]
    Rate5xx,
    #[serde(rename = "rate_timeout")]
    RateTimeout,
}

impl MetricName {
    pub const ALL: [MetricName; 3] = [
        MetricName::Rate429,
        MetricName::Rate5xx,
        MetricName::RateTimeout,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::Rate429 => "rate_429",
            MetricName::Rate5xx => "rate_5xx",
            MetricName::RateTimeout => "rate_timeout",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| s.to_string())
    }
}

/// Point-in-time copy of the rate accumulators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateSnapshot {
    pub total: u64,
    pub throttled: u64,
    pub server_errors: u64,
    pub network_failures: u64,
}

impl RateSnapshot {
    pub fn count(&self, metric: MetricName) -> u64 {
        match metric {
            MetricName::Rate429 => self.throttled,
            MetricName::Rate5xx => self.server_errors,
            MetricName::RateTimeout => self.network_failures,
        }
    }

    /// Fraction of attempts in `metric`. Zero when nothing was sent.
    pub fn rate(&self, metric: MetricName) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(metric) as f64 / self.total as f64
    }

    /// Attempts that landed in none of the three categories.
    pub fn uncategorized(&self) -> u64 {
        self.total
            .saturating_sub(self.throttled + self.server_errors + self.network_failures)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerMetrics {
    pub active: usize,
    pub peak: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SystemMetrics {
    pub cpu_usage: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TestMetrics {
    pub rates: RateSnapshot,
    pub workers: WorkerMetrics,
    pub system: SystemMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_reports_zero_rates() {
        let snapshot = RateSnapshot::default();
        for metric in MetricName::ALL {
            assert_eq!(snapshot.rate(metric), 0.0);
        }
    }

    #[test]
    fn test_rates_are_fractions_of_total() {
        let snapshot = RateSnapshot {
            total: 20,
            throttled: 3,
            server_errors: 1,
            network_failures: 0,
        };
        assert!((snapshot.rate(MetricName::Rate429) - 0.15).abs() < 1e-12);
        assert!((snapshot.rate(MetricName::Rate5xx) - 0.05).abs() < 1e-12);
        assert_eq!(snapshot.rate(MetricName::RateTimeout), 0.0);
        assert_eq!(snapshot.uncategorized(), 16);
    }

    #[test]
    fn test_metric_names_round_trip_through_strings() {
        assert_eq!("rate_429".parse::<MetricName>(), Ok(MetricName::Rate429));
        assert_eq!(" rate_5xx ".parse::<MetricName>(), Ok(MetricName::Rate5xx));
        assert!("http_req_duration".parse::<MetricName>().is_err());
    }

    #[test]
    fn test_only_success_has_no_metric() {
        assert_eq!(OutcomeClass::Success.metric(), None);
        assert_eq!(
            OutcomeClass::NetworkFailure.metric(),
            Some(MetricName::RateTimeout)
        );
        assert!(!OutcomeClass::Throttled.is_failure());
        assert!(OutcomeClass::ServerError.is_failure());
    }
}
