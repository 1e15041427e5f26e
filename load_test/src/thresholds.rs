//! Pass/fail rules evaluated against the final rates of a run.
//!
//! Expressions follow the k6 rate-threshold syntax: an optional `rate`
//! prefix, a comparison operator and a number, e.g. `rate<0.05` or `< 0.05`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::metrics::types::{MetricName, RateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    // Two-character operators first so `<=` is not read as `<`.
    const TOKENS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }

    pub fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }
}

/// The predicate part of a rule, without the metric it applies to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateExpression {
    pub comparison: Comparison,
    pub bound: f64,
}

impl FromStr for RateExpression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("rate")
            .map(str::trim_start)
            .unwrap_or(trimmed);

        let (comparison, rest) = Comparison::TOKENS
            .iter()
            .find_map(|(token, cmp)| body.strip_prefix(token).map(|rest| (*cmp, rest)))
            .ok_or_else(|| format!("expected a comparison operator in '{s}'"))?;

        let bound: f64 = rest
            .trim()
            .parse()
            .map_err(|_| format!("expected a number after '{}' in '{s}'", comparison.as_str()))?;
        if !bound.is_finite() {
            return Err(format!("threshold bound must be finite in '{s}'"));
        }

        Ok(Self { comparison, bound })
    }
}

impl fmt::Display for RateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate{}{}", self.comparison.as_str(), self.bound)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub metric: MetricName,
    pub expression: RateExpression,
    /// The expression as written in the config.
    pub source: String,
}

impl ThresholdRule {
    pub fn evaluate(&self, snapshot: &RateSnapshot) -> ThresholdOutcome {
        let observed = snapshot.rate(self.metric);
        ThresholdOutcome {
            metric: self.metric,
            expression: self.source.clone(),
            observed,
            passed: self
                .expression
                .comparison
                .holds(observed, self.expression.bound),
        }
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdOutcome {
    pub metric: MetricName,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

/// Evaluate every rule against the final snapshot, in configuration order.
pub fn evaluate_all(rules: &[ThresholdRule], snapshot: &RateSnapshot) -> Vec<ThresholdOutcome> {
    rules.iter().map(|rule| rule.evaluate(snapshot)).collect()
}

pub fn all_passed(outcomes: &[ThresholdOutcome]) -> bool {
    outcomes.iter().all(|o| o.passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(metric: MetricName, src: &str) -> ThresholdRule {
        ThresholdRule {
            metric,
            expression: src.parse().unwrap(),
            source: src.to_string(),
        }
    }

    #[test]
    fn test_parses_k6_and_bare_forms() {
        let e: RateExpression = "rate<0.05".parse().unwrap();
        assert_eq!(e.comparison, Comparison::Lt);
        assert_eq!(e.bound, 0.05);

        let e: RateExpression = "< 0.10".parse().unwrap();
        assert_eq!(e.comparison, Comparison::Lt);
        assert_eq!(e.bound, 0.10);

        let e: RateExpression = "rate <= 0.2".parse().unwrap();
        assert_eq!(e.comparison, Comparison::Le);

        let e: RateExpression = "rate!=0".parse().unwrap();
        assert_eq!(e.comparison, Comparison::Ne);
    }

    #[test]
    fn test_rejects_malformed_expressions() {
        assert!("rate 0.05".parse::<RateExpression>().is_err());
        assert!("rate<".parse::<RateExpression>().is_err());
        assert!("<abc".parse::<RateExpression>().is_err());
        assert!("<inf".parse::<RateExpression>().is_err());
        assert!("p(95)<200".parse::<RateExpression>().is_err());
    }

    #[test]
    fn test_evaluates_against_snapshot() {
        let snapshot = RateSnapshot {
            total: 100,
            throttled: 15,
            server_errors: 5,
            network_failures: 0,
        };

        let outcomes = evaluate_all(
            &[
                rule(MetricName::Rate429, "rate<0.05"),
                rule(MetricName::Rate5xx, "rate<0.10"),
                rule(MetricName::RateTimeout, "rate<0.20"),
            ],
            &snapshot,
        );

        assert!(!outcomes[0].passed);
        assert!((outcomes[0].observed - 0.15).abs() < 1e-12);
        assert!(outcomes[1].passed);
        assert!(outcomes[2].passed);
        assert!(!all_passed(&outcomes));
    }

    #[test]
    fn test_empty_run_evaluates_at_zero() {
        let outcomes = evaluate_all(
            &[rule(MetricName::RateTimeout, "rate<0.20")],
            &RateSnapshot::default(),
        );
        assert!(outcomes[0].passed);
        assert_eq!(outcomes[0].observed, 0.0);
    }

    #[test]
    fn test_no_rules_pass() {
        assert!(all_passed(&[]));
    }
}
