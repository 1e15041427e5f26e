//! Workload configuration: load shape, request target, pacing and thresholds.
//!
//! Scenario files, CLI flags and presets all produce a [`RawConfig`]; the only
//! way to obtain a [`WorkloadConfig`] is [`WorkloadConfig::from_raw`], which
//! performs every validation check before a run may start.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::duration::SignedDuration;
use crate::metrics::types::MetricName;
use crate::thresholds::{RateExpression, ThresholdRule};

pub const DEFAULT_BASE_URL: &str = "https://api.resilience.local";
pub const DEFAULT_PATH: &str = "/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_THINK_TIME: Duration = Duration::from_millis(100);
/// Longest run a configuration may describe.
pub const MAX_RUN_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must not be negative (got {value})")]
    NegativeDuration { field: String, value: String },

    #[error("threshold references unknown metric '{0}' (expected rate_429, rate_5xx or rate_timeout)")]
    UnknownMetric(String),

    #[error("invalid threshold '{expression}' for {metric}: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },

    #[error("threshold list for {0} is empty")]
    EmptyThreshold(String),

    #[error("'concurrency' and 'stages' are mutually exclusive")]
    ConflictingLoadShape,

    #[error("either 'concurrency' with 'duration' or 'stages' must be set")]
    MissingLoadShape,

    #[error("run lasts {total}, longer than the {max} limit")]
    RunTooLong { total: String, max: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid base url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid stage '{input}': {reason}")]
    InvalidStage { input: String, reason: String },

    #[error("invalid query parameter '{input}': {reason}")]
    InvalidQuery { input: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// A single integer query parameter, e.g. `n=400000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: u64,
}

impl FromStr for QueryParam {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidQuery {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let (name, value) = s.split_once('=').ok_or_else(|| invalid("expected name=value"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        let value = value
            .trim()
            .parse()
            .map_err(|_| invalid("value must be a non-negative integer"))?;
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Stage as written by the user, before sign checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStage {
    pub duration: SignedDuration,
    pub target: u64,
}

impl FromStr for RawStage {
    type Err = ConfigError;

    /// Parses `<duration>:<target>`, e.g. `45s:80`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::InvalidStage {
            input: s.to_string(),
            reason,
        };
        let (duration, target) = s
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected <duration>:<target>".to_string()))?;
        let duration = duration.parse().map_err(invalid)?;
        let target = target
            .trim()
            .parse()
            .map_err(|_| invalid("target must be a non-negative integer".to_string()))?;
        Ok(Self { duration, target })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdExprs {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprs {
    fn into_vec(self) -> Vec<String> {
        match self {
            ThresholdExprs::One(s) => vec![s],
            ThresholdExprs::Many(v) => v,
        }
    }
}

/// Unvalidated configuration, mirroring the scenario file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_param: Option<QueryParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<SignedDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think_time: Option<SignedDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<SignedDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_concurrency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<RawStage>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, ThresholdExprs>,
}

impl RawConfig {
    /// Load a scenario file. `.json` files are read as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let label = path.display().to_string();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text, &label)
        } else {
            Self::from_yaml_str(&text, &label)
        }
    }

    pub fn from_yaml_str(text: &str, label: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
            path: label.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_json_str(text: &str, label: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: label.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

/// How many workers should be running over the course of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadShape {
    /// A fixed number of workers for a fixed duration.
    Constant { concurrency: u64, duration: Duration },
    /// Linear ramps between stage targets, starting from `start_concurrency`.
    Ramping {
        start_concurrency: u64,
        stages: Vec<Stage>,
    },
}

impl LoadShape {
    /// Length of the whole run. Saturates instead of overflowing.
    pub fn total_duration(&self) -> Duration {
        self.checked_total_duration().unwrap_or(Duration::MAX)
    }

    fn checked_total_duration(&self) -> Option<Duration> {
        match self {
            LoadShape::Constant { duration, .. } => Some(*duration),
            LoadShape::Ramping { stages, .. } => stages
                .iter()
                .try_fold(Duration::ZERO, |acc, s| acc.checked_add(s.duration)),
        }
    }

    /// Highest worker count the shape ever asks for.
    pub fn max_concurrency(&self) -> u64 {
        match self {
            LoadShape::Constant { concurrency, .. } => *concurrency,
            LoadShape::Ramping {
                start_concurrency,
                stages,
            } => stages
                .iter()
                .map(|s| s.target)
                .fold(*start_concurrency, u64::max),
        }
    }
}

impl fmt::Display for LoadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadShape::Constant {
                concurrency,
                duration,
            } => write!(
                f,
                "{} workers for {}",
                concurrency,
                humantime::format_duration(*duration)
            ),
            LoadShape::Ramping {
                start_concurrency,
                stages,
            } => {
                write!(f, "start {}", start_concurrency)?;
                for stage in stages {
                    write!(
                        f,
                        " -> {} over {}",
                        stage.target,
                        humantime::format_duration(stage.duration)
                    )?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    pub base_url: Url,
    pub path: String,
    pub query_param: Option<QueryParam>,
    pub timeout: Duration,
    pub insecure_skip_tls_verify: bool,
}

impl TargetConfig {
    /// Full request URL: base, path and query parameter.
    pub fn url(&self) -> Url {
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        let path = self.path.trim_start_matches('/');
        url.set_path(&format!("{}/{}", base_path, path));
        if let Some(param) = &self.query_param {
            url.query_pairs_mut()
                .append_pair(&param.name, &param.value.to_string());
        }
        url
    }
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub shape: LoadShape,
    pub target: TargetConfig,
    pub think_time: Duration,
    pub thresholds: Vec<ThresholdRule>,
}

fn non_negative(field: impl Into<String>, value: SignedDuration) -> Result<Duration, ConfigError> {
    value.to_duration().ok_or_else(|| ConfigError::NegativeDuration {
        field: field.into(),
        value: value.to_string(),
    })
}

impl WorkloadConfig {
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let shape = match (raw.concurrency, raw.stages) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingLoadShape),
            (None, None) => return Err(ConfigError::MissingLoadShape),
            (Some(concurrency), None) => {
                let duration = raw.duration.ok_or(ConfigError::MissingField("duration"))?;
                LoadShape::Constant {
                    concurrency,
                    duration: non_negative("duration", duration)?,
                }
            }
            (None, Some(raw_stages)) => {
                let stages = raw_stages
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| {
                        Ok(Stage {
                            duration: non_negative(format!("stages[{}].duration", i), s.duration)?,
                            target: s.target,
                        })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                LoadShape::Ramping {
                    start_concurrency: raw.start_concurrency.unwrap_or(0),
                    stages,
                }
            }
        };

        match shape.checked_total_duration() {
            Some(total) if total <= MAX_RUN_DURATION => {}
            total => {
                return Err(ConfigError::RunTooLong {
                    total: total
                        .map(|t| humantime::format_duration(t).to_string())
                        .unwrap_or_else(|| "longer than can be represented".to_string()),
                    max: humantime::format_duration(MAX_RUN_DURATION).to_string(),
                })
            }
        }

        let base_url_str = raw.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base_url_str).map_err(|e| ConfigError::InvalidUrl {
            url: base_url_str.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: base_url_str,
                reason: "not a base url".to_string(),
            });
        }

        let timeout = match raw.timeout {
            Some(t) => non_negative("timeout", t)?,
            None => DEFAULT_TIMEOUT,
        };
        let think_time = match raw.think_time {
            Some(t) => non_negative("think_time", t)?,
            None => DEFAULT_THINK_TIME,
        };

        let target = TargetConfig {
            base_url,
            path: raw.path.unwrap_or_else(|| DEFAULT_PATH.to_string()),
            query_param: raw.query_param,
            timeout,
            insecure_skip_tls_verify: raw.insecure_skip_tls_verify.unwrap_or(false),
        };

        let mut thresholds = Vec::new();
        for (name, exprs) in raw.thresholds {
            let metric: MetricName = name.parse().map_err(ConfigError::UnknownMetric)?;
            let exprs = exprs.into_vec();
            if exprs.is_empty() {
                return Err(ConfigError::EmptyThreshold(name));
            }
            for source in exprs {
                let expression: RateExpression =
                    source
                        .parse()
                        .map_err(|reason| ConfigError::InvalidThreshold {
                            metric: name.clone(),
                            expression: source.clone(),
                            reason,
                        })?;
                thresholds.push(ThresholdRule {
                    metric,
                    expression,
                    source,
                });
            }
        }

        Ok(Self {
            shape,
            target,
            think_time,
            thresholds,
        })
    }
}

/// Parse a `metric<expr>` pair as given on the command line, e.g. `rate_429<0.05`.
pub fn parse_threshold_flag(s: &str) -> Result<(String, String), String> {
    let split = s
        .find(|c| matches!(c, '<' | '>' | '=' | '!'))
        .ok_or_else(|| format!("expected <metric><op><bound>, got '{}'", s))?;
    let (metric, expr) = s.split_at(split);
    let metric = metric.trim();
    if metric.is_empty() {
        return Err(format!("missing metric name in '{}'", s));
    }
    Ok((metric.to_string(), expr.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(stages: &[(&str, u64)]) -> RawConfig {
        RawConfig {
            stages: Some(
                stages
                    .iter()
                    .map(|(d, t)| RawStage {
                        duration: d.parse().unwrap(),
                        target: *t,
                    })
                    .collect(),
            ),
            ..RawConfig::default()
        }
    }

    #[test]
    fn test_yaml_scenario_file() {
        let raw = RawConfig::from_yaml_str(
            r#"
base_url: https://api.resilience.local
path: /work
query_param: { name: n, value: 400000 }
timeout: 20s
insecure_skip_tls_verify: true
think_time: 100ms
stages:
  - { duration: 15s, target: 10 }
  - { duration: 45s, target: 80 }
  - { duration: 15s, target: 0 }
thresholds:
  rate_429: ["rate<0.05"]
  rate_5xx: "rate<0.10"
  rate_timeout: ["rate<0.20"]
"#,
            "dos.yaml",
        )
        .unwrap();

        let config = WorkloadConfig::from_raw(raw).unwrap();
        assert_eq!(config.shape.total_duration(), Duration::from_secs(75));
        assert_eq!(config.shape.max_concurrency(), 80);
        assert_eq!(config.target.timeout, Duration::from_secs(20));
        assert_eq!(config.think_time, Duration::from_millis(100));
        assert!(config.target.insecure_skip_tls_verify);
        assert_eq!(config.thresholds.len(), 3);
        assert_eq!(
            config.target.url().as_str(),
            "https://api.resilience.local/work?n=400000"
        );
    }

    #[test]
    fn test_json_scenario_file() {
        let raw = RawConfig::from_json_str(
            r#"{"concurrency": 50, "duration": "30s", "path": "/ping"}"#,
            "ping.json",
        )
        .unwrap();
        let config = WorkloadConfig::from_raw(raw).unwrap();
        assert_eq!(
            config.shape,
            LoadShape::Constant {
                concurrency: 50,
                duration: Duration::from_secs(30)
            }
        );
        assert!(config.thresholds.is_empty());
        assert_eq!(config.target.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = RawConfig::from_yaml_str("vus: 10\n", "x.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_negative_stage_duration_is_rejected() {
        let err = WorkloadConfig::from_raw(staged(&[("10s", 5), ("-5s", 10)])).unwrap_err();
        match err {
            ConfigError::NegativeDuration { field, .. } => assert_eq!(field, "stages[1].duration"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_numeric_duration_from_yaml_is_rejected() {
        let raw = RawConfig::from_yaml_str("concurrency: 2\nduration: -30\n", "x.yaml").unwrap();
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::NegativeDuration { .. })
        ));
    }

    #[test]
    fn test_unknown_threshold_metric_is_rejected() {
        let mut raw = staged(&[("1s", 1)]);
        raw.thresholds.insert(
            "http_req_duration".to_string(),
            ThresholdExprs::One("p(95)<200".to_string()),
        );
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::UnknownMetric(name)) if name == "http_req_duration"
        ));
    }

    #[test]
    fn test_malformed_threshold_is_rejected() {
        let mut raw = staged(&[("1s", 1)]);
        raw.thresholds
            .insert("rate_429".to_string(), ThresholdExprs::One("rate~0.1".to_string()));
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::InvalidThreshold { .. })
        ));

        let mut raw = staged(&[("1s", 1)]);
        raw.thresholds
            .insert("rate_429".to_string(), ThresholdExprs::Many(vec![]));
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::EmptyThreshold(_))
        ));
    }

    #[test]
    fn test_load_shape_must_be_unambiguous() {
        let mut raw = staged(&[("1s", 1)]);
        raw.concurrency = Some(3);
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::ConflictingLoadShape)
        ));

        assert!(matches!(
            WorkloadConfig::from_raw(RawConfig::default()),
            Err(ConfigError::MissingLoadShape)
        ));

        let raw = RawConfig {
            concurrency: Some(3),
            ..RawConfig::default()
        };
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::MissingField("duration"))
        ));
    }

    #[test]
    fn test_run_length_is_bounded() {
        let raw = RawConfig {
            concurrency: Some(0),
            duration: Some("500000000000years".parse().unwrap()),
            ..RawConfig::default()
        };
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::RunTooLong { .. })
        ));

        // Stage lengths that overflow when summed.
        let huge = SignedDuration::from(Duration::from_secs(u64::MAX));
        let raw = RawConfig {
            stages: Some(vec![
                RawStage { duration: huge, target: 1 },
                RawStage { duration: huge, target: 1 },
            ]),
            ..RawConfig::default()
        };
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::RunTooLong { .. })
        ));

        let config = WorkloadConfig::from_raw(RawConfig {
            concurrency: Some(1),
            duration: Some(MAX_RUN_DURATION.into()),
            ..RawConfig::default()
        })
        .unwrap();
        assert_eq!(config.shape.total_duration(), MAX_RUN_DURATION);
    }

    #[test]
    fn test_out_of_range_duration_in_file_is_a_parse_error() {
        let err = RawConfig::from_yaml_str("concurrency: 1\nduration: 1e30\n", "x.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_empty_stage_list_is_valid() {
        let config = WorkloadConfig::from_raw(staged(&[])).unwrap();
        assert_eq!(config.shape.total_duration(), Duration::ZERO);
        assert_eq!(config.shape.max_concurrency(), 0);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut raw = staged(&[("1s", 1)]);
        raw.base_url = Some("not a url".to_string());
        assert!(matches!(
            WorkloadConfig::from_raw(raw),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_url_joins_base_path_and_query() {
        let mut raw = staged(&[("1s", 1)]);
        raw.base_url = Some("http://127.0.0.1:8080/api/".to_string());
        raw.path = Some("work".to_string());
        raw.query_param = Some("n=5".parse().unwrap());
        let config = WorkloadConfig::from_raw(raw).unwrap();
        assert_eq!(config.target.url().as_str(), "http://127.0.0.1:8080/api/work?n=5");
    }

    #[test]
    fn test_stage_and_query_flags() {
        let stage: RawStage = "45s:80".parse().unwrap();
        assert_eq!(stage.target, 80);
        assert_eq!(stage.duration.to_duration(), Some(Duration::from_secs(45)));

        let stage: RawStage = "-1s:3".parse().unwrap();
        assert!(stage.duration.is_negative());

        assert!("45s".parse::<RawStage>().is_err());
        assert!("45s:-3".parse::<RawStage>().is_err());

        assert!("n".parse::<QueryParam>().is_err());
        assert!("n=abc".parse::<QueryParam>().is_err());
    }

    #[test]
    fn test_threshold_flag_splits_metric_and_expression() {
        assert_eq!(
            parse_threshold_flag("rate_429<0.05").unwrap(),
            ("rate_429".to_string(), "<0.05".to_string())
        );
        assert_eq!(
            parse_threshold_flag("rate_timeout <= 0.2").unwrap(),
            ("rate_timeout".to_string(), "<= 0.2".to_string())
        );
        assert!(parse_threshold_flag("rate_429").is_err());
        assert!(parse_threshold_flag("<0.1").is_err());
    }
}
