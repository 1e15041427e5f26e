use std::collections::BTreeMap;
use std::time::Duration;

use super::duration::SignedDuration;
use super::workload::{QueryParam, RawConfig, RawStage, ThresholdExprs};

pub const PRESET_NAMES: [&str; 2] = ["ping", "dos"];

/// Get a preset scenario by name
pub fn get_preset(name: &str) -> Option<RawConfig> {
    match name {
        "ping" => Some(ping_preset()),
        "dos" => Some(dos_preset()),
        _ => None,
    }
}

fn secs(s: u64) -> SignedDuration {
    Duration::from_secs(s).into()
}

/// Connectivity baseline
///
/// Steady, unthrottled traffic against the health endpoint:
/// - 50 workers for 30s
/// - GET /ping
/// - TLS verification disabled
/// - No thresholds
pub fn ping_preset() -> RawConfig {
    RawConfig {
        path: Some("/ping".to_string()),
        insecure_skip_tls_verify: Some(true),
        concurrency: Some(50),
        duration: Some(secs(30)),
        ..RawConfig::default()
    }
}

/// Rate-limit probe against the CPU-bound endpoint
///
/// Ramps past the ingress limit and expects mitigation to hold:
/// - 0 -> 10 workers over 15s, -> 80 over 45s, -> 0 over 15s
/// - GET /work?n=400000, 20s timeout, 100ms think time
/// - TLS verification disabled
/// - rate_429 < 0.05, rate_5xx < 0.10, rate_timeout < 0.20
pub fn dos_preset() -> RawConfig {
    let thresholds = BTreeMap::from([
        ("rate_429".to_string(), ThresholdExprs::Many(vec!["rate<0.05".to_string()])),
        ("rate_5xx".to_string(), ThresholdExprs::Many(vec!["rate<0.10".to_string()])),
        ("rate_timeout".to_string(), ThresholdExprs::Many(vec!["rate<0.20".to_string()])),
    ]);

    RawConfig {
        path: Some("/work".to_string()),
        query_param: Some(QueryParam {
            name: "n".to_string(),
            value: 400_000,
        }),
        timeout: Some(secs(20)),
        insecure_skip_tls_verify: Some(true),
        think_time: Some(Duration::from_millis(100).into()),
        stages: Some(vec![
            RawStage { duration: secs(15), target: 10 },
            RawStage { duration: secs(45), target: 80 },
            RawStage { duration: secs(15), target: 0 },
        ]),
        thresholds,
        ..RawConfig::default()
    }
}
