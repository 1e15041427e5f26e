use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::duration::SignedDuration;
use crate::config::presets;
use crate::config::workload::{parse_threshold_flag, ThresholdExprs};
use crate::config::{QueryParam, RawConfig, RawStage};

/// Ramping HTTP load generator
#[derive(Parser, Debug)]
#[command(name = "rampload")]
#[command(about = "Drive HTTP load against a target and record throttling and failure rates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fixed number of workers for a fixed duration
    Fixed(FixedArgs),

    /// Linear ramps between stage targets
    Ramp(RampArgs),

    /// Run a YAML or JSON scenario file
    Run(RunArgs),

    /// Run a built-in scenario: ping, dos
    Preset(PresetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Progress report interval (0 disables)
    #[arg(long, global = true, default_value = "5s", value_parser = humantime::parse_duration)]
    pub report_interval: Duration,

    /// Redraw the progress report in place
    #[arg(long, global = true)]
    pub live: bool,

    /// Write a JSON summary of the run to this file
    #[arg(long, global = true)]
    pub summary_export: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Base URL of the target
    #[arg(long, env = "RAMPLOAD_BASE_URL")]
    pub base_url: Option<String>,

    /// Request path
    #[arg(long)]
    pub path: Option<String>,

    /// Integer query parameter, e.g. n=400000
    #[arg(long)]
    pub query: Option<String>,

    /// Per-request timeout, e.g. 20s
    #[arg(long, allow_hyphen_values = true)]
    pub timeout: Option<String>,

    /// Pause between iterations of a worker, e.g. 100ms
    #[arg(long, allow_hyphen_values = true)]
    pub think_time: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Threshold rule, e.g. rate_429<0.05 (repeatable)
    #[arg(long = "threshold")]
    pub thresholds: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct FixedArgs {
    /// Number of concurrent workers
    #[arg(long)]
    pub concurrency: u64,

    /// Run length, e.g. 30s
    #[arg(long, allow_hyphen_values = true)]
    pub duration: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RampArgs {
    /// Stage as <duration>:<target>, e.g. 45s:80 (repeatable, in order)
    #[arg(long = "stage", allow_hyphen_values = true)]
    pub stages: Vec<String>,

    /// Worker count at the start of the first stage
    #[arg(long, default_value = "0")]
    pub start_concurrency: u64,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Scenario file (.yaml, .yml or .json)
    #[arg(long, short)]
    pub config: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PresetArgs {
    /// Preset name
    #[arg(value_parser = presets::PRESET_NAMES)]
    pub name: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

impl TargetArgs {
    /// Apply the flags that were given on top of `raw`.
    pub fn apply(&self, raw: &mut RawConfig) -> anyhow::Result<()> {
        if let Some(base_url) = &self.base_url {
            raw.base_url = Some(base_url.clone());
        }
        if let Some(path) = &self.path {
            raw.path = Some(path.clone());
        }
        if let Some(query) = &self.query {
            raw.query_param = Some(query.parse::<QueryParam>()?);
        }
        if let Some(timeout) = &self.timeout {
            raw.timeout = Some(parse_duration_flag("timeout", timeout)?);
        }
        if let Some(think_time) = &self.think_time {
            raw.think_time = Some(parse_duration_flag("think-time", think_time)?);
        }
        if self.insecure {
            raw.insecure_skip_tls_verify = Some(true);
        }

        // Flags replace any file/preset rules for the same metric.
        let mut flagged: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for flag in &self.thresholds {
            let (metric, expr) = parse_threshold_flag(flag).map_err(anyhow::Error::msg)?;
            flagged.entry(metric).or_default().push(expr);
        }
        for (metric, exprs) in flagged {
            raw.thresholds.insert(metric, ThresholdExprs::Many(exprs));
        }
        Ok(())
    }
}

fn parse_duration_flag(name: &str, value: &str) -> anyhow::Result<SignedDuration> {
    value
        .parse()
        .map_err(|e: String| anyhow::anyhow!("--{}: {}", name, e))
}

impl Command {
    /// Build the unvalidated configuration this command describes.
    pub fn raw_config(&self) -> anyhow::Result<RawConfig> {
        let (mut raw, target) = match self {
            Command::Fixed(args) => (
                RawConfig {
                    concurrency: Some(args.concurrency),
                    duration: Some(parse_duration_flag("duration", &args.duration)?),
                    ..RawConfig::default()
                },
                &args.target,
            ),
            Command::Ramp(args) => {
                let stages = args
                    .stages
                    .iter()
                    .map(|s| s.parse::<RawStage>())
                    .collect::<Result<Vec<_>, _>>()?;
                (
                    RawConfig {
                        start_concurrency: Some(args.start_concurrency),
                        stages: Some(stages),
                        ..RawConfig::default()
                    },
                    &args.target,
                )
            }
            Command::Run(args) => (RawConfig::from_path(&args.config)?, &args.target),
            Command::Preset(args) => {
                let raw = presets::get_preset(&args.name)
                    .ok_or_else(|| anyhow::anyhow!("unknown preset '{}'", args.name))?;
                (raw, &args.target)
            }
        };
        target.apply(&mut raw)?;
        Ok(raw)
    }
}
