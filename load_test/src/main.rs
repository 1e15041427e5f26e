use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use rampload::cli::Cli;
use rampload::config::WorkloadConfig;
use rampload::driver::HttpProbe;
use rampload::metrics::{reporter, summary};
use rampload::scenarios::{self, RunOptions};

/// Same code k6 uses when thresholds are crossed.
const THRESHOLDS_FAILED: u8 = 99;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if cli.output.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Validate everything before any request is sent
    let raw = cli.command.raw_config()?;
    let config = WorkloadConfig::from_raw(raw).context("invalid workload configuration")?;

    let probe = HttpProbe::new(&config.target).context("failed to build HTTP client")?;

    tracing::info!("rampload starting");
    tracing::info!("  Target: {}", probe.url());
    tracing::info!("  Load: {}", config.shape);
    tracing::info!("  Timeout: {:?}", config.target.timeout);
    tracing::info!("  Think Time: {:?}", config.think_time);
    if config.target.insecure_skip_tls_verify {
        tracing::warn!("  TLS certificate verification is disabled");
    }
    for rule in &config.thresholds {
        tracing::info!("  Threshold: {}", rule);
    }

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let options = RunOptions {
        report_interval: Some(cli.output.report_interval),
        live: cli.output.live,
        ..RunOptions::default()
    };
    let report = scenarios::run(&config, Arc::new(probe), options, shutdown).await;

    reporter::print_final_report(&report);

    if let Some(path) = &cli.output.summary_export {
        summary::write_summary(path, &report)?;
    }

    if report.passed() {
        tracing::info!("Load test complete");
        Ok(ExitCode::SUCCESS)
    } else {
        for failed in report.failed_thresholds() {
            tracing::error!(
                "threshold crossed: {} {} (observed {:.4})",
                failed.metric,
                failed.expression,
                failed.observed
            );
        }
        Ok(ExitCode::from(THRESHOLDS_FAILED))
    }
}
