//! Console reporter for metrics with real-time updates

use std::io::{self, Write};
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use super::collector::MetricsCollector;
use super::types::MetricName;
use crate::scenarios::RunReport;

/// Report every `every` until `stop` fires.
///
/// With `live` the terminal is redrawn in place; otherwise one progress line
/// is logged per interval.
pub async fn start_periodic_reporter(
    collector: MetricsCollector,
    every: Duration,
    live: bool,
    stop: CancellationToken,
) {
    let mut ticker = interval(every);
    // The first tick is immediate and would report an empty run.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        collector.update_system_metrics();

        if live {
            print_live_metrics(&collector);
        } else {
            log_progress(&collector);
        }
    }
}

fn log_progress(collector: &MetricsCollector) {
    let metrics = collector.get_snapshot();
    let rates = metrics.rates;
    tracing::info!(
        elapsed = %humantime::format_duration(round_secs(collector.elapsed())),
        workers = metrics.workers.active,
        requests = rates.total,
        rate_429 = %format!("{:.3}", rates.rate(MetricName::Rate429)),
        rate_5xx = %format!("{:.3}", rates.rate(MetricName::Rate5xx)),
        rate_timeout = %format!("{:.3}", rates.rate(MetricName::RateTimeout)),
        "progress"
    );
}

fn round_secs(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs())
}

/// Print live metrics (clears screen and updates in place)
pub fn print_live_metrics(collector: &MetricsCollector) {
    // Clear screen and move cursor to top
    print!("\x1B[2J\x1B[1;1H");

    let metrics = collector.get_snapshot();
    let elapsed = collector.elapsed().as_secs();
    let latency = collector.get_latency_percentiles();
    let rates = metrics.rates;

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║                  rampload - Live Metrics                       ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    println!(
        "\n⏱️  Elapsed Time: {:02}:{:02}:{:02}",
        elapsed / 3600,
        (elapsed % 3600) / 60,
        elapsed % 60
    );

    println!("\n┌─ REQUESTS ──────────────────────────────────────────────────┐");
    println!(
        "│  Sent:         {:>8}    Workers:    {:>8}              │",
        rates.total, metrics.workers.active
    );
    let throughput = if elapsed > 0 {
        rates.total as f64 / elapsed as f64
    } else {
        0.0
    };
    println!(
        "│  Throughput: {:>8.2}/sec  Peak:       {:>8}              │",
        throughput, metrics.workers.peak
    );
    println!("└─────────────────────────────────────────────────────────────┘");

    println!("\n┌─ RATES ─────────────────────────────────────────────────────┐");
    for metric in MetricName::ALL {
        println!(
            "│  {:<13} {:>8.4}    ({:>8} requests)                │",
            metric.as_str(),
            rates.rate(metric),
            rates.count(metric)
        );
    }
    println!("└─────────────────────────────────────────────────────────────┘");

    if latency.count > 0 {
        println!("\n┌─ LATENCY (ms) ──────────────────────────────────────────────┐");
        println!(
            "│  Min: {:>6}  P50: {:>6}  P95: {:>6}  P99: {:>6}  Max: {:>6}│",
            latency.min, latency.p50, latency.p95, latency.p99, latency.max
        );
        println!(
            "│  Mean: {:>8.2} ms    Count: {:>10}                    │",
            latency.mean, latency.count
        );
        println!("└─────────────────────────────────────────────────────────────┘");
    }

    println!("\n┌─ LOAD GENERATOR ────────────────────────────────────────────┐");
    println!(
        "│  CPU Usage:    {:>6.1}%    Memory: {:>6} / {:>6} MB       │",
        metrics.system.cpu_usage, metrics.system.memory_used_mb, metrics.system.memory_total_mb
    );
    println!("└─────────────────────────────────────────────────────────────┘");

    println!("\n  [Press Ctrl+C to stop test]");

    let _ = io::stdout().flush();
}

/// Print final summary report
pub fn print_final_report(report: &RunReport) {
    let mut out = io::stdout().lock();
    let _ = write_final_report(&mut out, report);
    let _ = out.flush();
}

pub fn write_final_report(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    let rates = &report.rates;
    let latency = &report.latency;
    let elapsed = report.elapsed.as_secs_f64();

    writeln!(out, "\n╔════════════════════════════════════════════════════════════════╗")?;
    writeln!(out, "║                    FINAL TEST REPORT                           ║")?;
    writeln!(out, "╚════════════════════════════════════════════════════════════════╝")?;

    if report.interrupted {
        writeln!(out, "\n⚠️  Run was interrupted before the end of its schedule")?;
    }

    writeln!(out, "\n📊 REQUESTS")?;
    writeln!(out, "   Total Sent:           {:>10}", rates.total)?;
    writeln!(out, "   Peak Workers:         {:>10}", report.peak_workers)?;
    if elapsed > 0.0 {
        writeln!(
            out,
            "   Throughput:           {:>10.2} requests/sec",
            rates.total as f64 / elapsed
        )?;
    }

    writeln!(out, "\n🚦 RATES")?;
    for metric in MetricName::ALL {
        writeln!(
            out,
            "   {:<22}{:>10.4}  ({} of {})",
            format!("{}:", metric),
            rates.rate(metric),
            rates.count(metric),
            rates.total
        )?;
    }

    if latency.count > 0 {
        writeln!(out, "\n📈 LATENCY")?;
        writeln!(out, "   Min:                  {:>10} ms", latency.min)?;
        writeln!(out, "   P50 (Median):         {:>10} ms", latency.p50)?;
        writeln!(out, "   P95:                  {:>10} ms", latency.p95)?;
        writeln!(out, "   P99:                  {:>10} ms", latency.p99)?;
        writeln!(out, "   Max:                  {:>10} ms", latency.max)?;
        writeln!(out, "   Mean:                 {:>10.2} ms", latency.mean)?;
    }

    if !report.thresholds.is_empty() {
        writeln!(out, "\n🎯 THRESHOLDS")?;
        for outcome in &report.thresholds {
            writeln!(
                out,
                "   {} {:<13} {:<12} observed {:.4}",
                if outcome.passed { "✓" } else { "✗" },
                outcome.metric.as_str(),
                outcome.expression,
                outcome.observed
            )?;
        }
    }

    writeln!(out, "\n⏱️  Test Duration: {:.2} seconds", elapsed)?;
    writeln!(out, "════════════════════════════════════════════════════════════════\n")?;
    Ok(())
}
