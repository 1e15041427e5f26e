//! Ramping scenario - keep the live worker count on the ramp schedule
//!
//! Constant load is the degenerate case of a flat ramp, so both shapes run
//! through the same controller.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::workload::MAX_RUN_DURATION;
use crate::config::WorkloadConfig;
use crate::driver::Probe;
use crate::metrics::collector::{LatencyStats, MetricsCollector};
use crate::metrics::reporter;
use crate::metrics::types::RateSnapshot;
use crate::schedule::workers_at;
use crate::thresholds::{self, ThresholdOutcome};
use crate::worker::{run_worker, WorkerContext};

pub const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How often the controller re-reads the schedule. Raised to
    /// [`MIN_TICK`] when shorter.
    pub tick: Duration,
    /// Periodic console report; `None` disables it.
    pub report_interval: Option<Duration>,
    /// Redraw the report in place instead of logging it.
    pub live: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            report_interval: None,
            live: false,
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub rates: RateSnapshot,
    pub latency: LatencyStats,
    pub elapsed: Duration,
    pub peak_workers: usize,
    pub thresholds: Vec<ThresholdOutcome>,
    /// The run was stopped before its scheduled end.
    pub interrupted: bool,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        thresholds::all_passed(&self.thresholds)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

struct LiveWorker {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

/// Run `config` against `probe` until the schedule ends or `shutdown` fires.
pub async fn run<P: Probe>(
    config: &WorkloadConfig,
    probe: Arc<P>,
    options: RunOptions,
    shutdown: CancellationToken,
) -> RunReport {
    let collector = MetricsCollector::new();
    let total = config.shape.total_duration().min(MAX_RUN_DURATION);
    let start = Instant::now();
    let deadline = start + total;
    let run_token = shutdown.child_token();

    tracing::info!(
        "Starting run: {} ({} total)",
        config.shape,
        humantime::format_duration(total)
    );

    if let Some(every) = options.report_interval.filter(|d| !d.is_zero()) {
        let collector = collector.clone();
        let stop = run_token.clone();
        let live = options.live;
        tokio::spawn(async move {
            reporter::start_periodic_reporter(collector, every, live, stop).await;
        });
    }

    let ctx = WorkerContext {
        probe,
        collector: collector.clone(),
        think_time: config.think_time,
        deadline,
    };

    let mut live: Vec<LiveWorker> = Vec::new();
    let mut retired: Vec<JoinHandle<()>> = Vec::new();
    let mut next_id = 0u64;
    let mut last_target = None;
    let mut interrupted = false;

    let mut ticker = interval(options.tick.max(MIN_TICK));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let elapsed = start.elapsed();
        if elapsed >= total {
            break;
        }

        let target = workers_at(&config.shape, elapsed) as usize;
        if last_target != Some(target) {
            tracing::debug!(workers = target, live = live.len(), "worker target changed");
            last_target = Some(target);
        }

        while live.len() < target {
            let stop = run_token.child_token();
            let handle = tokio::spawn(run_worker(next_id, ctx.clone(), stop.clone()));
            live.push(LiveWorker { stop, handle });
            next_id += 1;
        }

        // Newest workers go first; each finishes its current cycle.
        while live.len() > target {
            if let Some(worker) = live.pop() {
                worker.stop.cancel();
                retired.push(worker.handle);
            }
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = sleep_until(deadline) => break,
            _ = shutdown.cancelled() => {
                tracing::warn!("Run interrupted, stopping workers");
                interrupted = true;
                break;
            }
        }
    }

    run_token.cancel();

    let handles = live.into_iter().map(|w| w.handle).chain(retired);
    for (idx, handle) in handles.enumerate() {
        if let Err(e) = handle.await {
            tracing::error!("Worker task {} panicked: {}", idx, e);
        }
    }

    let rates = collector.rates();
    let report = RunReport {
        rates,
        latency: collector.get_latency_percentiles(),
        elapsed: start.elapsed(),
        peak_workers: collector.get_snapshot().workers.peak,
        thresholds: thresholds::evaluate_all(&config.thresholds, &rates),
        interrupted,
    };

    tracing::info!(
        requests = report.rates.total,
        peak_workers = report.peak_workers,
        "Run complete"
    );

    report
}
