//! Metrics collector - lock-free rate accumulators with latency tracking

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::time::Instant;

use super::types::{OutcomeClass, RateSnapshot, SystemMetrics, TestMetrics, WorkerMetrics};

/// Increment-only counters shared by every worker.
///
/// Each attempt bumps `total` and then at most one numerator. Updates commute,
/// so the snapshot taken after all workers have stopped is exact regardless of
/// interleaving.
///
/// Numerators are released after `total` and acquired before it is read, so a
/// live snapshot never shows a numerator above `total`.
#[derive(Debug, Default)]
struct RateCounters {
    total: AtomicU64,
    throttled: AtomicU64,
    server_errors: AtomicU64,
    network_failures: AtomicU64,
}

impl RateCounters {
    fn record(&self, outcome: OutcomeClass) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match outcome {
            OutcomeClass::Success => {}
            OutcomeClass::Throttled => {
                self.throttled.fetch_add(1, Ordering::Release);
            }
            OutcomeClass::ServerError => {
                self.server_errors.fetch_add(1, Ordering::Release);
            }
            OutcomeClass::NetworkFailure => {
                self.network_failures.fetch_add(1, Ordering::Release);
            }
        }
    }

    fn snapshot(&self) -> RateSnapshot {
        let throttled = self.throttled.load(Ordering::Acquire);
        let server_errors = self.server_errors.load(Ordering::Acquire);
        let network_failures = self.network_failures.load(Ordering::Acquire);
        RateSnapshot {
            total: self.total.load(Ordering::Relaxed),
            throttled,
            server_errors,
            network_failures,
        }
    }
}

#[derive(Clone)]
pub struct MetricsCollector {
    rates: Arc<RateCounters>,
    active_workers: Arc<AtomicUsize>,
    peak_workers: Arc<AtomicUsize>,
    latencies: Arc<RwLock<Histogram<u64>>>,
    system: Arc<RwLock<System>>,
    system_metrics: Arc<RwLock<SystemMetrics>>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        // 3 significant digits, auto-resizing
        let latencies = Histogram::new(3).expect("3 significant figures is a valid precision");

        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        Self {
            rates: Arc::new(RateCounters::default()),
            active_workers: Arc::new(AtomicUsize::new(0)),
            peak_workers: Arc::new(AtomicUsize::new(0)),
            latencies: Arc::new(RwLock::new(latencies)),
            system: Arc::new(RwLock::new(system)),
            system_metrics: Arc::new(RwLock::new(SystemMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Fold one attempt into the rates. `latency` is only given when the
    /// target answered.
    pub fn record(&self, outcome: OutcomeClass, latency: Option<Duration>) {
        self.rates.record(outcome);

        if let Some(latency) = latency {
            // Skip the sample rather than stall a worker on a contended lock.
            if let Some(mut hist) = self.latencies.try_write() {
                let _ = hist.record(latency.as_millis() as u64);
            }
        }
    }

    pub fn worker_started(&self) {
        let active = self.active_workers.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_workers.fetch_max(active, Ordering::Relaxed);
    }

    pub fn worker_stopped(&self) {
        let _ = self
            .active_workers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Update system metrics (CPU, memory) of the load generator itself
    pub fn update_system_metrics(&self) {
        let mut system = self.system.write();
        system.refresh_cpu_all();
        system.refresh_memory();

        let mut metrics = self.system_metrics.write();
        metrics.cpu_usage = system.global_cpu_usage();
        metrics.memory_used_mb = system.used_memory() / 1024 / 1024;
        metrics.memory_total_mb = system.total_memory() / 1024 / 1024;
    }

    pub fn rates(&self) -> RateSnapshot {
        self.rates.snapshot()
    }

    pub fn get_snapshot(&self) -> TestMetrics {
        TestMetrics {
            rates: self.rates.snapshot(),
            workers: WorkerMetrics {
                active: self.active_workers.load(Ordering::Relaxed),
                peak: self.peak_workers.load(Ordering::Relaxed),
            },
            system: self.system_metrics.read().clone(),
        }
    }

    pub fn get_latency_percentiles(&self) -> LatencyStats {
        let hist = self.latencies.read();
        LatencyStats {
            min: hist.min(),
            p50: hist.value_at_quantile(0.50),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            max: hist.max(),
            mean: hist.mean(),
            count: hist.len(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Response latency summary in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct LatencyStats {
    pub min: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
    pub mean: f64,
    pub count: u64,
}
