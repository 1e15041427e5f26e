//! Virtual worker - one simulated client running request cycles in a loop
//!
//! A worker alternates between Idle and Requesting. Each cycle issues exactly
//! one probe, classifies it, folds it into the shared rates and then sleeps
//! for the think time. Failures are recorded, never retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::driver::{classify, Probe, ProbeOutcome};
use crate::metrics::collector::MetricsCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Requesting,
}

/// Everything a worker needs, shared by all workers of a run.
pub struct WorkerContext<P> {
    pub probe: Arc<P>,
    pub collector: MetricsCollector,
    pub think_time: Duration,
    /// No request is started at or after this instant.
    pub deadline: Instant,
}

impl<P> Clone for WorkerContext<P> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            collector: self.collector.clone(),
            think_time: self.think_time,
            deadline: self.deadline,
        }
    }
}

/// Perform one request cycle's request-and-record part.
pub async fn request_once<P: Probe>(ctx: &WorkerContext<P>) -> ProbeOutcome {
    let started = Instant::now();
    let outcome = ctx.probe.probe().await;
    let status = outcome.status();
    let class = classify(status);

    // Latency is meaningful only when the target answered.
    let latency = status.map(|_| started.elapsed());
    ctx.collector.record(class, latency);

    if class.is_failure() {
        tracing::error!("err status={} url={}", status.unwrap_or(0), ctx.probe.path());
        if let ProbeOutcome::Failed { reason } = &outcome {
            tracing::debug!(path = ctx.probe.path(), %reason, "request failed before a response");
        }
    }

    outcome
}

/// Run request cycles until the deadline passes or `stop` is cancelled.
///
/// A request already in flight when `stop` fires is allowed to complete and
/// is recorded; the think-time sleep is interrupted.
pub async fn run_worker<P: Probe>(id: u64, ctx: WorkerContext<P>, stop: CancellationToken) {
    ctx.collector.worker_started();
    tracing::debug!(worker = id, "worker started");

    let mut state = WorkerState::Idle;
    let mut cycles = 0u64;

    loop {
        debug_assert_eq!(state, WorkerState::Idle);
        if stop.is_cancelled() || Instant::now() >= ctx.deadline {
            break;
        }

        state = WorkerState::Requesting;
        tracing::trace!(worker = id, ?state);
        request_once(&ctx).await;
        cycles += 1;
        state = WorkerState::Idle;

        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(ctx.think_time) => {}
        }
    }

    tracing::debug!(worker = id, cycles, ?state, "worker stopped");
    ctx.collector.worker_stopped();
}
