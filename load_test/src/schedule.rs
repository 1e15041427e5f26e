//! Ramp schedule: how many workers should be live at a given point of the run.
//!
//! Pure functions of the load shape and elapsed time, so the controller and
//! the tests share one definition.

use std::time::Duration;

use crate::config::LoadShape;

/// Target concurrency at `elapsed`, linearly interpolated within the
/// enclosing stage.
pub fn concurrency_at(shape: &LoadShape, elapsed: Duration) -> f64 {
    match shape {
        LoadShape::Constant { concurrency, .. } => *concurrency as f64,
        LoadShape::Ramping {
            start_concurrency,
            stages,
        } => {
            let mut from = *start_concurrency as f64;
            let mut stage_start = Duration::ZERO;

            for stage in stages {
                let stage_end = stage_start.saturating_add(stage.duration);
                let to = stage.target as f64;
                if elapsed < stage_end {
                    // Zero-length stages never reach this branch.
                    let progress = (elapsed.saturating_sub(stage_start)).as_secs_f64()
                        / stage.duration.as_secs_f64();
                    return from + (to - from) * progress;
                }
                from = to;
                stage_start = stage_end;
            }

            from
        }
    }
}

/// Whole number of workers to keep running at `elapsed`.
pub fn workers_at(shape: &LoadShape, elapsed: Duration) -> u64 {
    concurrency_at(shape, elapsed).round() as u64
}
