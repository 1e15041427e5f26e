//! Ramping HTTP load generator.
//!
//! Workers follow a constant or staged load shape, issue one GET per cycle,
//! and fold every outcome into three rates (`rate_429`, `rate_5xx`,
//! `rate_timeout`) that are checked against threshold rules after the run.

pub mod cli;
pub mod config;
pub mod driver;
pub mod metrics;
pub mod scenarios;
pub mod schedule;
pub mod thresholds;
pub mod worker;
