// Scenarios module
// Drives workers over the configured load shape

pub mod ramping;

pub use ramping::{run, RunOptions, RunReport};
