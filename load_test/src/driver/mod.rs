pub mod classify;
pub mod probe;

pub use classify::classify;
pub use probe::{HttpProbe, Probe, ProbeOutcome};
