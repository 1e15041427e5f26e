pub mod duration;
pub mod presets;
pub mod workload;

pub use workload::{
    ConfigError, LoadShape, QueryParam, RawConfig, RawStage, Stage, TargetConfig, WorkloadConfig,
};
