mod args;

pub use args::{Cli, Command, FixedArgs, OutputArgs, PresetArgs, RampArgs, RunArgs, TargetArgs};
