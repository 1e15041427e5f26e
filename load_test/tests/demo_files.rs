//! The scenario files shipped in `demos/` must stay valid and match the presets.

use std::path::PathBuf;

use rampload::config::presets;
use rampload::config::{RawConfig, WorkloadConfig};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("demos")
        .join(name)
}

#[test]
fn test_dos_demo_matches_preset() {
    let from_file = WorkloadConfig::from_raw(RawConfig::from_path(demo("dos.yaml")).unwrap()).unwrap();
    let preset = WorkloadConfig::from_raw(presets::dos_preset()).unwrap();
    assert_eq!(from_file, preset);
}

#[test]
fn test_ping_demo_matches_preset() {
    let from_file = WorkloadConfig::from_raw(RawConfig::from_path(demo("ping.json")).unwrap()).unwrap();
    let preset = WorkloadConfig::from_raw(presets::ping_preset()).unwrap();
    assert_eq!(from_file, preset);
}
