//! Integration tests for configuration files
//!
//! Configurations written to disk must load back unchanged in both formats,
//! and invalid files must be rejected before a publisher is built.

mod common;

use common::builders::ConfigBuilder;
use common::mock_helpers::create_test_scheduler;
use svpub_rs::config::PublisherConfig;
use svpub_rs::error::SvPubError;
use svpub_rs::types::ValueMode;
use tempfile::TempDir;

fn sample_config() -> PublisherConfig {
    let mut config = ConfigBuilder::new("eth2")
        .channel("bay1", &[ValueMode::Sine, ValueMode::Sine, ValueMode::Sine])
        .channel("bay2", &[ValueMode::Timestamp, ValueMode::Manual])
        .hertz(60)
        .sample_rate(256)
        .amplitude(325.0)
        .displacement(1.5)
        .build();
    config.stream.app_id = 0x4001;
    config.stream.vlan_tagged = false;
    config
}

#[test]
fn test_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("svpub.toml");
    let config = sample_config();

    config.save(&path).unwrap();
    let loaded = PublisherConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("svpub.json");
    let config = sample_config();

    config.save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.trim_start().starts_with('{'));

    let loaded = PublisherConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_loaded_config_builds_scheduler() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("svpub.toml");
    std::fs::write(
        &path,
        r#"
interface = "lo"

[signal]
hertz = 50
sample_rate = 80

[[channels]]
name = "svpub1"
values = ["sine", "timestamp", "manual"]
"#,
    )
    .unwrap();

    let config = PublisherConfig::load(&path).unwrap();
    let (scheduler, _binder, _clock) = create_test_scheduler(&config);
    let layout = scheduler.publisher().layout();
    assert_eq!(layout.len(), 1);
    assert_eq!(
        layout[0].modes,
        vec![ValueMode::Sine, ValueMode::Timestamp, ValueMode::Manual]
    );
}

#[test]
fn test_out_of_range_signal_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("svpub.toml");
    std::fs::write(&path, "[signal]\nhertz = 0\n").unwrap();

    match PublisherConfig::load(&path) {
        Err(SvPubError::WithContext { context, source }) => {
            assert!(context.contains("svpub.toml"));
            assert!(matches!(*source, SvPubError::InvalidParameter(_)));
        }
        other => panic!("expected invalid parameter, got {:?}", other.err()),
    }
}

#[test]
fn test_unknown_mode_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("svpub.json");
    std::fs::write(
        &path,
        r#"{ "channels": [ { "name": "x", "values": ["square"] } ] }"#,
    )
    .unwrap();

    assert!(matches!(
        PublisherConfig::load(&path),
        Err(SvPubError::Config(_))
    ));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let result = PublisherConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(SvPubError::Config(_))));
}
