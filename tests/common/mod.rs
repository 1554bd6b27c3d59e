//! Shared helpers for the integration tests

#![allow(dead_code)] // each test binary uses a subset

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;
use svpub_rs::types::{Sample, Snapshot};

/// How long to wait for the scheduler thread to react
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Float content of one value in a broadcast snapshot
pub fn float_at(snapshot: &Snapshot, channel: usize, value: usize) -> f64 {
    match snapshot.channels[channel].samples[value] {
        Sample::Float(v) => v as f64,
        other => panic!("expected a float sample, got {:?}", other),
    }
}

/// Assert a generated sample is within `epsilon` of the reference value
pub fn assert_near(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "sample {} differs from reference {} by more than {}",
        actual,
        expected,
        epsilon
    );
}
