//! Integration tests for sample generation
//!
//! These tests step a scheduler tick by tick with a manual clock and check
//! what reaches the transport:
//! - Sine phase and cadence changes
//! - Timestamp deltas across the one-second wrap
//! - Mixed value modes in channel order

mod common;

use common::builders::ConfigBuilder;
use common::mock_helpers::create_test_scheduler;
use common::{assert_near, float_at};
use proptest::prelude::*;
use std::f64::consts::TAU;
use svpub_rs::config::SineOverride;
use svpub_rs::types::{Sample, ValueMode};

#[test]
fn test_kth_sample_follows_reference_sine() {
    let config = ConfigBuilder::new("lo")
        .channel("svpub1", &[ValueMode::Sine])
        .hertz(50)
        .sample_rate(80)
        .amplitude(1.0)
        .displacement(0.0)
        .build();
    let (mut scheduler, binder, _clock) = create_test_scheduler(&config);
    scheduler.complete_setup().unwrap();
    scheduler.start().unwrap();

    for _ in 0..400 {
        scheduler.tick().unwrap();
    }

    let snapshots = binder.capture().snapshots();
    assert_eq!(snapshots.len(), 400);
    for (k, snapshot) in snapshots.iter().enumerate() {
        assert_near(float_at(snapshot, 0, 0), (TAU * k as f64 / 80.0).sin(), 1e-5);
    }
}

#[test]
fn test_sample_count_increments_per_broadcast() {
    let config = ConfigBuilder::new("lo").channel("svpub1", &[]).build();
    let (mut scheduler, binder, _clock) = create_test_scheduler(&config);
    scheduler.complete_setup().unwrap();
    scheduler.start().unwrap();
    for _ in 0..5 {
        scheduler.tick().unwrap();
    }

    let counts: Vec<u16> = binder
        .capture()
        .snapshots()
        .iter()
        .map(|s| s.sample_count)
        .collect();
    assert_eq!(counts, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_sample_rate_change_restarts_at_displacement() {
    let config = ConfigBuilder::new("lo")
        .channel("svpub1", &[ValueMode::Sine])
        .amplitude(50.0)
        .displacement(-3.0)
        .build();
    let (mut scheduler, binder, _clock) = create_test_scheduler(&config);
    scheduler.complete_setup().unwrap();
    scheduler.start().unwrap();
    for _ in 0..13 {
        scheduler.tick().unwrap();
    }

    scheduler.set_sample_rate(256).unwrap();
    scheduler.tick().unwrap();
    let last = binder.capture().last().unwrap();
    assert_near(float_at(&last, 0, 0), -3.0, 1e-6);

    scheduler.tick().unwrap();
    let last = binder.capture().last().unwrap();
    assert_near(
        float_at(&last, 0, 0),
        50.0 * (TAU / 256.0).sin() - 3.0,
        1e-4,
    );
}

#[test]
fn test_timestamp_wraps_at_one_second() {
    let config = ConfigBuilder::new("lo")
        .channel("svpub1", &[ValueMode::Timestamp])
        .build();
    let (mut scheduler, binder, clock) = create_test_scheduler(&config);
    scheduler.complete_setup().unwrap();

    clock.set(900_000_000);
    scheduler.start().unwrap();
    clock.set(50_000_000);
    scheduler.tick().unwrap();

    let last = binder.capture().last().unwrap();
    assert_eq!(last.channels[0].samples[0], Sample::Timestamp(150_000_000));
}

#[test]
fn test_first_delta_ignores_idle_time() {
    let config = ConfigBuilder::new("lo")
        .channel("svpub1", &[ValueMode::Timestamp])
        .build();
    let (mut scheduler, binder, clock) = create_test_scheduler(&config);

    // Configured but idle for a while, then stopped and started again
    scheduler.complete_setup().unwrap();
    clock.set(10_000);
    scheduler.start().unwrap();
    scheduler.tick().unwrap();
    scheduler.stop();
    clock.advance(600_000_000);

    scheduler.complete_setup().unwrap();
    scheduler.start().unwrap();
    clock.advance(250_000);
    scheduler.tick().unwrap();

    let last = binder.capture().last().unwrap();
    assert_eq!(last.channels[0].samples[0], Sample::Timestamp(250_000));
}

#[test]
fn test_mixed_modes_in_channel_order() {
    let config = ConfigBuilder::new("lo")
        .channel("a", &[ValueMode::Manual, ValueMode::Sine])
        .channel("b", &[ValueMode::Timestamp])
        .displacement(7.0)
        .build();
    let (mut scheduler, binder, clock) = create_test_scheduler(&config);
    scheduler.complete_setup().unwrap();
    scheduler.set_value(0, 0, Sample::Float(-1.5)).unwrap();
    scheduler
        .set_sine_override(
            0,
            1,
            Some(SineOverride {
                amplitude: Some(2.0),
                displacement_y: None,
            }),
        )
        .unwrap();

    clock.set(1_000);
    scheduler.start().unwrap();
    clock.set(3_000);
    scheduler.tick().unwrap();

    let last = binder.capture().last().unwrap();
    let names: Vec<&str> = last.channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(last.channels[0].samples[0], Sample::Float(-1.5));
    assert_near(float_at(&last, 0, 1), 7.0, 1e-6);
    assert_eq!(last.channels[1].samples[0], Sample::Timestamp(2_000));
}

#[test]
fn test_mode_change_applies_next_tick() {
    let config = ConfigBuilder::new("lo")
        .channel("svpub1", &[ValueMode::Manual])
        .build();
    let (mut scheduler, binder, clock) = create_test_scheduler(&config);
    scheduler.complete_setup().unwrap();
    scheduler.start().unwrap();
    scheduler.tick().unwrap();
    assert_eq!(
        binder.capture().last().unwrap().channels[0].samples[0],
        Sample::Float(0.0)
    );

    scheduler
        .set_value_mode(0, 0, ValueMode::Timestamp)
        .unwrap();
    clock.advance(500);
    scheduler.tick().unwrap();
    assert_eq!(
        binder.capture().last().unwrap().channels[0].samples[0],
        Sample::Timestamp(500)
    );
}

proptest! {
    #[test]
    fn test_sine_stays_within_envelope(
        amplitude in 0.0f32..1000.0,
        displacement in -1000.0f32..1000.0,
        hertz in 1u32..1000,
        sample_rate in 1u32..512,
        ticks in 1usize..64,
    ) {
        let config = ConfigBuilder::new("lo")
            .channel("svpub1", &[ValueMode::Sine])
            .hertz(hertz)
            .sample_rate(sample_rate)
            .amplitude(amplitude)
            .displacement(displacement)
            .build();
        let (mut scheduler, binder, _clock) = create_test_scheduler(&config);
        scheduler.complete_setup().unwrap();
        scheduler.start().unwrap();
        for _ in 0..ticks {
            scheduler.tick().unwrap();
        }

        let tolerance = 1e-3 * (1.0 + amplitude as f64 + displacement.abs() as f64);
        for snapshot in binder.capture().snapshots() {
            let v = float_at(&snapshot, 0, 0);
            prop_assert!(v <= displacement as f64 + amplitude as f64 + tolerance);
            prop_assert!(v >= displacement as f64 - amplitude as f64 - tolerance);
        }
    }
}
