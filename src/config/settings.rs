//! Signal-generation tunables
//!
//! These settings drive every SINE value and the tick cadence. They are
//! shared by all values (one amplitude, one frequency, one offset), with an
//! optional per-value [`SineOverride`] for amplitude and offset.
//!
//! # Cadence
//!
//! The scheduler runs `hertz` cycles per second, each split into
//! `sample_rate` evenly spaced sub-samples, so one broadcast happens every
//! `1 / (hertz * sample_rate)` seconds. The default (50 Hz, 80 samples per
//! period) gives 4000 broadcasts per second.

use crate::error::{Result, SvPubError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default sub-samples per period
pub const DEFAULT_SAMPLE_RATE: u32 = 80;

/// Default signal frequency in Hz
pub const DEFAULT_HERTZ: u32 = 50;

/// Accepted range for `sample_rate`
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 1..=100_000;

/// Accepted range for `hertz`
pub const HERTZ_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

/// Accepted range for `amplitude`
pub const AMPLITUDE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=100_000.0;

/// Accepted range for `displacement_y`
pub const DISPLACEMENT_RANGE: std::ops::RangeInclusive<f32> = -1_000.0..=1_000.0;

/// Shared signal tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    /// Sub-samples per period
    pub sample_rate: u32,
    /// Signal frequency in Hz
    pub hertz: u32,
    /// Peak amplitude of SINE values
    pub amplitude: f32,
    /// Vertical offset of the sine mid-point
    pub displacement_y: f32,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            hertz: DEFAULT_HERTZ,
            amplitude: 1.0,
            displacement_y: 0.0,
        }
    }
}

impl SignalSettings {
    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<()> {
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            return Err(SvPubError::InvalidParameter(format!(
                "sample_rate {} outside {:?}",
                self.sample_rate, SAMPLE_RATE_RANGE
            )));
        }
        if !HERTZ_RANGE.contains(&self.hertz) {
            return Err(SvPubError::InvalidParameter(format!(
                "hertz {} outside {:?}",
                self.hertz, HERTZ_RANGE
            )));
        }
        if !AMPLITUDE_RANGE.contains(&self.amplitude) {
            return Err(SvPubError::InvalidParameter(format!(
                "amplitude {} outside {:?}",
                self.amplitude, AMPLITUDE_RANGE
            )));
        }
        if !DISPLACEMENT_RANGE.contains(&self.displacement_y) {
            return Err(SvPubError::InvalidParameter(format!(
                "displacement_y {} outside {:?}",
                self.displacement_y, DISPLACEMENT_RANGE
            )));
        }
        Ok(())
    }

    /// Broadcasts per second
    pub fn ticks_per_second(&self) -> u64 {
        self.hertz.max(1) as u64 * self.sample_rate.max(1) as u64
    }

    /// Time between broadcasts
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.ticks_per_second())
    }

    /// Whether switching from `self` to `other` restarts the sine phase
    pub fn cadence_differs(&self, other: &SignalSettings) -> bool {
        self.hertz != other.hertz || self.sample_rate != other.sample_rate
    }
}

/// Per-value replacement for the shared amplitude and offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SineOverride {
    pub amplitude: Option<f32>,
    pub displacement_y: Option<f32>,
}

impl SineOverride {
    /// Resolve against the shared settings
    pub fn resolve(&self, shared: &SignalSettings) -> (f32, f32) {
        (
            self.amplitude.unwrap_or(shared.amplitude),
            self.displacement_y.unwrap_or(shared.displacement_y),
        )
    }
}

/// Overrides keyed by `(channel index, value index)`
pub type SineOverrides = HashMap<(usize, usize), SineOverride>;
