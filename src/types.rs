//! Core data types for the SV publisher
//!
//! This module contains the data model the publisher broadcasts: values,
//! the channels that group them, and the snapshot handed to the transport.
//!
//! # Main Types
//!
//! - [`ValueMode`] - Signal-generation strategy of a value (manual, sine, timestamp)
//! - [`Sample`] - The 32-bit payload carried by a value
//! - [`Value`] - A single slot within a channel
//! - [`Channel`] - A named, ordered group of values broadcast together
//! - [`Snapshot`] - Ordered copy of every channel's content for one broadcast
//! - [`PublishStats`] - Counters reported by the cycle scheduler
//!
//! # Ordering
//!
//! Values are only ever appended to or removed from the tail of a channel,
//! and channels only from the tail of the publisher. Indices therefore stay
//! valid for as long as the slot exists, which is what external display
//! bindings rely on.

use crate::config::MAX_VALUES_PER_CHANNEL;
use crate::error::{Result, SvPubError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal-generation strategy for a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    /// Content is supplied externally
    #[default]
    Manual,
    /// Content follows the shared sine generator
    Sine,
    /// Content is the nanosecond delta since the previous broadcast
    Timestamp,
}

impl ValueMode {
    /// Get all available modes
    pub fn all() -> &'static [ValueMode] {
        &[ValueMode::Manual, ValueMode::Sine, ValueMode::Timestamp]
    }
}

impl std::fmt::Display for ValueMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueMode::Manual => write!(f, "MANUAL"),
            ValueMode::Sine => write!(f, "SINE"),
            ValueMode::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

impl std::str::FromStr for ValueMode {
    type Err = SvPubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(ValueMode::Manual),
            "sine" => Ok(ValueMode::Sine),
            "timestamp" | "time" => Ok(ValueMode::Timestamp),
            other => {
                let known: Vec<String> = ValueMode::all().iter().map(|m| m.to_string()).collect();
                Err(SvPubError::InvalidParameter(format!(
                    "unknown value mode '{}' (expected one of {})",
                    other,
                    known.join(", ")
                )))
            }
        }
    }
}

/// 32-bit payload of a value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sample {
    /// Floating-point sample (manual and sine values)
    Float(f32),
    /// Unsigned delta since the previous broadcast (timestamp values)
    Timestamp(u32),
}

impl Sample {
    /// Raw big-endian bytes of the payload as they appear on the wire
    pub fn to_be_bytes(self) -> [u8; 4] {
        match self {
            Sample::Float(v) => v.to_be_bytes(),
            Sample::Timestamp(v) => v.to_be_bytes(),
        }
    }
}

impl Default for Sample {
    fn default() -> Self {
        Sample::Float(0.0)
    }
}

impl From<f32> for Sample {
    fn from(value: f32) -> Self {
        Sample::Float(value)
    }
}

impl From<u32> for Sample {
    fn from(value: u32) -> Self {
        Sample::Timestamp(value)
    }
}

/// A single numeric slot within a channel
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// How the content is produced each cycle
    pub mode: ValueMode,
    content: Sample,
}

impl Value {
    /// Create a value with zeroed content
    pub fn new(mode: ValueMode) -> Self {
        let content = match mode {
            ValueMode::Timestamp => Sample::Timestamp(0),
            ValueMode::Manual | ValueMode::Sine => Sample::Float(0.0),
        };
        Self { mode, content }
    }

    /// Overwrite the content unconditionally
    pub fn set(&mut self, content: impl Into<Sample>) {
        self.content = content.into();
    }

    /// Current content
    pub fn content(&self) -> Sample {
        self.content
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::new(ValueMode::Manual)
    }
}

/// A named, ordered group of values
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    name: String,
    values: Vec<Value>,
}

impl Channel {
    /// Create an empty channel
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::with_capacity(MAX_VALUES_PER_CHANNEL),
        }
    }

    /// Channel name (immutable after creation)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values in wire order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the channel has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append a value, returning its index
    pub fn create_value(&mut self, mode: ValueMode) -> Result<usize> {
        if self.values.len() >= MAX_VALUES_PER_CHANNEL {
            return Err(SvPubError::CapacityExceeded {
                what: "values per channel",
                max: MAX_VALUES_PER_CHANNEL,
            });
        }
        self.values.push(Value::new(mode));
        Ok(self.values.len() - 1)
    }

    /// Remove the tail value
    pub fn remove_last_value(&mut self) -> Result<Value> {
        self.values
            .pop()
            .ok_or_else(|| SvPubError::EmptyChannel(self.name.clone()))
    }

    /// Get a value by index
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Overwrite a value's content, returning what it held before
    pub fn set_value(&mut self, index: usize, content: impl Into<Sample>) -> Option<Sample> {
        let slot = self.values.get_mut(index)?;
        let previous = slot.content();
        slot.set(content);
        Some(previous)
    }

    /// Change a value's mode, returning the previous one
    pub fn set_mode(&mut self, index: usize, mode: ValueMode) -> Option<ValueMode> {
        let slot = self.values.get_mut(index)?;
        Some(std::mem::replace(&mut slot.mode, mode))
    }

    /// Iterate values mutably in wire order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.values.iter_mut()
    }

    /// Snapshot of the channel's current content
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            name: self.name.clone(),
            samples: self.values.iter().map(Value::content).collect(),
        }
    }
}

/// Content of one channel at broadcast time
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub name: String,
    pub samples: Vec<Sample>,
}

/// Ordered content of every channel for one broadcast
///
/// Channel order, then value order within each channel, is the only ordering
/// guarantee given to the transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Per-broadcast sample counter (wraps at `u16::MAX`)
    pub sample_count: u16,
    pub channels: Vec<ChannelSnapshot>,
}

impl Snapshot {
    /// Total number of values across all channels
    pub fn value_count(&self) -> usize {
        self.channels.iter().map(|c| c.samples.len()).sum()
    }
}

/// Lifecycle state of the publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublisherState {
    /// Network resources not acquired
    #[default]
    Unconfigured,
    /// Transport bound, not broadcasting
    Configured,
    /// Broadcasting every tick
    Running,
}

impl std::fmt::Display for PublisherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublisherState::Unconfigured => write!(f, "Unconfigured"),
            PublisherState::Configured => write!(f, "Configured"),
            PublisherState::Running => write!(f, "Running"),
        }
    }
}

/// Layout summary of one channel, reported to the configuration surface
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub name: String,
    pub modes: Vec<ValueMode>,
}

impl From<&Channel> for ChannelInfo {
    fn from(channel: &Channel) -> Self {
        Self {
            name: channel.name().to_string(),
            modes: channel.values().iter().map(|v| v.mode).collect(),
        }
    }
}

/// Statistics about the broadcast loop
#[derive(Debug, Clone, Default)]
pub struct PublishStats {
    /// Scheduler iterations since the stats were last cleared
    pub ticks: u64,
    /// Successful transport writes
    pub frames_sent: u64,
    /// Failed transport writes
    pub transmit_errors: u64,
    /// Ticks that finished after their deadline
    pub overruns: u64,
    /// Worst observed lateness in microseconds
    pub max_lateness_us: u64,
    /// Events dropped due to queue backpressure
    pub dropped_events: u64,
    /// Measured broadcast rate in Hz
    pub effective_rate_hz: f64,
    /// When broadcasting last started
    pub started_at: Option<DateTime<Utc>>,
}

impl PublishStats {
    /// Calculate the transmit success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.frames_sent + self.transmit_errors;
        if total == 0 {
            100.0
        } else {
            (self.frames_sent as f64 / total as f64) * 100.0
        }
    }
}
