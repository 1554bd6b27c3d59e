//! Per-tick sample computation
//!
//! [`CycleScheduler`] owns the [`Publisher`] and everything a tick needs:
//! the signal tunables, per-value overrides, the clock and the loop
//! counter. One call to [`CycleScheduler::tick`] computes every SINE and
//! TIMESTAMP value, then broadcasts once.
//!
//! The scheduler does not sleep or listen for commands; the worker loop
//! wraps it with a [`Pacer`](super::signal::Pacer) and the command queue.
//! Tests drive it tick by tick with a [`ManualClock`](crate::clock::ManualClock).

use super::signal::{sine_sample, timestamp_delta};
use crate::clock::Clock;
use crate::config::{SignalSettings, SineOverride, SineOverrides};
use crate::error::{Result, SvPubError};
use crate::publisher::Publisher;
use crate::types::{Channel, PublishStats, Sample, ValueMode};
use std::time::Duration;

/// Computes sample content and broadcasts it once per tick
pub struct CycleScheduler {
    publisher: Publisher,
    settings: SignalSettings,
    /// Settings the sine phase was last reset under
    applied: SignalSettings,
    overrides: SineOverrides,
    clock: Box<dyn Clock>,
    loops: u64,
    stats: PublishStats,
}

impl std::fmt::Debug for CycleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleScheduler")
            .field("publisher", &self.publisher)
            .field("settings", &self.settings)
            .field("loops", &self.loops)
            .finish_non_exhaustive()
    }
}

impl CycleScheduler {
    /// Create a scheduler around a publisher
    pub fn new(publisher: Publisher, settings: SignalSettings, clock: Box<dyn Clock>) -> Self {
        Self {
            publisher,
            settings,
            applied: settings,
            overrides: SineOverrides::new(),
            clock,
            loops: 0,
            stats: PublishStats::default(),
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn settings(&self) -> &SignalSettings {
        &self.settings
    }

    /// Ticks since the sine phase was last reset
    pub fn loops(&self) -> u64 {
        self.loops
    }

    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut PublishStats {
        &mut self.stats
    }

    /// Time between ticks under the current settings
    pub fn period(&self) -> Duration {
        self.settings.tick_period()
    }

    // ==================== Layout ====================
    //
    // Removals drop the overrides of the removed slots, so a value created
    // later at the same index starts from the shared settings.

    pub fn add_channel(&mut self, name: impl Into<String>) -> Result<usize> {
        self.publisher.add_channel(name)
    }

    pub fn remove_channel(&mut self) -> Result<Channel> {
        let channel = self.publisher.remove_channel()?;
        self.prune_overrides();
        Ok(channel)
    }

    pub fn create_value(&mut self, channel: usize, mode: ValueMode) -> Result<usize> {
        self.publisher.create_value(channel, mode)
    }

    pub fn remove_last_value(&mut self, channel: usize) -> Result<()> {
        self.publisher.remove_last_value(channel)?;
        self.prune_overrides();
        Ok(())
    }

    pub fn set_value_mode(&mut self, channel: usize, value: usize, mode: ValueMode) -> Result<()> {
        self.publisher.set_value_mode(channel, value, mode)
    }

    /// Overwrite a value's content (requires setup)
    pub fn set_value(&mut self, channel: usize, value: usize, content: Sample) -> Result<()> {
        self.publisher.set_value(channel, value, content)
    }

    // ==================== Tunables ====================

    /// Replace all signal tunables
    ///
    /// A changed `hertz` or `sample_rate` restarts the sine phase on the next
    /// tick.
    pub fn set_settings(&mut self, settings: SignalSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        self.set_settings(SignalSettings {
            sample_rate,
            ..self.settings
        })
    }

    pub fn set_hertz(&mut self, hertz: u32) -> Result<()> {
        self.set_settings(SignalSettings {
            hertz,
            ..self.settings
        })
    }

    pub fn set_amplitude(&mut self, amplitude: f32) -> Result<()> {
        self.set_settings(SignalSettings {
            amplitude,
            ..self.settings
        })
    }

    pub fn set_displacement(&mut self, displacement_y: f32) -> Result<()> {
        self.set_settings(SignalSettings {
            displacement_y,
            ..self.settings
        })
    }

    /// Set or clear the amplitude/offset override of one value
    pub fn set_sine_override(
        &mut self,
        channel: usize,
        value: usize,
        sine_override: Option<SineOverride>,
    ) -> Result<()> {
        self.publisher
            .channel(channel)
            .ok_or(SvPubError::NoSuchChannel(channel))?
            .value(value)
            .ok_or(SvPubError::NoSuchValue { channel, value })?;

        match sine_override {
            Some(o) => {
                let candidate = SignalSettings {
                    amplitude: o.amplitude.unwrap_or(self.settings.amplitude),
                    displacement_y: o.displacement_y.unwrap_or(self.settings.displacement_y),
                    ..self.settings
                };
                candidate.validate()?;
                self.overrides.insert((channel, value), o);
            }
            None => {
                self.overrides.remove(&(channel, value));
            }
        }
        Ok(())
    }

    pub fn sine_override(&self, channel: usize, value: usize) -> Option<&SineOverride> {
        self.overrides.get(&(channel, value))
    }

    // ==================== Lifecycle ====================

    pub fn complete_setup(&mut self) -> Result<()> {
        self.publisher.complete_setup()
    }

    /// Start broadcasting from a fresh sine phase and timing baseline
    pub fn start(&mut self) -> Result<()> {
        let now = self.clock.now_ns();
        self.publisher.start(now)?;
        self.loops = 0;
        self.applied = self.settings;
        self.stats.started_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn stop(&mut self) {
        self.publisher.stop();
    }

    /// Switch the publisher to another interface
    pub fn select_interface(&mut self, interface: &str) {
        self.publisher.rebind(interface);
    }

    /// Drop overrides that no longer point at an existing value
    fn prune_overrides(&mut self) {
        let publisher = &self.publisher;
        self.overrides.retain(|&(channel, value), _| {
            publisher
                .channel(channel)
                .is_some_and(|c| value < c.len())
        });
    }

    // ==================== Tick ====================

    /// Run one cycle: compute sample content, then broadcast
    ///
    /// The returned error is the transport's. The scheduler stays usable and
    /// the caller decides whether to report it.
    pub fn tick(&mut self) -> Result<()> {
        if self.settings.cadence_differs(&self.applied) {
            tracing::debug!(
                "Cadence changed to {} Hz x {} samples, restarting sine phase",
                self.settings.hertz,
                self.settings.sample_rate
            );
            self.loops = 0;
        }
        self.applied = self.settings;

        if self.publisher.setup_completed() {
            self.compute_samples();
        }
        self.loops = self.loops.wrapping_add(1);
        self.stats.ticks += 1;

        if !self.publisher.is_running() {
            return Ok(());
        }
        match self.publisher.broadcast() {
            Ok(()) => {
                self.stats.frames_sent += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.transmit_errors += 1;
                Err(e)
            }
        }
    }

    fn compute_samples(&mut self) {
        let now = self.clock.now_ns();
        let delta = timestamp_delta(self.publisher.timing_baseline_ns(), now);
        let settings = &self.settings;
        let overrides = &self.overrides;
        let loops = self.loops;
        let mut stamped = false;

        for (ci, channel) in self.publisher.channels_mut().enumerate() {
            for (vi, value) in channel.values_mut().enumerate() {
                match value.mode {
                    ValueMode::Manual => {}
                    ValueMode::Sine => {
                        let (amplitude, displacement) = overrides
                            .get(&(ci, vi))
                            .map(|o| o.resolve(settings))
                            .unwrap_or((settings.amplitude, settings.displacement_y));
                        value.set(sine_sample(settings, amplitude, displacement, loops));
                    }
                    ValueMode::Timestamp => {
                        value.set(delta);
                        stamped = true;
                    }
                }
            }
        }

        if stamped {
            self.publisher.set_timing_baseline(now);
        }
    }
}
