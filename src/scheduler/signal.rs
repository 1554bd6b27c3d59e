//! Sample generators and tick pacing
//!
//! Pure functions for SINE and TIMESTAMP content, plus the [`Pacer`] that
//! keeps the tick loop on a monotonic deadline.

use crate::clock::NANOS_PER_SECOND;
use crate::config::SignalSettings;
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

/// Sine content for the `loops`-th tick since the phase was reset
///
/// `t = loops / (hertz * sample_rate)`, so the k-th tick lands on
/// `amplitude * sin(2πk / sample_rate) + displacement_y`.
pub fn sine_sample(settings: &SignalSettings, amplitude: f32, displacement_y: f32, loops: u64) -> f32 {
    let sample_rate = settings.sample_rate.max(1) as u64;
    // The phase repeats every `sample_rate` ticks
    let k = loops % sample_rate;
    let phase = TAU * k as f64 / sample_rate as f64;
    (amplitude as f64 * phase.sin() + displacement_y as f64) as f32
}

/// Nanoseconds between two readings of a one-second-modulus clock
///
/// Gaps of a second or more cannot be told apart from shorter ones and
/// produce a wrong delta.
pub fn timestamp_delta(last_ns: u64, current_ns: u64) -> u32 {
    let delta = if current_ns < last_ns {
        NANOS_PER_SECOND.wrapping_sub(last_ns).wrapping_add(current_ns)
    } else {
        current_ns - last_ns
    };
    delta as u32
}

/// Outcome of one pacing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pace {
    /// How long to sleep before the next tick
    pub sleep: Duration,
    /// How far past its deadline the tick finished
    pub lateness: Duration,
    /// Whether the deadline was moved to now instead of catching up
    pub reanchored: bool,
}

/// Deadline tracker for the tick loop
///
/// Every step advances the deadline by one period, so short sleeps after a
/// slow tick pull the loop back on schedule. A tick later than one whole
/// period re-anchors the deadline to now rather than bursting.
#[derive(Debug, Default)]
pub struct Pacer {
    next_deadline: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the deadline; the next step anchors to its `now`
    pub fn reset(&mut self) {
        self.next_deadline = None;
    }

    /// Compute the wait after a tick finishing at `now`
    pub fn step(&mut self, now: Instant, period: Duration) -> Pace {
        let Some(deadline) = self.next_deadline else {
            self.next_deadline = Some(now + period);
            return Pace {
                sleep: period,
                lateness: Duration::ZERO,
                reanchored: false,
            };
        };

        if now < deadline {
            self.next_deadline = Some(deadline + period);
            return Pace {
                sleep: deadline - now,
                lateness: Duration::ZERO,
                reanchored: false,
            };
        }

        let lateness = now - deadline;
        let reanchored = lateness > period;
        self.next_deadline = Some(if reanchored { now + period } else { deadline + period });
        Pace {
            sleep: Duration::ZERO,
            lateness,
            reanchored,
        }
    }

    /// Sleep until the next deadline
    pub fn wait(&mut self, period: Duration) -> Pace {
        let pace = self.step(Instant::now(), period);
        if !pace.sleep.is_zero() {
            std::thread::sleep(pace.sleep);
        }
        pace
    }
}
