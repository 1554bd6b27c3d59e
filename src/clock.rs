//! Clock sources for timestamp values
//!
//! Timestamp values carry the nanosecond delta between consecutive
//! broadcasts. The clock used for that delta wraps at a one-second modulus,
//! so readings are always below [`NANOS_PER_SECOND`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Modulus of [`Clock::now_ns`] readings
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Nanosecond counter consumed by the cycle scheduler
pub trait Clock: Send {
    /// Current reading, wrapping at [`NANOS_PER_SECOND`]
    fn now_ns(&self) -> u64;
}

/// Wall-clock source: the sub-second part of the current system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Manually driven clock for tests and replays
///
/// Clones share the same reading, so a test can keep one handle while the
/// scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `start_ns` (reduced modulo one second)
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ns % NANOS_PER_SECOND)),
        }
    }

    /// Set the reading (reduced modulo one second)
    pub fn set(&self, now_ns: u64) {
        self.now.store(now_ns % NANOS_PER_SECOND, Ordering::SeqCst);
    }

    /// Advance the reading, wrapping at one second
    pub fn advance(&self, delta_ns: u64) {
        let next = (self.now.load(Ordering::SeqCst) + delta_ns) % NANOS_PER_SECOND;
        self.now.store(next, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
