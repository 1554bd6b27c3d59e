//! In-memory capture transport
//!
//! Records every snapshot it is asked to send instead of writing to a
//! socket. The binary uses it for `--dry-run`; tests use it to inspect what
//! the publisher broadcast and to inject bind or transmit failures.
//!
//! Clones of a [`CaptureTransport`] share their recording, so a test can
//! keep a handle while the publisher owns the bound transport.

use super::encoding::{FrameEncoder, SvFrameEncoder};
use super::{Transport, TransportBinder};
use crate::error::{Result, SvPubError};
use crate::types::Snapshot;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of snapshots retained
pub const DEFAULT_HISTORY: usize = 1024;

/// Transport that records snapshots
#[derive(Clone)]
pub struct CaptureTransport {
    inner: Arc<Mutex<CaptureInner>>,
}

struct CaptureInner {
    history: VecDeque<Snapshot>,
    history_limit: usize,
    sent: u64,
    bytes_encoded: u64,
    fail_sends: usize,
    encoder: Option<Box<dyn FrameEncoder>>,
    frame: Vec<u8>,
}

impl CaptureTransport {
    /// Create a capture keeping the last [`DEFAULT_HISTORY`] snapshots
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Create a capture keeping the last `limit` snapshots
    pub fn with_history(limit: usize) -> Self {
        CaptureTransport {
            inner: Arc::new(Mutex::new(CaptureInner {
                history: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY)),
                history_limit: limit,
                sent: 0,
                bytes_encoded: 0,
                fail_sends: 0,
                encoder: None,
                frame: Vec::new(),
            })),
        }
    }

    /// Also run every snapshot through an encoder, counting encoded bytes
    pub fn with_encoder(self, encoder: SvFrameEncoder) -> Self {
        self.lock().encoder = Some(Box::new(encoder));
        self
    }

    fn lock(&self) -> MutexGuard<'_, CaptureInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `count` sends fail with a transmit error
    pub fn fail_next_sends(&self, count: usize) {
        self.lock().fail_sends = count;
    }

    /// Number of successful sends
    pub fn sent_count(&self) -> u64 {
        self.lock().sent
    }

    /// Total encoded frame bytes (zero without an encoder)
    pub fn bytes_encoded(&self) -> u64 {
        self.lock().bytes_encoded
    }

    /// Retained snapshots, oldest first
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.lock().history.iter().cloned().collect()
    }

    /// Most recent snapshot
    pub fn last(&self) -> Option<Snapshot> {
        self.lock().history.back().cloned()
    }
}

impl Default for CaptureTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for CaptureTransport {
    fn send(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_sends > 0 {
            inner.fail_sends -= 1;
            return Err(SvPubError::Transmit("injected send failure".to_string()));
        }

        let inner = &mut *inner;
        if let Some(encoder) = inner.encoder.as_mut() {
            encoder.encode(snapshot, &mut inner.frame)?;
            inner.bytes_encoded += inner.frame.len() as u64;
        }

        if inner.history_limit > 0 {
            if inner.history.len() >= inner.history_limit {
                inner.history.pop_front();
            }
            inner.history.push_back(snapshot.clone());
        }
        inner.sent += 1;
        Ok(())
    }
}

/// Binder handing out clones of one shared [`CaptureTransport`]
#[derive(Clone)]
pub struct CaptureBinder {
    capture: CaptureTransport,
    state: Arc<Mutex<BinderState>>,
}

#[derive(Default)]
struct BinderState {
    fail_reason: Option<String>,
    binds: Vec<String>,
}

impl CaptureBinder {
    /// Create a binder with a fresh capture
    pub fn new() -> Self {
        Self::with_capture(CaptureTransport::new())
    }

    /// Create a binder around an existing capture
    pub fn with_capture(capture: CaptureTransport) -> Self {
        Self {
            capture,
            state: Arc::new(Mutex::new(BinderState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BinderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent bind fail with `reason` (`None` to succeed again)
    pub fn fail_binds(&self, reason: Option<&str>) {
        self.lock().fail_reason = reason.map(str::to_string);
    }

    /// The shared capture
    pub fn capture(&self) -> &CaptureTransport {
        &self.capture
    }

    /// Interfaces successfully bound so far, in order
    pub fn binds(&self) -> Vec<String> {
        self.lock().binds.clone()
    }
}

impl Default for CaptureBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportBinder for CaptureBinder {
    fn bind(&self, interface: &str) -> Result<Box<dyn Transport>> {
        let mut state = self.lock();
        if let Some(reason) = &state.fail_reason {
            return Err(SvPubError::bind(interface, reason));
        }
        state.binds.push(interface.to_string());
        tracing::debug!("Capture transport bound to '{}'", interface);
        Ok(Box::new(self.capture.clone()))
    }
}
