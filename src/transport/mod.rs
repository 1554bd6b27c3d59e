//! Transport collaborators for broadcasting snapshots
//!
//! The publisher core never touches sockets or wire formats directly. At
//! setup it asks a [`TransportBinder`] for a [`Transport`] bound to its
//! interface, and each broadcast hands one ordered [`Snapshot`] to that
//! transport.
//!
//! # Implementations
//!
//! - [`EthernetBinder`] / [`EthernetTransport`] - Raw `AF_PACKET` socket (Linux)
//!   that encodes snapshots with a [`FrameEncoder`]
//! - [`CaptureBinder`] / [`CaptureTransport`] - In-memory transport that
//!   records snapshots, used for dry runs and tests
//!
//! # Example
//!
//! ```ignore
//! use svpub_rs::transport::{CaptureBinder, TransportBinder};
//!
//! let binder = CaptureBinder::new();
//! let mut transport = binder.bind("lo")?;
//! transport.send(&snapshot)?;
//! assert_eq!(binder.capture().sent_count(), 1);
//! ```

pub mod capture;
pub mod encoding;
pub mod ethernet;

pub use capture::{CaptureBinder, CaptureTransport};
pub use encoding::{FrameEncoder, SvFrameEncoder, VlanTag, ETHERTYPE_SV};
pub use ethernet::{EthernetBinder, EthernetTransport};

use crate::error::Result;
use crate::types::Snapshot;

/// A bound handle that writes snapshots to the network
///
/// Implementations must be `Send` so the scheduler thread can own them.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Encode and transmit one snapshot
    ///
    /// Exactly one network write per call. Failures are reported as
    /// [`SvPubError::Transmit`](crate::error::SvPubError::Transmit).
    fn send(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Acquires transports for a named interface
#[cfg_attr(test, mockall::automock)]
pub trait TransportBinder: Send {
    /// Open the interface, failing fast with
    /// [`SvPubError::Bind`](crate::error::SvPubError::Bind) when it cannot
    /// be used (missing device, insufficient privilege).
    fn bind(&self, interface: &str) -> Result<Box<dyn Transport>>;
}
