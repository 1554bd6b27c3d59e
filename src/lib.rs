//! # SvPub-RS: Cyclic Sampled-Values Publisher
//!
//! Publishes channels of numeric values onto a network interface at a fixed
//! cadence. Each value is either set by hand, generated from a shared sine
//! signal, or carries the nanosecond delta since the previous broadcast.
//!
//! ## Architecture
//!
//! - **Publisher**: Owns the ordered channels and the transport for one interface
//! - **Scheduler**: Computes one sample per tick and broadcasts it, on its own thread
//! - **Transport**: Encodes snapshots as IEC 61850-9-2 style frames on a raw socket
//! - **Communication**: Crossbeam channels carry commands in and events out
//!
//! ## Configuration
//!
//! The binary reads `svpub.toml` from the platform configuration directory
//! under `svpub` unless a path is given:
//!
//! - **Linux**: `~/.config/svpub/`
//! - **macOS**: `~/Library/Application Support/svpub/`
//!
//! ## Example
//!
//! ```no_run
//! use svpub_rs::{
//!     config::PublisherConfig,
//!     scheduler::PublisherService,
//!     transport::EthernetBinder,
//! };
//!
//! let config = PublisherConfig::load_default().unwrap_or_default();
//! let binder = EthernetBinder::new(config.stream.clone());
//! let (service, handle) = PublisherService::new(config, Box::new(binder));
//!
//! let worker = std::thread::spawn(move || service.run());
//!
//! handle.complete_setup()?;
//! handle.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! handle.shutdown()?;
//! let _ = worker.join();
//! # Ok::<(), svpub_rs::SvPubError>(())
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod interfaces;
pub mod publisher;
pub mod scheduler;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PublisherConfig, SignalSettings};
pub use error::{Result, SvPubError};
pub use publisher::Publisher;
pub use scheduler::{CycleScheduler, PublisherHandle, PublisherService, SchedulerCommand, SchedulerEvent};
pub use types::{Channel, PublishStats, PublisherState, Sample, Value, ValueMode};
