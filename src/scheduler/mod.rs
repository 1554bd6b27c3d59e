//! Cycle scheduler running on its own thread
//!
//! The scheduler owns the publisher and is the only code that touches it
//! once running. Configuration changes are marshalled onto its thread
//! through crossbeam channels and applied at the top of the next tick.
//!
//! # Architecture
//!
//! - [`SchedulerCommand`] - Messages sent to the scheduler (layout, tunables, lifecycle)
//! - [`SchedulerEvent`] - Messages sent back (state, failures, stats, layout)
//! - [`PublisherHandle`] - Caller-side handle for sending commands and receiving events
//! - [`PublisherService`] - Entry point that builds the publisher and runs the worker
//!
//! # Components
//!
//! - [`CycleScheduler`] - Computes one sample per tick and broadcasts it
//! - [`SchedulerWorker`] - Command/tick/sleep loop around the scheduler
//! - [`signal`] - Sine and timestamp generators, deadline pacing
//!
//! # Example
//!
//! ```no_run
//! use svpub_rs::config::PublisherConfig;
//! use svpub_rs::scheduler::PublisherService;
//! use svpub_rs::transport::CaptureBinder;
//!
//! let config = PublisherConfig::default();
//! let (service, handle) = PublisherService::new(config, Box::new(CaptureBinder::new()));
//!
//! let worker = std::thread::spawn(move || service.run());
//!
//! handle.complete_setup()?;
//! handle.start()?;
//! handle.set_hertz(60)?;
//!
//! for event in handle.drain() {
//!     println!("{:?}", event);
//! }
//!
//! handle.shutdown()?;
//! let _ = worker.join();
//! # Ok::<(), svpub_rs::SvPubError>(())
//! ```

pub mod cycle;
pub mod signal;
pub mod worker;

pub use cycle::CycleScheduler;
pub use signal::{sine_sample, timestamp_delta, Pace, Pacer};
pub use worker::{SchedulerWorker, IDLE_POLL_INTERVAL, STATS_INTERVAL};

use crate::clock::{Clock, SystemClock};
use crate::config::{PublisherConfig, SignalSettings, SineOverride};
use crate::error::{Result, ResultExt, SvPubError};
use crate::publisher::Publisher;
use crate::transport::TransportBinder;
use crate::types::{ChannelInfo, PublishStats, PublisherState, ValueMode};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Commands sent to the scheduler thread
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    /// Append a channel
    AddChannel(String),
    /// Remove the last channel
    RemoveChannel,
    /// Append a value to a channel
    CreateValue { channel: usize, mode: ValueMode },
    /// Remove the last value of a channel
    RemoveLastValue { channel: usize },
    /// Change a value's mode
    SetValueMode {
        channel: usize,
        value: usize,
        mode: ValueMode,
    },
    /// Set the content of a MANUAL value (requires setup)
    SetManualValue {
        channel: usize,
        value: usize,
        content: f32,
    },
    /// Replace all signal tunables
    SetSignal(SignalSettings),
    /// Set sub-samples per period
    SetSampleRate(u32),
    /// Set the signal frequency
    SetHertz(u32),
    /// Set the shared sine amplitude
    SetAmplitude(f32),
    /// Set the shared sine offset
    SetDisplacement(f32),
    /// Set or clear a per-value amplitude/offset override
    SetSineOverride {
        channel: usize,
        value: usize,
        sine_override: Option<SineOverride>,
    },
    /// Acquire the transport
    CompleteSetup,
    /// Begin broadcasting
    Start,
    /// Stop broadcasting and release the transport
    Stop,
    /// Move to another interface; the publisher returns to unconfigured
    SelectInterface(String),
    /// Request current statistics
    RequestStats,
    /// Request the channel layout
    RequestLayout,
    /// Shutdown the scheduler
    Shutdown,
}

impl SchedulerCommand {
    /// Short name used in logs and failure events
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerCommand::AddChannel(_) => "add_channel",
            SchedulerCommand::RemoveChannel => "remove_channel",
            SchedulerCommand::CreateValue { .. } => "create_value",
            SchedulerCommand::RemoveLastValue { .. } => "remove_last_value",
            SchedulerCommand::SetValueMode { .. } => "set_value_mode",
            SchedulerCommand::SetManualValue { .. } => "set_manual_value",
            SchedulerCommand::SetSignal(_) => "set_signal",
            SchedulerCommand::SetSampleRate(_) => "set_sample_rate",
            SchedulerCommand::SetHertz(_) => "set_hertz",
            SchedulerCommand::SetAmplitude(_) => "set_amplitude",
            SchedulerCommand::SetDisplacement(_) => "set_displacement",
            SchedulerCommand::SetSineOverride { .. } => "set_sine_override",
            SchedulerCommand::CompleteSetup => "complete_setup",
            SchedulerCommand::Start => "start",
            SchedulerCommand::Stop => "stop",
            SchedulerCommand::SelectInterface(_) => "select_interface",
            SchedulerCommand::RequestStats => "request_stats",
            SchedulerCommand::RequestLayout => "request_layout",
            SchedulerCommand::Shutdown => "shutdown",
        }
    }
}

/// Events sent from the scheduler thread
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// Lifecycle state changed
    StateChanged {
        state: PublisherState,
        interface: String,
    },
    /// A command was rejected; the scheduler keeps running
    CommandFailed {
        command: &'static str,
        error: String,
    },
    /// A broadcast could not be sent; ticking continues
    TransmitFailed(String),
    /// Signal tunables after a change
    SignalChanged(SignalSettings),
    /// Channel layout after a change or on request
    Layout(Vec<ChannelInfo>),
    /// Statistics update
    Stats(PublishStats),
    /// The scheduler is shutting down
    Shutdown,
}

/// Caller-side handle for the scheduler thread
pub struct PublisherHandle {
    /// Receiver for scheduler events
    pub receiver: Receiver<SchedulerEvent>,
    /// Sender for commands to the scheduler
    pub command_sender: Sender<SchedulerCommand>,
}

impl PublisherHandle {
    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<SchedulerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SchedulerEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Receive all pending events
    pub fn drain(&self) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Send a command to the scheduler
    ///
    /// Fails with [`SvPubError::Channel`] once the scheduler thread has exited.
    pub fn send_command(&self, cmd: SchedulerCommand) -> Result<()> {
        let name = cmd.name();
        self.command_sender.send(cmd).map_err(|_| {
            SvPubError::Channel(format!("scheduler stopped, '{}' not delivered", name))
        })
    }

    pub fn add_channel(&self, name: impl Into<String>) -> Result<()> {
        self.send_command(SchedulerCommand::AddChannel(name.into()))
    }

    pub fn remove_channel(&self) -> Result<()> {
        self.send_command(SchedulerCommand::RemoveChannel)
    }

    pub fn create_value(&self, channel: usize, mode: ValueMode) -> Result<()> {
        self.send_command(SchedulerCommand::CreateValue { channel, mode })
    }

    pub fn remove_last_value(&self, channel: usize) -> Result<()> {
        self.send_command(SchedulerCommand::RemoveLastValue { channel })
    }

    pub fn set_value_mode(&self, channel: usize, value: usize, mode: ValueMode) -> Result<()> {
        self.send_command(SchedulerCommand::SetValueMode {
            channel,
            value,
            mode,
        })
    }

    /// Set the content of a MANUAL value
    pub fn set_manual_value(&self, channel: usize, value: usize, content: f32) -> Result<()> {
        self.send_command(SchedulerCommand::SetManualValue {
            channel,
            value,
            content,
        })
    }

    pub fn set_signal(&self, settings: SignalSettings) -> Result<()> {
        self.send_command(SchedulerCommand::SetSignal(settings))
    }

    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<()> {
        self.send_command(SchedulerCommand::SetSampleRate(sample_rate))
    }

    pub fn set_hertz(&self, hertz: u32) -> Result<()> {
        self.send_command(SchedulerCommand::SetHertz(hertz))
    }

    pub fn set_amplitude(&self, amplitude: f32) -> Result<()> {
        self.send_command(SchedulerCommand::SetAmplitude(amplitude))
    }

    pub fn set_displacement(&self, displacement_y: f32) -> Result<()> {
        self.send_command(SchedulerCommand::SetDisplacement(displacement_y))
    }

    pub fn set_sine_override(
        &self,
        channel: usize,
        value: usize,
        sine_override: Option<SineOverride>,
    ) -> Result<()> {
        self.send_command(SchedulerCommand::SetSineOverride {
            channel,
            value,
            sine_override,
        })
    }

    /// Acquire the transport
    pub fn complete_setup(&self) -> Result<()> {
        self.send_command(SchedulerCommand::CompleteSetup)
    }

    /// Begin broadcasting
    pub fn start(&self) -> Result<()> {
        self.send_command(SchedulerCommand::Start)
    }

    /// Stop broadcasting
    pub fn stop(&self) -> Result<()> {
        self.send_command(SchedulerCommand::Stop)
    }

    pub fn select_interface(&self, interface: impl Into<String>) -> Result<()> {
        self.send_command(SchedulerCommand::SelectInterface(interface.into()))
    }

    /// Request statistics update
    pub fn request_stats(&self) -> Result<()> {
        self.send_command(SchedulerCommand::RequestStats)
    }

    pub fn request_layout(&self) -> Result<()> {
        self.send_command(SchedulerCommand::RequestLayout)
    }

    /// Shutdown the scheduler
    pub fn shutdown(&self) -> Result<()> {
        self.send_command(SchedulerCommand::Shutdown)
    }
}

/// Builds the publisher from configuration and runs the scheduler loop
pub struct PublisherService {
    config: PublisherConfig,
    binder: Box<dyn TransportBinder>,
    clock: Box<dyn Clock>,
    command_receiver: Receiver<SchedulerCommand>,
    event_sender: Sender<SchedulerEvent>,
    running: Arc<AtomicBool>,
}

impl PublisherService {
    /// Create a service with communication channels
    pub fn new(config: PublisherConfig, binder: Box<dyn TransportBinder>) -> (Self, PublisherHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Stats arrive every 500 ms; the bound only matters if the caller stops draining
        let (event_tx, event_rx) = bounded(1_024);

        let service = Self {
            config,
            binder,
            clock: Box::new(SystemClock),
            command_receiver: cmd_rx,
            event_sender: event_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let handle = PublisherHandle {
            receiver: event_rx,
            command_sender: cmd_tx,
        };

        (service, handle)
    }

    /// Replace the clock used for timestamp values
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Build the scheduler without running it
    pub fn build_scheduler(
        config: &PublisherConfig,
        binder: Box<dyn TransportBinder>,
        clock: Box<dyn Clock>,
    ) -> Result<CycleScheduler> {
        config.signal.validate()?;
        let publisher = Publisher::with_layout(&config.interface, &config.channels, binder)?;
        Ok(CycleScheduler::new(publisher, config.signal, clock))
    }

    /// Run the scheduler loop on the current thread until shutdown
    pub fn run(self) -> Result<()> {
        let scheduler = match Self::build_scheduler(&self.config, self.binder, self.clock)
            .with_context(|| format!("Building publisher for '{}'", self.config.interface))
        {
            Ok(scheduler) => scheduler,
            Err(e) => {
                tracing::error!("Failed to build publisher: {}", e);
                let _ = self.event_sender.send(SchedulerEvent::Shutdown);
                return Err(e);
            }
        };

        let mut worker = SchedulerWorker::new(
            scheduler,
            self.command_receiver,
            self.event_sender,
            self.running,
        );
        worker.run();
        Ok(())
    }

    /// Get a handle to stop the scheduler
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Whether the scheduler has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::transport::CaptureBinder;

    #[test]
    fn test_service_creation() {
        let (service, handle) =
            PublisherService::new(PublisherConfig::default(), Box::new(CaptureBinder::new()));
        assert!(service.is_running());
        assert!(handle.send_command(SchedulerCommand::Shutdown).is_ok());
    }

    #[test]
    fn test_handle_commands_queue() {
        let (service, handle) =
            PublisherService::new(PublisherConfig::default(), Box::new(CaptureBinder::new()));

        handle.add_channel("bay2").unwrap();
        handle.create_value(1, ValueMode::Sine).unwrap();
        handle.set_hertz(60).unwrap();
        handle.complete_setup().unwrap();
        handle.start().unwrap();
        handle.stop().unwrap();
        handle.shutdown().unwrap();

        let names: Vec<&str> = service
            .command_receiver
            .try_iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "add_channel",
                "create_value",
                "set_hertz",
                "complete_setup",
                "start",
                "stop",
                "shutdown"
            ]
        );
    }

    #[test]
    fn test_handle_reports_stopped_scheduler() {
        let (service, handle) =
            PublisherService::new(PublisherConfig::default(), Box::new(CaptureBinder::new()));
        drop(service);

        match handle.start() {
            Err(SvPubError::Channel(msg)) => assert!(msg.contains("start")),
            other => panic!("expected channel error, got {:?}", other),
        }
        assert!(handle.shutdown().is_err());
    }

    #[test]
    fn test_run_error_carries_interface_context() {
        let mut config = PublisherConfig::default();
        config.interface = "eth3".to_string();
        config.signal.hertz = 0;
        let (service, _handle) = PublisherService::new(config, Box::new(CaptureBinder::new()));

        let err = service.run().unwrap_err();
        assert!(matches!(err, SvPubError::WithContext { .. }));
        assert!(err.to_string().contains("eth3"));
    }

    #[test]
    fn test_stop_handle_shares_flag() {
        let (service, _handle) =
            PublisherService::new(PublisherConfig::default(), Box::new(CaptureBinder::new()));
        service.stop_handle().store(false, Ordering::SeqCst);
        assert!(!service.is_running());
    }

    #[test]
    fn test_build_scheduler_uses_layout() {
        let mut config = PublisherConfig::default();
        config.channels = vec![
            ChannelConfig::new("a", vec![ValueMode::Sine]),
            ChannelConfig::new("b", vec![ValueMode::Timestamp, ValueMode::Manual]),
        ];
        let scheduler = PublisherService::build_scheduler(
            &config,
            Box::new(CaptureBinder::new()),
            Box::new(SystemClock),
        )
        .unwrap();
        assert_eq!(scheduler.publisher().layout().len(), 2);
        assert_eq!(scheduler.publisher().channel(1).unwrap().len(), 2);
    }

    #[test]
    fn test_run_with_invalid_layout_reports_shutdown() {
        let mut config = PublisherConfig::default();
        config.channels = vec![ChannelConfig::new("a", vec![ValueMode::Manual; 9])];
        let (service, handle) = PublisherService::new(config, Box::new(CaptureBinder::new()));

        assert!(service.run().is_err());
        assert!(matches!(handle.try_recv(), Some(SchedulerEvent::Shutdown)));
    }
}
