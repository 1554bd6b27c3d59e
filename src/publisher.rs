//! Publisher state machine
//!
//! A [`Publisher`] owns the ordered channels, the name of the interface it
//! publishes on, and the transport acquired for that interface.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured --complete_setup()--> Configured --start()--> Running
//!      ^                                                        |
//!      +------------------------ stop() / reset() --------------+
//! ```
//!
//! Setup is separate from construction so channels and values can be laid
//! out before any OS resource is committed. Stopping always tears the
//! transport down: a stopped publisher must bind again before it can run,
//! it never resumes on a half-closed socket.
//!
//! The publisher does not compute sample content. The cycle scheduler fills
//! values in, then calls [`Publisher::broadcast`] to send what is there.

use crate::config::{ChannelConfig, MAX_CHANNELS};
use crate::error::{Result, SvPubError};
use crate::transport::{Transport, TransportBinder};
use crate::types::{Channel, ChannelInfo, PublisherState, Sample, Snapshot, ValueMode};

/// Channel/value publisher bound to one interface
pub struct Publisher {
    interface_name: String,
    channels: Vec<Channel>,
    binder: Box<dyn TransportBinder>,
    transport: Option<Box<dyn Transport>>,
    setup_completed: bool,
    running: bool,
    /// Clock reading of the last broadcast, for timestamp values
    timing_baseline_ns: u64,
    sample_count: u16,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("interface_name", &self.interface_name)
            .field("channels", &self.channels)
            .field("setup_completed", &self.setup_completed)
            .field("running", &self.running)
            .field("timing_baseline_ns", &self.timing_baseline_ns)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Create an unconfigured publisher for `interface_name`
    pub fn new(interface_name: impl Into<String>, binder: Box<dyn TransportBinder>) -> Self {
        Self {
            interface_name: interface_name.into(),
            channels: Vec::with_capacity(MAX_CHANNELS),
            binder,
            transport: None,
            setup_completed: false,
            running: false,
            timing_baseline_ns: 0,
            sample_count: 0,
        }
    }

    /// Switch to another interface
    ///
    /// Equivalent to discarding the publisher and constructing a new one:
    /// the transport, setup flag and timing baseline tied to the old
    /// interface are all dropped. The channel layout and value contents
    /// carry over.
    pub fn rebind(&mut self, interface_name: impl Into<String>) {
        self.reset();
        self.interface_name = interface_name.into();
        tracing::info!("Publisher rebound to '{}'", self.interface_name);
    }

    /// Build an unconfigured publisher with a channel layout
    pub fn with_layout(
        interface_name: impl Into<String>,
        layout: &[ChannelConfig],
        binder: Box<dyn TransportBinder>,
    ) -> Result<Self> {
        let mut publisher = Publisher::new(interface_name, binder);
        for channel in layout {
            let index = publisher.add_channel(channel.name.clone())?;
            for mode in &channel.values {
                publisher.create_value(index, *mode)?;
            }
        }
        Ok(publisher)
    }

    /// Interface this publisher is bound to
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// Whether network resources have been acquired
    pub fn setup_completed(&self) -> bool {
        self.setup_completed
    }

    /// Whether broadcasts are being sent
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current lifecycle state
    pub fn state(&self) -> PublisherState {
        match (self.setup_completed, self.running) {
            (_, true) => PublisherState::Running,
            (true, false) => PublisherState::Configured,
            (false, false) => PublisherState::Unconfigured,
        }
    }

    /// Clock reading the next timestamp delta is measured from
    pub fn timing_baseline_ns(&self) -> u64 {
        self.timing_baseline_ns
    }

    /// Move the timestamp baseline to `now_ns`
    pub fn set_timing_baseline(&mut self, now_ns: u64) {
        self.timing_baseline_ns = now_ns;
    }

    // ==================== Channels ====================

    /// Channels in wire order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Get a channel by index
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Get a mutable channel by index
    pub fn channel_mut(&mut self, index: usize) -> Result<&mut Channel> {
        self.channels
            .get_mut(index)
            .ok_or(SvPubError::NoSuchChannel(index))
    }

    /// Iterate channels mutably in wire order
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.iter_mut()
    }

    /// Layout summary for the configuration surface
    pub fn layout(&self) -> Vec<ChannelInfo> {
        self.channels.iter().map(ChannelInfo::from).collect()
    }

    /// Append a channel, returning its index
    pub fn add_channel(&mut self, name: impl Into<String>) -> Result<usize> {
        if self.channels.len() >= MAX_CHANNELS {
            return Err(SvPubError::CapacityExceeded {
                what: "channels",
                max: MAX_CHANNELS,
            });
        }
        let name = name.into();
        tracing::debug!("Adding channel '{}'", name);
        self.channels.push(Channel::new(name));
        Ok(self.channels.len() - 1)
    }

    /// Remove the last channel
    pub fn remove_channel(&mut self) -> Result<Channel> {
        let channel = self.channels.pop().ok_or(SvPubError::EmptyPublisher)?;
        tracing::debug!("Removed channel '{}'", channel.name());
        Ok(channel)
    }

    /// Append a value to a channel, returning its index
    pub fn create_value(&mut self, channel: usize, mode: ValueMode) -> Result<usize> {
        self.channel_mut(channel)?.create_value(mode)
    }

    /// Remove the last value of a channel
    pub fn remove_last_value(&mut self, channel: usize) -> Result<()> {
        self.channel_mut(channel)?.remove_last_value().map(|_| ())
    }

    /// Change a value's mode; applies from the next computed sample
    pub fn set_value_mode(&mut self, channel: usize, value: usize, mode: ValueMode) -> Result<()> {
        self.channel_mut(channel)?
            .set_mode(value, mode)
            .ok_or(SvPubError::NoSuchValue { channel, value })?;
        Ok(())
    }

    /// Overwrite a value's content
    ///
    /// Only permitted once setup has completed.
    pub fn set_value(&mut self, channel: usize, value: usize, content: Sample) -> Result<()> {
        if !self.setup_completed {
            return Err(SvPubError::NotConfigured);
        }
        self.channel_mut(channel)?
            .set_value(value, content)
            .ok_or(SvPubError::NoSuchValue { channel, value })?;
        Ok(())
    }

    // ==================== Lifecycle ====================

    /// Acquire the transport for the bound interface
    ///
    /// A no-op when setup already completed. On failure the publisher stays
    /// unconfigured.
    pub fn complete_setup(&mut self) -> Result<()> {
        if self.setup_completed {
            tracing::debug!("Setup already completed on '{}'", self.interface_name);
            return Ok(());
        }

        let transport = self.binder.bind(&self.interface_name)?;
        self.transport = Some(transport);
        self.setup_completed = true;
        tracing::info!("Setup completed on '{}'", self.interface_name);
        Ok(())
    }

    /// Begin broadcasting, measuring the first timestamp delta from `now_ns`
    pub fn start(&mut self, now_ns: u64) -> Result<()> {
        if !self.setup_completed {
            return Err(SvPubError::NotConfigured);
        }
        self.running = true;
        self.timing_baseline_ns = now_ns;
        tracing::info!("Publisher started on '{}'", self.interface_name);
        Ok(())
    }

    /// Stop broadcasting and tear down network resources
    pub fn stop(&mut self) {
        self.running = false;
        self.reset();
        tracing::info!("Publisher stopped on '{}'", self.interface_name);
    }

    /// Drop the transport and return to the unconfigured state
    ///
    /// Channels and values are kept.
    pub fn reset(&mut self) {
        self.running = false;
        self.transport = None;
        self.setup_completed = false;
        self.timing_baseline_ns = 0;
        self.sample_count = 0;
    }

    /// Ordered copy of every channel's content
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sample_count: self.sample_count,
            channels: self.channels.iter().map(Channel::snapshot).collect(),
        }
    }

    /// Send the current content of every channel
    ///
    /// Does nothing unless running. Otherwise performs exactly one transport
    /// write.
    pub fn broadcast(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        let snapshot = self.snapshot();
        let transport = self.transport.as_mut().ok_or(SvPubError::NotConfigured)?;
        let result = transport.send(&snapshot);
        self.sample_count = self.sample_count.wrapping_add(1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, MockTransportBinder};
    use proptest::prelude::*;

    fn binder_with_sends(sends: usize) -> Box<dyn TransportBinder> {
        let mut binder = MockTransportBinder::new();
        binder.expect_bind().returning(move |_| {
            let mut transport = MockTransport::new();
            transport.expect_send().times(sends).returning(|_| Ok(()));
            Ok(Box::new(transport) as Box<dyn Transport>)
        });
        Box::new(binder)
    }

    fn failing_binder() -> Box<dyn TransportBinder> {
        let mut binder = MockTransportBinder::new();
        binder
            .expect_bind()
            .returning(|iface| Err(SvPubError::bind(iface, "No such device")));
        Box::new(binder)
    }

    #[test]
    fn test_new_publisher_is_unconfigured() {
        let publisher = Publisher::new("lo", binder_with_sends(0));
        assert_eq!(publisher.state(), PublisherState::Unconfigured);
        assert_eq!(publisher.interface_name(), "lo");
        assert!(publisher.channels().is_empty());
    }

    #[test]
    fn test_start_before_setup_fails() {
        let mut publisher = Publisher::new("lo", binder_with_sends(0));
        assert!(matches!(publisher.start(0), Err(SvPubError::NotConfigured)));
        assert!(!publisher.is_running());
    }

    #[test]
    fn test_bind_failure_leaves_unconfigured() {
        let mut publisher = Publisher::new("eth9", failing_binder());
        let err = publisher.complete_setup().unwrap_err();
        assert!(matches!(err, SvPubError::Bind { ref interface, .. } if interface == "eth9"));
        assert_eq!(publisher.state(), PublisherState::Unconfigured);
        assert!(matches!(publisher.start(0), Err(SvPubError::NotConfigured)));
    }

    #[test]
    fn test_broadcast_when_stopped_does_not_send() {
        // The mock fails the test on any send call
        let mut publisher = Publisher::new("lo", binder_with_sends(0));
        publisher.add_channel("svpub1").unwrap();
        publisher.broadcast().unwrap();

        publisher.complete_setup().unwrap();
        publisher.broadcast().unwrap();
        assert_eq!(publisher.state(), PublisherState::Configured);
    }

    #[test]
    fn test_broadcast_sends_once_per_call() {
        let mut publisher = Publisher::new("lo", binder_with_sends(3));
        publisher.add_channel("svpub1").unwrap();
        publisher.complete_setup().unwrap();
        publisher.start(0).unwrap();
        for _ in 0..3 {
            publisher.broadcast().unwrap();
        }
        assert_eq!(publisher.snapshot().sample_count, 3);
    }

    #[test]
    fn test_start_resets_timing_baseline() {
        let mut publisher = Publisher::new("lo", binder_with_sends(0));
        publisher.complete_setup().unwrap();
        publisher.set_timing_baseline(5);
        publisher.start(123_456).unwrap();
        assert_eq!(publisher.timing_baseline_ns(), 123_456);
        assert_eq!(publisher.state(), PublisherState::Running);
    }

    #[test]
    fn test_stop_tears_down_setup() {
        let mut publisher = Publisher::new("lo", binder_with_sends(0));
        publisher.add_channel("svpub1").unwrap();
        publisher.complete_setup().unwrap();
        publisher.start(10).unwrap();

        publisher.stop();
        assert_eq!(publisher.state(), PublisherState::Unconfigured);
        assert_eq!(publisher.timing_baseline_ns(), 0);
        assert_eq!(publisher.channels().len(), 1);
        assert!(matches!(publisher.start(0), Err(SvPubError::NotConfigured)));
    }

    #[test]
    fn test_complete_setup_twice_binds_once() {
        let mut binder = MockTransportBinder::new();
        binder
            .expect_bind()
            .times(1)
            .returning(|_| Ok(Box::new(MockTransport::new()) as Box<dyn Transport>));
        let mut publisher = Publisher::new("lo", Box::new(binder));
        publisher.complete_setup().unwrap();
        publisher.complete_setup().unwrap();
        assert!(publisher.setup_completed());
    }

    #[test]
    fn test_set_value_requires_setup() {
        let mut publisher = Publisher::new("lo", binder_with_sends(0));
        publisher.add_channel("svpub1").unwrap();
        publisher.create_value(0, ValueMode::Manual).unwrap();
        assert!(matches!(
            publisher.set_value(0, 0, Sample::Float(1.0)),
            Err(SvPubError::NotConfigured)
        ));

        publisher.complete_setup().unwrap();
        publisher.set_value(0, 0, Sample::Float(1.0)).unwrap();
        assert_eq!(
            publisher.channels()[0].values()[0].content(),
            Sample::Float(1.0)
        );
        assert!(matches!(
            publisher.set_value(0, 1, Sample::Float(1.0)),
            Err(SvPubError::NoSuchValue { channel: 0, value: 1 })
        ));
        assert!(matches!(
            publisher.set_value(2, 0, Sample::Float(1.0)),
            Err(SvPubError::NoSuchChannel(2))
        ));
    }

    #[test]
    fn test_transmit_error_is_reported() {
        let mut binder = MockTransportBinder::new();
        binder.expect_bind().returning(|_| {
            let mut transport = MockTransport::new();
            transport
                .expect_send()
                .returning(|_| Err(SvPubError::Transmit("ENOBUFS".to_string())));
            Ok(Box::new(transport) as Box<dyn Transport>)
        });
        let mut publisher = Publisher::new("lo", Box::new(binder));
        publisher.complete_setup().unwrap();
        publisher.start(0).unwrap();
        assert!(matches!(publisher.broadcast(), Err(SvPubError::Transmit(_))));
        assert!(publisher.is_running());
    }

    #[test]
    fn test_rebind_keeps_layout() {
        let mut publisher = Publisher::new("lo", binder_with_sends(0));
        publisher.add_channel("svpub1").unwrap();
        publisher.create_value(0, ValueMode::Sine).unwrap();
        publisher.complete_setup().unwrap();

        publisher.rebind("eth0");
        assert_eq!(publisher.interface_name(), "eth0");
        assert_eq!(publisher.state(), PublisherState::Unconfigured);
        assert_eq!(publisher.layout()[0].modes, vec![ValueMode::Sine]);
    }

    #[test]
    fn test_with_layout() {
        let layout = vec![
            ChannelConfig::new("a", vec![ValueMode::Sine, ValueMode::Timestamp]),
            ChannelConfig::new("b", vec![]),
        ];
        let publisher = Publisher::with_layout("lo", &layout, binder_with_sends(0)).unwrap();
        assert_eq!(publisher.channels().len(), 2);
        assert_eq!(
            publisher.layout()[0].modes,
            vec![ValueMode::Sine, ValueMode::Timestamp]
        );
        assert!(publisher.channel(1).unwrap().is_empty());
    }

    #[test]
    fn test_channel_capacity() {
        let mut publisher = Publisher::new("lo", binder_with_sends(0));
        for i in 0..MAX_CHANNELS {
            publisher.add_channel(format!("ch{}", i)).unwrap();
        }
        assert!(matches!(
            publisher.add_channel("overflow"),
            Err(SvPubError::CapacityExceeded { what: "channels", .. })
        ));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        Remove,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Add), Just(Op::Remove)]
    }

    proptest! {
        #[test]
        fn test_channel_ops_respect_limit_and_tail(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let mut publisher = Publisher::new("lo", binder_with_sends(0));
            let mut model: Vec<String> = Vec::new();
            let mut next_id = 0usize;

            for op in ops {
                match op {
                    Op::Add => {
                        let name = format!("ch{}", next_id);
                        next_id += 1;
                        let result = publisher.add_channel(name.clone());
                        if model.len() < MAX_CHANNELS {
                            prop_assert!(result.is_ok());
                            model.push(name);
                        } else {
                            prop_assert!(result.is_err(), "add beyond the limit must fail");
                        }
                    }
                    Op::Remove => {
                        match publisher.remove_channel() {
                            Ok(removed) => {
                                let expected = model.pop();
                                prop_assert_eq!(Some(removed.name().to_string()), expected);
                            }
                            Err(e) => {
                                prop_assert!(model.is_empty());
                                prop_assert!(matches!(e, SvPubError::EmptyPublisher));
                            }
                        }
                    }
                }

                prop_assert!(publisher.channels().len() <= MAX_CHANNELS);
                let names: Vec<&str> = publisher.channels().iter().map(|c| c.name()).collect();
                let model_names: Vec<&str> = model.iter().map(String::as_str).collect();
                prop_assert_eq!(names, model_names);
            }
        }
    }
}
