//! Scheduler Worker Thread Implementation
//!
//! This module contains the loop that owns the [`CycleScheduler`] on its own
//! thread. It communicates with the controlling thread through crossbeam
//! channels.
//!
//! # Responsibilities
//!
//! - **Command processing**: drains [`SchedulerCommand`]s at the top of every tick
//! - **Ticking**: computes and broadcasts one sample per period while configured
//! - **Pacing**: sleeps to a monotonic deadline, counting overruns
//! - **Statistics**: reports [`PublishStats`] every 500 ms while running
//!
//! # Failures
//!
//! A failing command is logged and reported as
//! [`SchedulerEvent::CommandFailed`]. The first failing broadcast of a streak
//! is reported as [`SchedulerEvent::TransmitFailed`]; the rest are summarised
//! with the next stats report. Neither stops the loop.
//!
//! While the publisher is unconfigured there is nothing to compute, so the
//! worker blocks on the command queue instead of ticking.

use super::cycle::CycleScheduler;
use super::signal::Pacer;
use super::{SchedulerCommand, SchedulerEvent};
use crate::error::{Result, SvPubError};
use crate::types::{PublishStats, PublisherState, Sample};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often stats are pushed while running
pub const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Command wait while there is nothing to tick
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The worker that runs the tick loop
pub struct SchedulerWorker {
    scheduler: CycleScheduler,
    /// Command receiver from the controlling thread
    command_rx: Receiver<SchedulerCommand>,
    /// Event sender to the controlling thread
    event_tx: Sender<SchedulerEvent>,
    /// Running flag
    running: Arc<AtomicBool>,
    pacer: Pacer,
    /// Last time stats were sent
    last_stats_time: Instant,
    /// Frames sent when the current rate window opened
    rate_window_frames: u64,
    rate_window_start: Instant,
    /// Consecutive failed broadcasts
    failure_streak: u64,
    /// Failures since the last report that were not logged individually
    unreported_failures: u64,
    last_failure: Option<String>,
}

impl SchedulerWorker {
    /// Create a new worker
    pub fn new(
        scheduler: CycleScheduler,
        command_rx: Receiver<SchedulerCommand>,
        event_tx: Sender<SchedulerEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            scheduler,
            command_rx,
            event_tx,
            running,
            pacer: Pacer::new(),
            last_stats_time: Instant::now(),
            rate_window_frames: 0,
            rate_window_start: Instant::now(),
            failure_streak: 0,
            unreported_failures: 0,
            last_failure: None,
        }
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!(
            "Scheduler worker started on '{}'",
            self.scheduler.publisher().interface_name()
        );

        while self.running.load(Ordering::SeqCst) {
            if !self.scheduler.publisher().setup_completed() {
                self.wait_for_command();
                continue;
            }

            self.process_commands();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.tick();

            if self.scheduler.publisher().is_running()
                && self.last_stats_time.elapsed() >= STATS_INTERVAL
            {
                self.send_stats();
                self.last_stats_time = Instant::now();
            }

            self.pace();
        }

        if self.scheduler.publisher().setup_completed() {
            self.scheduler.stop();
        }

        let _ = self.event_tx.send(SchedulerEvent::Shutdown);
        tracing::info!("Scheduler worker stopped");
    }

    /// Block briefly for one command while idle
    fn wait_for_command(&mut self) {
        match self.command_rx.recv_timeout(IDLE_POLL_INTERVAL) {
            Ok(cmd) => self.handle_command(cmd),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Process pending commands
    pub fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Run one tick, reporting transmit failures
    ///
    /// Only the first failure of a streak is logged and sent as an event; the
    /// rest are counted and summarised with the next stats report.
    pub fn tick(&mut self) {
        match self.scheduler.tick() {
            Ok(()) => {
                if self.failure_streak > 1 {
                    self.report_unreported_failures();
                    tracing::info!(
                        "Broadcasts recovered after {} failures",
                        self.failure_streak
                    );
                }
                self.failure_streak = 0;
            }
            Err(e) => {
                self.failure_streak += 1;
                if self.failure_streak == 1 {
                    tracing::warn!("Broadcast failed: {}", e);
                    self.try_send_event(SchedulerEvent::TransmitFailed(e.to_string()));
                } else {
                    self.unreported_failures += 1;
                    self.last_failure = Some(e.to_string());
                }
            }
        }
    }

    fn report_unreported_failures(&mut self) {
        if self.unreported_failures == 0 {
            return;
        }
        tracing::warn!(
            "{} more broadcasts failed (last: {})",
            self.unreported_failures,
            self.last_failure.take().unwrap_or_default()
        );
        self.unreported_failures = 0;
    }

    fn pace(&mut self) {
        let period = self.scheduler.period();
        let pace = self.pacer.wait(period);
        if pace.lateness.is_zero() {
            return;
        }

        let stats = self.scheduler.stats_mut();
        stats.overruns += 1;
        stats.max_lateness_us = stats.max_lateness_us.max(pace.lateness.as_micros() as u64);
        if pace.reanchored {
            tracing::debug!(
                "Tick overran by {:?} (period {:?}), re-anchoring deadline",
                pace.lateness,
                period
            );
        }
    }

    /// Handle a single command
    pub fn handle_command(&mut self, cmd: SchedulerCommand) {
        let name = cmd.name();
        if let Err(e) = self.apply_command(cmd) {
            tracing::warn!("{} failed: {}", name, e);
            self.try_send_event(SchedulerEvent::CommandFailed {
                command: name,
                error: e.to_string(),
            });
        }
    }

    fn apply_command(&mut self, cmd: SchedulerCommand) -> Result<()> {
        match cmd {
            SchedulerCommand::AddChannel(name) => {
                self.scheduler.add_channel(name)?;
                self.send_layout();
            }
            SchedulerCommand::RemoveChannel => {
                self.scheduler.remove_channel()?;
                self.send_layout();
            }
            SchedulerCommand::CreateValue { channel, mode } => {
                self.scheduler.create_value(channel, mode)?;
                self.send_layout();
            }
            SchedulerCommand::RemoveLastValue { channel } => {
                self.scheduler.remove_last_value(channel)?;
                self.send_layout();
            }
            SchedulerCommand::SetValueMode {
                channel,
                value,
                mode,
            } => {
                self.scheduler.set_value_mode(channel, value, mode)?;
                self.send_layout();
            }
            SchedulerCommand::SetManualValue {
                channel,
                value,
                content,
            } => {
                self.scheduler
                    .set_value(channel, value, Sample::Float(content))?;
            }
            SchedulerCommand::SetSignal(settings) => {
                self.scheduler.set_settings(settings)?;
                self.signal_changed();
            }
            SchedulerCommand::SetSampleRate(sample_rate) => {
                self.scheduler.set_sample_rate(sample_rate)?;
                self.signal_changed();
            }
            SchedulerCommand::SetHertz(hertz) => {
                self.scheduler.set_hertz(hertz)?;
                self.signal_changed();
            }
            SchedulerCommand::SetAmplitude(amplitude) => {
                self.scheduler.set_amplitude(amplitude)?;
                self.signal_changed();
            }
            SchedulerCommand::SetDisplacement(displacement_y) => {
                self.scheduler.set_displacement(displacement_y)?;
                self.signal_changed();
            }
            SchedulerCommand::SetSineOverride {
                channel,
                value,
                sine_override,
            } => {
                self.scheduler
                    .set_sine_override(channel, value, sine_override)?;
            }
            SchedulerCommand::CompleteSetup => {
                self.scheduler.complete_setup()?;
                self.pacer.reset();
                self.send_state();
            }
            SchedulerCommand::Start => {
                self.scheduler.start()?;
                self.pacer.reset();
                self.failure_streak = 0;
                self.reset_rate_window();
                self.last_stats_time = Instant::now();
                self.send_state();
            }
            SchedulerCommand::Stop => {
                self.scheduler.stop();
                self.send_state();
                self.send_stats();
            }
            SchedulerCommand::SelectInterface(interface) => {
                if interface.is_empty() {
                    return Err(SvPubError::InvalidParameter(
                        "interface name must not be empty".to_string(),
                    ));
                }
                self.scheduler.select_interface(&interface);
                self.send_state();
            }
            SchedulerCommand::RequestStats => {
                self.send_stats();
            }
            SchedulerCommand::RequestLayout => {
                self.send_layout();
            }
            SchedulerCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn signal_changed(&mut self) {
        self.pacer.reset();
        self.try_send_event(SchedulerEvent::SignalChanged(*self.scheduler.settings()));
    }

    fn reset_rate_window(&mut self) {
        self.rate_window_frames = self.scheduler.stats().frames_sent;
        self.rate_window_start = Instant::now();
    }

    fn send_state(&mut self) {
        let publisher = self.scheduler.publisher();
        let event = SchedulerEvent::StateChanged {
            state: publisher.state(),
            interface: publisher.interface_name().to_string(),
        };
        self.try_send_event(event);
    }

    fn send_layout(&mut self) {
        let layout = self.scheduler.publisher().layout();
        self.try_send_event(SchedulerEvent::Layout(layout));
    }

    /// Send statistics (using try_send for backpressure)
    fn send_stats(&mut self) {
        self.report_unreported_failures();
        let elapsed = self.rate_window_start.elapsed().as_secs_f64();
        let frames = self
            .scheduler
            .stats()
            .frames_sent
            .saturating_sub(self.rate_window_frames);
        if elapsed > 0.0 && self.scheduler.publisher().is_running() {
            self.scheduler.stats_mut().effective_rate_hz = frames as f64 / elapsed;
        }
        self.reset_rate_window();

        let stats: PublishStats = self.scheduler.stats().clone();
        self.try_send_event(SchedulerEvent::Stats(stats));
    }

    /// Try to send an event, tracking dropped events if the queue is full
    fn try_send_event(&mut self, event: SchedulerEvent) {
        if self.event_tx.try_send(event).is_err() {
            self.scheduler.stats_mut().dropped_events += 1;
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PublisherState {
        self.scheduler.publisher().state()
    }
}
