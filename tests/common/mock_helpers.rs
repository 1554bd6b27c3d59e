//! Scheduler construction and event helpers

use std::time::{Duration, Instant};
use svpub_rs::clock::ManualClock;
use svpub_rs::config::PublisherConfig;
use svpub_rs::scheduler::{CycleScheduler, PublisherHandle, PublisherService, SchedulerEvent};
use svpub_rs::transport::CaptureBinder;

/// Build a scheduler over a capture transport and a manual clock
pub fn create_test_scheduler(
    config: &PublisherConfig,
) -> (CycleScheduler, CaptureBinder, ManualClock) {
    let binder = CaptureBinder::new();
    let clock = ManualClock::new(0);
    let scheduler = PublisherService::build_scheduler(
        config,
        Box::new(binder.clone()),
        Box::new(clock.clone()),
    )
    .expect("test configuration should build");
    (scheduler, binder, clock)
}

/// Spawn a service over a capture transport
pub fn spawn_test_service(
    config: PublisherConfig,
) -> (
    PublisherHandle,
    CaptureBinder,
    std::thread::JoinHandle<svpub_rs::Result<()>>,
) {
    let binder = CaptureBinder::new();
    let (service, handle) = PublisherService::new(config, Box::new(binder.clone()));
    let worker = std::thread::spawn(move || service.run());
    (handle, binder, worker)
}

/// Wait until an event matching `pred` arrives, collecting everything seen
pub fn wait_for_event<F>(
    handle: &PublisherHandle,
    timeout: Duration,
    pred: F,
) -> Option<SchedulerEvent>
where
    F: Fn(&SchedulerEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(event) = handle.recv_timeout(Duration::from_millis(10)) {
            if pred(&event) {
                return Some(event);
            }
        }
    }
    None
}

/// Poll `cond` until it holds or the timeout passes
pub fn wait_until<F>(timeout: Duration, cond: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
