//! SV Publisher - Main Entry Point
//!
//! Loads the publisher configuration, binds the chosen network interface and
//! broadcasts until Ctrl-C (or `--duration` seconds).

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use svpub_rs::{
    config::PublisherConfig,
    interfaces::list_network_interfaces,
    scheduler::{PublisherService, SchedulerCommand, SchedulerEvent},
    transport::{CaptureBinder, CaptureTransport, EthernetBinder, TransportBinder},
    types::PublishStats,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "svpub")]
#[command(about = "Publish cyclic sampled values on a network interface", long_about = None)]
struct Args {
    /// Network interface to publish on (overrides the configuration file)
    interface: Option<String>,

    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Encode frames without opening a socket
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,

    /// Print the available network interfaces and exit
    #[arg(long)]
    list_interfaces: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_file.as_deref())?;

    if args.list_interfaces {
        for name in list_network_interfaces()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => PublisherConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PublisherConfig::load_default()?,
    };
    if let Some(interface) = args.interface {
        config.interface = interface;
    }
    config.validate()?;

    tracing::info!(
        "Starting SV publisher on '{}' ({} channel(s), {} Hz x {} samples)",
        config.interface,
        config.channels.len(),
        config.signal.hertz,
        config.signal.sample_rate
    );

    let dry_run_capture = if args.dry_run {
        Some(CaptureTransport::with_history(0).with_encoder(config.stream.encoder([0; 6])?))
    } else {
        None
    };
    let binder: Box<dyn TransportBinder> = match &dry_run_capture {
        Some(capture) => Box::new(CaptureBinder::with_capture(capture.clone())),
        None => Box::new(EthernetBinder::new(config.stream.clone())),
    };

    let (service, handle) = PublisherService::new(config, binder);
    let worker = std::thread::Builder::new()
        .name("svpub-scheduler".to_string())
        .spawn(move || service.run())
        .context("spawning scheduler thread")?;

    let shutdown_tx = handle.command_sender.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(SchedulerCommand::Shutdown);
    })
    .context("installing Ctrl-C handler")?;

    handle
        .complete_setup()
        .and_then(|_| handle.start())
        .context("queueing setup and start")?;

    let deadline = args.duration.map(|s| Instant::now() + Duration::from_secs(s));
    let mut shutdown_sent = false;
    let mut failure: Option<String> = None;
    let mut last_stats = PublishStats::default();

    loop {
        if !shutdown_sent && deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("Duration elapsed, stopping");
            if let Err(e) = handle.stop().and_then(|_| handle.shutdown()) {
                tracing::debug!("{}", e);
            }
            shutdown_sent = true;
        }

        match handle.recv_timeout(Duration::from_millis(100)) {
            Some(SchedulerEvent::Shutdown) => break,
            Some(SchedulerEvent::StateChanged { state, interface }) => {
                tracing::info!("Publisher {} on '{}'", state, interface);
            }
            Some(SchedulerEvent::CommandFailed { command, error }) => {
                tracing::error!("{}: {}", command, error);
                if matches!(command, "complete_setup" | "start") && failure.is_none() {
                    failure = Some(error);
                    if let Err(e) = handle.shutdown() {
                        tracing::debug!("{}", e);
                    }
                    shutdown_sent = true;
                }
            }
            Some(SchedulerEvent::Stats(stats)) => {
                tracing::debug!(
                    "{} frames, {} errors, {:.0} Hz, {} overruns",
                    stats.frames_sent,
                    stats.transmit_errors,
                    stats.effective_rate_hz,
                    stats.overruns
                );
                last_stats = stats;
            }
            Some(_) => {}
            None => {
                if worker.is_finished() {
                    break;
                }
            }
        }
    }

    match worker.join() {
        Ok(result) => result?,
        Err(_) => bail!("scheduler thread panicked"),
    }

    report(&last_stats);
    if let Some(capture) = &dry_run_capture {
        tracing::info!(
            "Dry run encoded {} frames ({} bytes)",
            capture.sent_count(),
            capture.bytes_encoded()
        );
    }

    if let Some(error) = failure {
        bail!("publisher failed to start: {}", error);
    }
    Ok(())
}

fn report(stats: &PublishStats) {
    if stats.ticks == 0 && stats.frames_sent == 0 {
        return;
    }
    tracing::info!(
        "Sent {} frames ({:.1}% ok), {} transmit errors, {} overruns (worst {} us)",
        stats.frames_sent,
        stats.success_rate(),
        stats.transmit_errors,
        stats.overruns,
        stats.max_lateness_us
    );
}

/// Install the stdout subscriber, plus a file layer when `log_file` is set
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().context("log file path has no file name")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,svpub_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}
