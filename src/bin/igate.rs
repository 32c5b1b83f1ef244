//! iGate daemon
//!
//! Runs multimon-ng, filters what it decodes and streams it to APRS-IS.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use multimon_igate::{
    beacon::Beacon,
    config::AppConfig,
    constants::*,
    demod::Supervisor,
    logging,
    network::{DeliveryChannel, TcpDialer},
    pipeline::FramePipeline,
};

const STATS_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(name = "igate", version, about = "Receive-only APRS iGate fed by multimon-ng")]
struct Cli {
    /// Configuration file (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let path = cli
        .config
        .or_else(AppConfig::default_path)
        .context("no configuration file given and no default location available")?;
    let config = AppConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    tracing::info!("Starting {} {}", SOFTWARE_NAME, SOFTWARE_VERSION);

    let Services {
        mut channel,
        mut supervisor,
        mut beacon,
    } = start_services(&config)?;

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);
    let mut stats_timer = tokio::time::interval(STATS_INTERVAL);
    stats_timer.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = stats_timer.tick() => {
                let stats = channel.stats();
                tracing::info!(
                    "Stats: {} frames sent, {} dropped, {} reconnects, state {:?}, decoder {}",
                    stats.frames_sent,
                    stats.frames_dropped,
                    stats.reconnects,
                    channel.state(),
                    if supervisor.is_running() { "running" } else { "stopped" }
                );
            }
        }
    }

    tracing::info!("Stopping {}", SOFTWARE_NAME);
    if let Some(beacon) = beacon.as_mut() {
        beacon.stop();
    }
    supervisor.stop();
    channel.stop();

    let stats = channel.stats();
    tracing::info!(
        "Sent {} frames, dropped {} ({:.1}% loss), {} reconnects",
        stats.frames_sent,
        stats.frames_dropped,
        stats.loss_rate() * 100.0,
        stats.reconnects
    );
    Ok(())
}

/// Running workers of the daemon
struct Services {
    channel: DeliveryChannel,
    supervisor: Supervisor,
    beacon: Option<Beacon>,
}

fn start_services(config: &AppConfig) -> multimon_igate::Result<Services> {
    let dialer = TcpDialer::new(config.login(), config.preferred_protocol);
    let channel = DeliveryChannel::start(
        config.channel_config(),
        config.gateway_cycle()?,
        dialer,
        tracing::info_span!("aprs-is"),
    )?;

    let pipeline = FramePipeline::new(config.charset, config.path_filter(), channel.sender());
    let mut supervisor = config.supervisor()?;
    if let Err(e) = supervisor.start(
        move |text| {
            pipeline.handle(text);
        },
        tracing::info_span!("multimon"),
    ) {
        // keep running so beacons still go out
        tracing::error!("Decoder not started: {}", e);
    }

    let beacon = match config.beacon.clone() {
        Some(beacon_config) => Some(Beacon::start(
            config.callsign.clone(),
            beacon_config,
            channel.sender(),
            tracing::info_span!("beacon"),
        )?),
        None => None,
    };

    Ok(Services {
        channel,
        supervisor,
        beacon,
    })
}

/// Resolves on Ctrl-C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
