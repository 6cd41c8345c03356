//! Optical Scan CLI
//!
//! Command-line interface for exercising the scan loop against the mock
//! camera and a scripted decoder.

use clap::Parser;
use optical_scan::{
    capture::{DeviceId, MockAcquisition},
    decode::ScriptedDecoder,
    metrics::ScanMetrics,
    scan::{FileConfig, ScanLoop, ScanState},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "optical-scan", version, about = "Scan codes from a live camera stream")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Delay between decode attempts in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Exact camera device to open.
    #[arg(long)]
    device: Option<String>,

    /// Stop after the first decoded code.
    #[arg(long)]
    once: bool,

    /// Halt instead of retrying when a frame holds no code.
    #[arg(long)]
    no_retry_not_found: bool,

    /// Halt instead of retrying on corrupt or malformed codes.
    #[arg(long)]
    no_retry_checksum: bool,

    /// Decoder script: miss, checksum, format[:msg], fail[:msg], ok:<text>.
    #[arg(long, default_value = "miss,miss,ok:ABC123")]
    script: String,

    /// List video input devices and exit.
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Optical Scan v{}", optical_scan::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(interval) = cli.interval_ms {
        config.scan.time_between_scans_ms = interval;
    }
    if cli.no_retry_not_found {
        config.scan.retry.retry_on_not_found = false;
    }
    if cli.no_retry_checksum {
        config.scan.retry.retry_on_checksum_or_format = false;
    }
    if cli.once {
        config.output.continuous = false;
    }
    if let Some(device) = cli.device {
        config.source.device_id = Some(DeviceId::from(device));
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let decoder = match ScriptedDecoder::parse(&cli.script) {
        Ok(decoder) => Arc::new(decoder),
        Err(e) => {
            eprintln!("Invalid decoder script: {}", e);
            std::process::exit(2);
        }
    };
    let acquisition = Arc::new(
        MockAcquisition::new().with_surface_size(config.source.width, config.source.height),
    );
    info!("This is a demonstration using mock camera input");

    let metrics = match ScanMetrics::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };
    spawn_metrics_server(&config, &metrics);

    let mut scanner = match ScanLoop::with_config(acquisition, decoder, config.scan.clone()) {
        Ok(scanner) => scanner.with_metrics(metrics.clone()),
        Err(e) => {
            eprintln!("Invalid scan configuration: {}", e);
            std::process::exit(1);
        }
    };

    if cli.list_devices {
        match scanner.list_video_input_devices().await {
            Ok(devices) => {
                for device in devices {
                    println!("{}\t{}", device.id, device.label);
                }
            }
            Err(e) => {
                eprintln!("Failed to list devices: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let stop = Arc::new(Notify::new());
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.notify_one()) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let device = config.source.device_id.clone();
    if config.output.continuous {
        scanner
            .decode_from_input_video_device(
                |payload| println!("Decoded: {}", payload.text),
                device,
                None,
            )
            .await;

        let mut state = scanner.subscribe_state();
        tokio::select! {
            _ = stop.notified() => info!("Interrupted, stopping scan"),
            _ = state.wait_for(|s| *s == ScanState::Idle) => info!("Scan session halted"),
        }
    } else {
        tokio::select! {
            result = scanner.decode_once_from_input_video_device(device, None) => match result {
                Ok(payload) => println!("Decoded: {}", payload.text),
                Err(e) => warn!("Scan failed: {}", e),
            },
            _ = stop.notified() => info!("Interrupted, stopping scan"),
        }
    }

    scanner.reset().await;
    info!("Done. {} decode attempts", metrics.decode_attempts());
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(config: &FileConfig, metrics: &ScanMetrics) {
    use optical_scan::metrics::{MetricsServer, MetricsServerConfig};

    if config.output.metrics_port == 0 {
        return;
    }
    let server = MetricsServer::new(
        MetricsServerConfig::with_port(config.output.metrics_port),
        metrics.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            warn!("Metrics server failed: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(config: &FileConfig, _metrics: &ScanMetrics) {
    if config.output.metrics_port != 0 {
        info!("Metrics server disabled (build with --features metrics)");
    }
}
