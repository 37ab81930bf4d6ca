//! Probe-based Prometheus exporter for JSON endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use json_exporter::config::LogFormat;
use json_exporter::{ExporterConfig, ExporterMetrics, HttpFetcher, HttpServer, Prober};

/// Prometheus exporter that probes JSON endpoints.
#[derive(Parser, Debug)]
#[command(name = "json-exporter")]
#[command(about = "Expose numeric values of remote JSON documents as Prometheus gauges")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// The address to listen on for HTTP requests (overrides config).
    #[arg(long, visible_alias = "listen")]
    listen_address: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Override listen address from CLI
    if let Some(listen) = args.listen_address {
        config.server.listen = listen;
    }

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level = level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("json_exporter={}", log_level).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!("Starting JSON exporter");

    let listen_addr: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // One pooled client shared by every probe
    let fetcher = Arc::new(HttpFetcher::new(&config.probe)?);
    let metrics = Arc::new(ExporterMetrics::new());
    let prober = Arc::new(Prober::new(fetcher, &config, metrics.clone()));

    info!(
        timeout_secs = config.probe.timeout_secs,
        max_depth = config.probe.max_depth,
        max_idle_connections = config.probe.max_idle_connections,
        insecure_skip_verify = config.probe.insecure_skip_verify,
        "Probe settings"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(prober, metrics.clone(), listen_addr, config.server.clone());
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!(samples = metrics.sample_count(), "Exporter stopped");
    Ok(())
}

/// Resolve when the process receives SIGTERM.
async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
