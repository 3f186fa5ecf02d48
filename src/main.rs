//! Service proxy.
//!
//! Routes each inbound request by its Host header to a registered service and
//! forwards it with that service's credentials attached.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ proxy::dispatcher ──▶ routing::resolver (Host → service ID)
//!                                          │
//!                                          ├──▶ proxy::cache ──miss──▶ metadata + authorization::factory
//!                                          │
//!                                          ├──▶ authorization::strategy (Basic / OAuth / CSRF)
//!                                          │
//!                                          ├──▶ proxy::forward ──────────────────────────────▶ Target
//!                                          │                                                  Service
//!                                          └──▶ proxy::retrier (first 403: reset, rebuild, replay)
//!     Client Response
//!     ◀───────────── http::response (stream, strip hop-by-hop)
//!
//!     Cross-cutting: config (TOML + watcher), observability (tracing, metrics),
//!                    lifecycle (signals, shutdown), resilience (timeouts)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use service_proxy::config::{load_config, watcher::ConfigWatcher, ProxyConfig};
use service_proxy::http::{serve_invalid_state, HttpServer};
use service_proxy::lifecycle::{wait_for_shutdown_signal, Shutdown};
use service_proxy::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "service-proxy")]
#[command(about = "Host-routed reverse proxy with per-service credential injection", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the service table when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        timeout_secs = config.proxy.timeout_secs,
        cache_ttl_secs = config.proxy.cache_ttl_secs,
        skip_verify = config.proxy.skip_verify,
        "Configuration loaded"
    );
    if config.proxy.skip_verify {
        tracing::warn!("TLS certificate verification is disabled for outbound calls");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // keep the watcher alive for the lifetime of the server
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            shutdown.trigger();
        });
    }

    match HttpServer::new(config) {
        Ok(server) => server.run(listener, config_updates, server_shutdown).await?,
        Err(e) => serve_invalid_state(listener, e.to_string(), server_shutdown).await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
