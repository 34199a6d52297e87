//! Remock learning proxy entrypoint.
//!
//! Loads configuration, wires the recording store, event bus, metrics
//! aggregator, learning proxy and admin API together, then runs until
//! interrupted.

use clap::Parser;
use remock_proxy::admin_api::AdminApiServer;
use remock_proxy::config::Config;
use remock_proxy::events::EventBus;
use remock_proxy::metrics::MetricsAggregator;
use remock_proxy::proxy::LearningProxyServer;
use remock_proxy::recording::RecordingService;
use remock_proxy::store::RequestStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "remock-proxy")]
#[command(author, version, about = "Recording reverse proxy for API mocking")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "REMOCK_CONFIG", default_value = "remock.yaml")]
    config: String,

    /// Override the proxy listen port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_file(Path::new(&args.config))?;
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    info!(
        project = %config.project,
        target = %config.target.url,
        "Starting remock learning proxy"
    );

    let store = Arc::new(RequestStore::open(Path::new(&config.store.path))?);
    let recorder = Arc::new(RecordingService::new(store));
    let events = Arc::new(EventBus::new());
    let metrics = Arc::new(MetricsAggregator::new());
    metrics.attach(&events);

    let proxy = Arc::new(LearningProxyServer::new(
        &config,
        Arc::clone(&recorder),
        Arc::clone(&events),
    )?);

    let admin_addr: SocketAddr =
        format!("{}:{}", config.listen.bind_address, config.admin.port).parse()?;
    let admin = AdminApiServer::new(admin_addr, Arc::clone(&metrics));
    tokio::spawn(async move {
        if let Err(e) = admin.run().await {
            error!("Admin API server failed: {}", e);
        }
    });

    proxy.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    proxy.stop().await?;

    Ok(())
}
