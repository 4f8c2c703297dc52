//! Treegate - serves an allocation tree over an S3 style bucket / object API
//!
//! The top-level directories of the allocation are buckets, the allocation
//! root itself is the configurable root bucket, and every file is an object.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

mod api;
mod config;
mod state;

use config::{AllocationConfig, AppConfig};
use state::AppState;

/// Treegate - bucket / object gateway over an allocation tree
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (defaults to ~/.config/treegate/treegate.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on for HTTP requests
    #[arg(short, long)]
    port: Option<u16>,

    /// Serve the allocation stored in this directory instead of the configured one
    #[arg(short, long)]
    allocation: Option<PathBuf>,

    /// Directory for staging object reads
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Bucket name presented for the allocation root
    #[arg(long)]
    root_bucket: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply command line overrides on top of the loaded config
    fn apply(self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.listen_addr = SocketAddr::new(config.listen_addr.ip(), port);
        }
        if let Some(path) = self.allocation {
            config.allocation = AllocationConfig::Local { path };
        }
        if let Some(staging_dir) = self.staging_dir {
            config.gateway.staging_dir = Some(staging_dir);
        }
        if let Some(root_bucket) = self.root_bucket {
            config.gateway.root_bucket_name = root_bucket;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = AppConfig::resolve_path(args.config.as_deref())?;
    let mut config = match &config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    args.apply(&mut config);

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_level: tracing::Level = config.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    tracing::info!("Starting treegate");
    match &config_path {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::info!("No config file found, using defaults"),
    }

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create gateway state: {}", e);
            std::process::exit(1);
        }
    };

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let graceful_shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {}", e);
            // keep the sender alive so the server is not shut down
            std::future::pending::<()>().await;
        }
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    };
    tokio::spawn(graceful_shutdown);

    let router = api::router(state);

    tracing::info!("Gateway listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    let mut server_rx = shutdown_rx.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = server_rx.changed().await;
        })
        .await?;

    tracing::info!("Gateway shutdown complete");
    Ok(())
}
