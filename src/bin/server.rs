//! stgblock Server Binary
//!
//! Starts the TCP storage server.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use stgblock::network::Server;
use stgblock::{Config, FileEngine};

/// stgblock Server
#[derive(Parser, Debug)]
#[command(name = "stgblock-server")]
#[command(about = "Single-node block storage service")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:8001")]
    listen: String,

    /// Directory for block files (overrides STG_BLOCKS_DIR)
    #[arg(short, long)]
    blocks_dir: Option<String>,

    /// Path of the JSON index file (overrides STG_METADATA_FILE)
    #[arg(short = 'f', long)]
    metadata_file: Option<String>,

    /// Maximum concurrent client sessions
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stgblock=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("stgblock Server v{}", stgblock::VERSION);

    // CLI args win over environment, environment over defaults.
    let mut builder = Config::builder()
        .apply_env()
        .listen_addr(args.listen.clone())
        .max_connections(args.max_connections);
    if let Some(dir) = &args.blocks_dir {
        builder = builder.blocks_dir(dir);
    }
    if let Some(path) = &args.metadata_file {
        builder = builder.metadata_file(path);
    }
    let config = builder.build();

    tracing::info!(
        blocks_dir = %config.blocks_dir.display(),
        metadata_file = %config.metadata_file.display(),
        listen = %config.listen_addr,
        "configuration resolved"
    );

    // Open engine
    let engine = match FileEngine::open(&config) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    // Collect blocks orphaned by interrupted writes before serving traffic.
    match engine.reap_orphans() {
        Ok(0) => {}
        Ok(n) => tracing::info!(reaped = n, "removed orphan blocks"),
        Err(e) => tracing::warn!(error = %e, "orphan reap failed"),
    }

    tracing::info!(files = engine.file_count(), "engine initialized");

    let mut server = Server::new(config, engine);

    // SIGINT/SIGTERM stop the accept loop; sessions drain.
    let handle = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("termination signal received, shutting down");
        handle.shutdown();
    }) {
        tracing::error!("failed to install signal handler: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = server.run() {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("server stopped");
}
