//! Registry host binary.
//!
//! Loads configuration, runs the bootstrap sequence against the set of
//! registered plugin exports, and serves. Embedders who want to ship
//! plugins compiled in build their own binary against the library and
//! register exports before calling [`pkg_registry::boot`].

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use tokio::net::TcpListener;

use pkg_registry::bootstrap::{self, ExitCode, PluginSet};
use pkg_registry::config::load_config;
use pkg_registry::observability::{logging, metrics};
use pkg_registry::RegistryServer;

#[derive(Parser, Debug)]
#[command(name = "pkg-registry", version, about = "Plugin-oriented package registry server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "registry.toml")]
    config: PathBuf,

    /// Validate configuration and plugin load order, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pkg-registry starting");

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "failed to load configuration");
            exit(e.exit_code().code());
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    // The stock binary ships no plugins; exports come from embedders.
    let set = PluginSet::new();

    if cli.check {
        if let Err(e) = bootstrap::check(&config, &set) {
            tracing::error!(error = %e, subsystem = e.exit_code().subsystem(), "check failed");
            exit(e.exit_code().code());
        }
        tracing::info!("configuration and load order OK");
        return;
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let registry = match bootstrap::boot(config, set).await {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(error = %e, subsystem = e.exit_code().subsystem(), "bootstrap failed");
            exit(e.exit_code().code());
        }
    };

    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_address, error = %e, "failed to bind listener");
            exit(ExitCode::BindFailed.code());
        }
    };

    let server = RegistryServer::new(registry);
    if let Err(e) = server.run(listener).await {
        tracing::error!(error = %e, "server error");
        exit(ExitCode::ServeFailed.code());
    }

    tracing::info!("Shutdown complete");
}
