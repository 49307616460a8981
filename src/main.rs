//! Fragments - owner-scoped typed content storage with format conversion
//!
//! Serves the fragments REST API and offers a few operator commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fragments::{
    api::build_app,
    auth::BasicAuth,
    config::{FragmentsConfig, StorageBackendKind},
    storage::FragmentStore,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fragments")]
#[command(author = "Fragments Team")]
#[command(version)]
#[command(about = "Owner-scoped typed content storage with format conversion")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FRAGMENTS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Storage backend: memory or fs (overrides config)
        #[arg(long)]
        storage: Option<StorageBackendKind>,

        /// Data directory for the fs backend (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Run diagnostics
    Doctor,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => FragmentsConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FragmentsConfig::default(),
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            storage,
            data_dir,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(storage) = storage {
                config.storage.backend = storage;
            }
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            run_server(config).await?;
        }
        Commands::Doctor => {
            run_doctor(&config).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("fragments={},tower_http={}", log_level, log_level).into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(config: FragmentsConfig) -> Result<()> {
    tracing::info!("Starting Fragments API");

    if config.auth.users.is_empty() {
        tracing::warn!("No users configured; every /v1 request will be rejected");
    }

    let store = FragmentStore::open(&config.storage)
        .await
        .context("Failed to open fragment storage")?;
    let auth = BasicAuth::new(&config.auth);
    let app = build_app(store, auth, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Fragments API listening on {}. Press Ctrl+C to stop.", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down...");
}

async fn run_doctor(config: &FragmentsConfig) -> Result<()> {
    println!("Fragments Doctor");
    println!();

    println!("Checking storage...");
    match config.storage.backend {
        StorageBackendKind::Memory => {
            println!("  ℹ Memory backend selected (data is lost on restart)");
        }
        StorageBackendKind::Fs => {
            let dir = &config.storage.data_dir;
            match FragmentStore::open(&config.storage).await {
                Ok(_) => println!("  ✓ Data directory usable: {}", dir.display()),
                Err(e) => println!("  ✗ Data directory {} unusable: {}", dir.display(), e),
            }
        }
    }

    println!();
    println!("Checking users...");
    let auth = BasicAuth::new(&config.auth);
    if auth.user_count() == 0 {
        println!("  ✗ No users configured; add [[auth.users]] entries");
    } else {
        println!(
            "  ✓ {} user(s) configured for realm \"{}\"",
            auth.user_count(),
            auth.realm()
        );
    }

    println!();
    println!("Doctor check complete!");

    Ok(())
}

fn show_config(config: Option<&FragmentsConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    println!("{}", config.to_toml()?);
    Ok(())
}
