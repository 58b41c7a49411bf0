//! syncbox-agent binary: serve the replication protocol for one
//! destination directory

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::info;

use syncbox_agent::app;
use syncbox_core::config::{CONFIG_FILE, Config};
use syncbox_transport::FsSink;

#[derive(Parser)]
#[command(name = "syncbox-agent")]
#[command(version)]
#[command(about = "Destination-side agent for syncbox directory replication")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the replication endpoints
    Serve {
        /// Destination directory (overrides the config file)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,

        /// Config file path
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },

    /// Show version and exit
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Version => {
            eprintln!("syncbox-agent {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Serve {
            root,
            listen,
            config,
        } => {
            serve(root, listen, &config).await?;
        }
    }

    Ok(())
}

async fn serve(root: Option<PathBuf>, listen: SocketAddr, config_path: &PathBuf) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => Config::load(config_path)?.resolved_destination_directory()?,
    };

    // The destination must exist before we accept writes into it
    if !root.is_dir() {
        return Err(eyre!(
            "destination directory {} does not exist",
            root.display()
        ));
    }

    info!("serving {} on {listen}", root.display());

    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app(FsSink::new(root)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("agent shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
