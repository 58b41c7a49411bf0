//! syncbox: Polling directory replication
//!
//! Mirrors a local source directory to a remote destination by polling for
//! changes and replaying them against the destination agent:
//! - Inode-based diffing so renames travel as renames, not delete/create
//! - Full-sync seeding of an empty destination at startup
//! - Four-operation wire protocol (create, delete, rename, update)

mod debug_log;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand, builder::Styles};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use syncbox_core::config::CONFIG_FILE;
use syncbox_core::{ChangePoller, Config, EventDispatcher, Scanner, Snapshot};
use syncbox_transport::HttpSink;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

#[derive(Parser)]
#[command(name = "syncbox")]
#[command(version)]
#[command(styles = STYLES)]
#[command(about = "Mirror a directory to a remote agent by polling for changes")]
#[command(long_about = r#"
syncbox replicates a local source directory to a remote destination.

How it works:
  • Polls the source tree on a fixed interval
  • Diffs snapshots by inode, so renames are detected as renames
  • Replays create/modify/rename/delete against the destination agent

Examples:
  syncbox run                             Replicate using syncbox.toml
  syncbox run -s ./data -u http://host:8080
  syncbox sync -s ./data -u http://host:8080   One-shot full sync
  syncbox scan ./data                     Inspect a snapshot
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Continuously replicate the source directory to the agent
    Run {
        /// Source directory (overrides the config file)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Agent base URL (overrides the config file)
        #[arg(short, long)]
        url: Option<String>,

        /// Poll interval in milliseconds (overrides the config file)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Config file path
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },

    /// Push every source entry to the agent once, then exit
    Sync {
        /// Source directory (overrides the config file)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Agent base URL (overrides the config file)
        #[arg(short, long)]
        url: Option<String>,

        /// Config file path
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },

    /// Scan a directory and print its snapshot
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Output format (json, summary)
        #[arg(short, long, default_value = "summary")]
        format: String,
    },

    /// Show version and build info
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let session = debug_log::init(cli.verbose);
    info!("debug log: {}", session.log_path.display());

    match cli.command {
        Commands::Version => {
            eprintln!("syncbox {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Scan { path, format } => {
            scan_command(&path, &format)?;
        }
        Commands::Sync {
            source,
            url,
            config,
        } => {
            sync_command(source, url, &config).await?;
        }
        Commands::Run {
            source,
            url,
            interval,
            config,
        } => {
            run_command(source, url, interval, &config).await?;
        }
    }

    drop(session.guard);
    Ok(())
}

fn scan_command(path: &PathBuf, format: &str) -> Result<()> {
    info!("scanning {}...", path.display());

    let records = Scanner::new(path).scan()?;
    let snapshot = Snapshot::from_records(records);

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&snapshot)?;
            eprintln!("{json}");
        }
        _ => {
            eprintln!("Entries: {}", snapshot.len());
            let total_size: usize = snapshot.files.values().map(|r| r.contents.len()).sum();
            eprintln!("Total size: {total_size} bytes");

            if snapshot.len() <= 20 {
                eprintln!("\nEntries:");
                for (path, record) in &snapshot.files {
                    let kind = if record.is_directory { "dir " } else { "file" };
                    eprintln!("  {kind} {} ({} bytes)", path.display(), record.contents.len());
                }
            }
        }
    }

    Ok(())
}

/// Resolve config file + flag overrides into the effective settings
fn effective_config(
    config_path: &PathBuf,
    source: Option<PathBuf>,
    url: Option<String>,
    interval: Option<u64>,
) -> Result<Config> {
    let mut config = Config::load(config_path)?;
    if let Some(source) = source {
        config.source_directory = source;
    }
    if let Some(url) = url {
        config.base_url = url;
    }
    if let Some(interval) = interval {
        config.poll_interval_ms = interval;
    }
    if config.source_directory.as_os_str().is_empty() {
        return Err(eyre!(
            "no source directory configured (set source-directory in {} or pass --source)",
            config_path.display()
        ));
    }
    Ok(config)
}

/// Wait for the agent, build the baseline and seed the destination.
/// Returns the poller and dispatcher, ready to enter the poll loop.
async fn prepare(config: &Config) -> Result<(ChangePoller, EventDispatcher)> {
    let source_dir = config.resolved_source_directory()?;
    if !source_dir.is_dir() {
        return Err(eyre!(
            "source directory {} does not exist",
            source_dir.display()
        ));
    }

    let sink = Arc::new(HttpSink::new(config.base_url.clone()));
    info!("waiting for agent at {}", config.base_url);
    sink.wait_until_live(Duration::from_millis(250)).await;
    info!("agent is live");

    let mut scanner = Scanner::new(&source_dir);
    for pattern in &config.exclude {
        scanner = scanner.exclude(pattern);
    }

    let poller = ChangePoller::new(scanner)?;
    info!("tracking {} entries", poller.tracked());

    let dispatcher = EventDispatcher::new(sink, &source_dir.to_string_lossy());

    // Seed the destination so it does not wait for the first diff
    let mut seeded = 0usize;
    for event in poller.baseline_events() {
        match dispatcher.dispatch(&event).await {
            Ok(()) => seeded += 1,
            Err(err) => error!("seeding {}: {err}", event.path().display()),
        }
    }
    info!("seeded destination with {seeded} entries");

    Ok((poller, dispatcher))
}

async fn sync_command(
    source: Option<PathBuf>,
    url: Option<String>,
    config_path: &PathBuf,
) -> Result<()> {
    let config = effective_config(config_path, source, url, None)?;
    prepare(&config).await?;
    info!("sync complete");
    Ok(())
}

async fn run_command(
    source: Option<PathBuf>,
    url: Option<String>,
    interval: Option<u64>,
    config_path: &PathBuf,
) -> Result<()> {
    let config = effective_config(config_path, source, url, interval)?;
    let (poller, dispatcher) = prepare(&config).await?;

    // Capacity 1: the poll loop blocks until the dispatcher consumes,
    // which is the pipeline's only backpressure.
    let (tx, rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();

    info!(
        "polling for changes every {}ms (Ctrl+C to stop)",
        config.poll_interval_ms
    );
    let poll_task = tokio::spawn(poller.run(tx, config.poll_interval(), cancel.clone()));
    let dispatch_task = tokio::spawn(dispatcher.run(rx, cancel.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    let _ = tokio::join!(poll_task, dispatch_task);
    Ok(())
}
