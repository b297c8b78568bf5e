//! Ephemera CLI - administration of session stores

use anyhow::Context;
use clap::{Parser, Subcommand};
use ephemera_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, performance,
    system_clock, EphemeraConfig,
};
use ephemera_sessions::{CleanupScheduler, SessionManager};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ephemera")]
#[command(about = "Short-lived isolated sessions over a TTL key-value store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration to a file
    InitConfig {
        /// Target path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List live sessions
    List {
        /// Only sessions owned by this caller
        #[arg(long)]
        owner: Option<String>,

        /// Print summaries as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Run a single cleanup pass
    Cleanup,

    /// Run cleanup periodically until Ctrl-C
    Reap {
        /// Override `cleanup.interval_secs`
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path, force } = &cli.command {
        return init_config(path, *force);
    }

    let mut config =
        EphemeraConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting ephemera CLI v{}", env!("CARGO_PKG_VERSION"));

    let manager = build_manager(&config).await?;

    match cli.command {
        Commands::InitConfig { .. } => {}
        Commands::List { owner, json } => handle_list(&manager, owner.as_deref(), json).await?,
        Commands::Cleanup => {
            log_operation_start!("cleanup");
            match performance::measure_async("cleanup", manager.cleanup()).await {
                Ok(reaped) => {
                    log_operation_success!("cleanup", reaped = reaped);
                    println!("Reaped {} session(s)", reaped);
                }
                Err(e) => {
                    log_operation_error!("cleanup", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Reap { interval } => {
            let interval = interval.unwrap_or(config.cleanup.interval_secs);
            handle_reap(manager, interval).await?;
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ephemera");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let config = persistent_config(&data_dir);
    config.save_to_file(path)?;
    println!("Configuration written to {}", path.display());
    println!("Sessions will be stored at {}", config.store.url);
    Ok(())
}

/// Defaults with a SQLite store under `data_dir`, so sessions outlive the process
fn persistent_config(data_dir: &Path) -> EphemeraConfig {
    let mut config = EphemeraConfig::default();
    config.store.url = format!("sqlite://{}", data_dir.join("sessions.db").display());
    config
}

async fn build_manager(config: &EphemeraConfig) -> anyhow::Result<SessionManager> {
    if config.store.url == "memory" {
        warn!("Using the in-memory store: sessions are lost when this command exits");
    }
    let clock = system_clock();
    let store = ephemera_store::open(&config.store, clock.clone())
        .await
        .with_context(|| format!("Failed to open store at {}", config.store.url))?;
    let manager = SessionManager::from_config(config, store, clock)?;
    manager
        .health_check()
        .await
        .context("Session store is not reachable")?;

    Ok(manager)
}

async fn handle_list(
    manager: &SessionManager,
    owner: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let summaries = manager.list_summaries(owner).await?;

    if json {
        for summary in &summaries {
            println!("{}", serde_json::to_string(summary)?);
        }
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No live sessions");
        return Ok(());
    }

    println!(
        "{:<36}  {:<6}  {:<6}  {:<20}  {}",
        "ID", "ACCESS", "STATUS", "EXPIRES", "DATA SOURCE"
    );
    for summary in summaries {
        println!(
            "{:<36}  {:<6}  {:<6}  {:<20}  {}",
            summary.id,
            summary.access_level.to_string(),
            summary.status.as_str(),
            summary.expires_at.format("%Y-%m-%d %H:%M:%S"),
            summary.data_source_ref
        );
    }
    Ok(())
}

async fn handle_reap(manager: SessionManager, interval_secs: u64) -> anyhow::Result<()> {
    if interval_secs == 0 {
        anyhow::bail!("Cleanup interval must be greater than 0");
    }

    let scheduler = CleanupScheduler::start(manager, Duration::from_secs(interval_secs));
    println!(
        "Reaping expired sessions every {}s, press Ctrl-C to stop",
        interval_secs
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    scheduler.shutdown().await;
    Ok(())
}
