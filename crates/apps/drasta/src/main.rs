//! Drasta - relay a Twitter account's posts into a Telegram channel
//!
//! Polls the account's timeline and forwards every new post, oldest first.
//! With `--dig`/`--dig-all` it backfills older posts instead and exits.
//!
//! Exit codes: 0 normal stop, 1 forced stop (second Ctrl+C), 2 fatal
//! configuration or startup error.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use relay::{
    ImportTarget, InMemoryStore, Relay, RelayConfig, RelayStore, Shutdown, ShutdownRequest,
    SqliteStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_FORCED: i32 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "drasta")]
#[command(about = "Relay a Twitter account's posts into a Telegram channel")]
#[command(version)]
struct Args {
    /// Import the N most recent posts into the channel, then exit (0 disables)
    #[arg(short = 'g', long, value_name = "N", conflicts_with = "dig_all")]
    dig: Option<usize>,

    /// Import every post the timeline still serves, then exit
    #[arg(short = 'w', long)]
    dig_all: bool,

    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn dig_target(&self) -> Option<ImportTarget> {
        if self.dig_all {
            Some(ImportTarget::All)
        } else {
            self.dig.filter(|n| *n > 0).map(ImportTarget::Count)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    // Bootstrap config and data directories
    if let Err(e) = config::init() {
        warn!("Failed to initialize app directories: {:#}", e);
    }

    let config_path = config::resolve_config_file(&args.config);
    let cfg = RelayConfig::load(&config_path)?;
    info!("Loaded config from {}", config_path.display());

    let store = open_store(&cfg);
    let shutdown = install_shutdown_handler(store.clone())?;
    let mut relay = Relay::from_config(&cfg, store)?;

    if let Some(target) = args.dig_target() {
        match relay.dig(target, &shutdown) {
            Ok(Some(id)) => println!("Last tweet id: {}", id),
            Ok(None) => println!("Nothing to import"),
            Err(e) if shutdown.is_requested() => warn!("{:#}", e),
            Err(e) => return Err(e),
        }
        return Ok(());
    }

    relay.run(&shutdown)
}

/// First Ctrl+C stops gracefully, the second exits at once
fn install_shutdown_handler(store: Arc<dyn RelayStore>) -> Result<Shutdown> {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    ctrlc::set_handler(move || match handle.request() {
        ShutdownRequest::Graceful => {
            warn!("Stopping after the current step (press Ctrl+C again to force)")
        }
        ShutdownRequest::Forced => {
            warn!("Forced stop!");
            if let Err(e) = store.drop_staging() {
                error!("Failed to drop staging area: {:#}", e);
            }
            std::process::exit(EXIT_FORCED);
        }
    })
    .context("Failed to set Ctrl+C handler")?;
    Ok(shutdown)
}

/// Open the SQLite store, falling back to memory when it is unavailable
fn open_store(cfg: &RelayConfig) -> Arc<dyn RelayStore> {
    let opened = cfg.resolved_database_path().and_then(|path| {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            config::ensure_dir(parent)?;
        }
        info!("Using database at {}", path.display());
        SqliteStore::new(&path)
    });

    match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Database unavailable ({:#}), not using data persistence!", e);
            Arc::new(InMemoryStore::new())
        }
    }
}
