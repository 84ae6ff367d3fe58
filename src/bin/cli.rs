//! Almanax mapper CLI
//!
//! Long-running watcher plus one-shot map and push commands.

use std::path::PathBuf;

use almanax_mapper::{
    error::Result,
    models::Config,
    pipeline::{self, PushRequest},
    shutdown::Shutdown,
    storage::LocalStorage,
};
use clap::{Parser, Subcommand};

/// Almanax offering mapper
#[derive(Parser, Debug)]
#[command(
    name = "almanax",
    version,
    about = "Maps almanax dates to offering receivers and publishes the dataset"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "almanax.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the dataset version and map every new release
    Watch,

    /// Map and publish one release, without touching the version marker
    Map {
        /// Release tag to map
        #[arg(long)]
        version: String,
    },

    /// Push a date range to the almanax API
    Push {
        /// First date, YYYY-MM-DD
        #[arg(long)]
        from: String,

        /// Last date, YYYY-MM-DD (included)
        #[arg(long)]
        to: String,

        /// Snapshot suffix, one per deployment
        #[arg(long, default_value = "main")]
        appendix: String,

        /// API key (defaults to ALMANAX_API_KEY)
        #[arg(long)]
        auth_key: Option<String>,
    },

    /// Validate configuration
    Validate,

    /// Show the work directory and the last seen version
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        log::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();

    match cli.command {
        Command::Watch => {
            let shutdown = Shutdown::shared();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Ctrl+C received, shutting down");
                    signal.request();
                }
            });

            log::info!("Almanax watcher starting work_dir={}", config.work_dir.display());
            pipeline::run_watch(&config, shutdown).await?;
            log::info!("Almanax watcher stopped");
        }

        Command::Map { version } => {
            let asset = pipeline::run_map(&config, &version).await?;
            log::info!("Published {} on {}", asset.name, version);
        }

        Command::Push {
            from,
            to,
            appendix,
            auth_key,
        } => {
            if let Some(key) = auth_key {
                config.api.auth_key = Some(key);
            }
            let request = PushRequest { from, to, appendix };
            let outcome = pipeline::run_push(&config, &request).await?;
            log::info!(
                "Pushed {} days, {} unchanged",
                outcome.pushed,
                outcome.unchanged
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
            if config.release.token.trim().is_empty() {
                log::warn!("No release token set, watch and map will refuse to start");
            }
        }

        Command::Info => {
            let storage = LocalStorage::new(config.work_dir.clone());
            log::info!("Work directory: {}", config.work_dir.display());
            log::info!("Version marker: {}", config.version_file().display());

            let version = storage.read_version().await?;
            if version.is_empty() {
                log::info!("No version seen yet.");
            } else {
                log::info!("Last seen version: {}", version);
            }
            log::info!("Mapping horizon: {}", config.mapping_horizon);
            log::info!("Poll interval: {}", config.watcher.poll_interval);
        }
    }

    Ok(())
}
