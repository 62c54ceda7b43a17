//! dealwatch CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dealwatch::{
    error::Result,
    models::Config,
    pipeline::{self, RunOptions},
    services::{ConsoleTransport, Notifier, TelegramTransport, Transport, build_fetcher},
    storage::LocalStateStore,
};

/// dealwatch - Flight Deal Watcher
#[derive(Parser, Debug)]
#[command(
    name = "dealwatch",
    version,
    about = "Watches a flight-deal site and forwards new offers to Telegram"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover, resolve and notify new or changed listings
    Run {
        /// Print messages instead of sending them; commit nothing
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of listings to process (default: site.max_listings)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Resolve a single detail page and print its message
    Inspect {
        /// Detail page address
        url: String,
    },

    /// Validate the configuration file
    Validate,

    /// Show state file statistics
    State,
}

/// Initialize logging; `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load_or_default(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    log::info!("dealwatch starting...");

    let config = match cli.command {
        Command::Validate => {
            pipeline::run_validate(&cli.config)?;
            log::info!("All validations passed!");
            return Ok(());
        }
        _ => loaded?,
    };

    if cli.config.exists() {
        log::info!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!("No configuration at {}; using defaults", cli.config.display());
    }

    match cli.command {
        Command::Run { dry_run, limit } => {
            config.validate()?;

            let transport: Box<dyn Transport> = if dry_run {
                Box::new(ConsoleTransport)
            } else {
                Box::new(TelegramTransport::from_config(
                    &config.notifier,
                    config.crawler.timeout_secs,
                )?)
            };
            let notifier = Notifier::new(transport, &config.notifier, config.message_template.clone());
            let fetcher = build_fetcher(&config.crawler)?;
            let mut store = LocalStateStore::open(&config.paths.state_file).await;
            log::info!("Using state file {}", store.path().display());

            let summary = pipeline::run_watch(
                &config,
                fetcher,
                &mut store,
                &notifier,
                &RunOptions { dry_run, limit },
            )
            .await;

            if summary.has_failures() {
                log::warn!("Run finished with failures; affected listings are retried next run");
            }
        }

        Command::Inspect { url } => {
            let fetcher = build_fetcher(&config.crawler)?;
            let result = pipeline::inspect_listing(&config, fetcher.as_ref(), &url).await;
            fetcher.close().await;

            let (record, message) = result?;
            println!("{message}");
            log::debug!("Identity: {}", record.identity);
            log::debug!("Fingerprint: {}", record.fingerprint());
        }

        Command::State => {
            let path = &config.paths.state_file;
            log::info!("State file: {}", path.display());

            match LocalStateStore::load(path).await? {
                None => log::info!("No state recorded yet."),
                Some(state) => {
                    log::info!("Entries: {}", state.len());
                    log::info!("Legacy entries (no fingerprint): {}", state.legacy_count());
                    if let Some((identity, entry)) = state.newest() {
                        let when = entry.last_seen.or(entry.first_seen);
                        log::info!(
                            "Newest: {} ({})",
                            identity,
                            when.map(|t| t.to_rfc3339()).unwrap_or_default()
                        );
                    }
                }
            }
        }

        Command::Validate => {}
    }

    log::info!("Done!");

    Ok(())
}
