//! showtime-watch CLI
//!
//! Meant to be invoked by an external scheduler (cron, CI schedule) once per
//! interval. Exits nonzero when the check could not complete.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use showtime_watch::{
    error::{AppError, Result},
    models::{Config, FetchMode, UTC_FORMAT},
    pipeline,
    services::{self, AvailabilityDetector, LogMailer, Mailer, SmtpMailer},
    storage::{LocalStateStore, StateStore},
    utils::text::visible_text,
};

/// showtime-watch - Cinema Showtime Availability Watcher
#[derive(Parser, Debug)]
#[command(
    name = "showtime-watch",
    version,
    about = "Emails once when showtimes for a film open at a cinema"
)]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "watch.toml")]
    config: PathBuf,

    /// Override the state file location
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the page, detect availability, alert on the rising edge
    Check {
        /// Log the alert instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the detector on a saved page (text or HTML)
    Detect {
        /// File holding the page content
        file: PathBuf,
    },

    /// Show the persisted state
    Status,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::load_or_default(&cli.config)
    };
    let state_path = cli
        .state
        .unwrap_or_else(|| PathBuf::from(&config.storage.state_file));
    let store = LocalStateStore::new(&state_path);

    match cli.command {
        Command::Check { dry_run } => {
            log::info!("===== START =====");
            config.validate()?;

            let detector = AvailabilityDetector::from_config(&config.detection)?;
            let fetcher = services::create_fetcher(&config)?;
            let mailer: Box<dyn Mailer> = if dry_run {
                Box::new(LogMailer)
            } else {
                Box::new(SmtpMailer::new(config.mail.clone()))
            };

            let outcome = pipeline::run_check(
                &config,
                &detector,
                fetcher.as_ref(),
                mailer.as_ref(),
                &store,
            )
            .await
            .inspect_err(|e| log::error!("Check aborted, state left unchanged: {}", e))?;

            log::info!(
                "Result: {} ({:?}, alert delivered: {})",
                outcome.status,
                outcome.action,
                outcome.delivered
            );
            log::info!("===== END =====");
        }

        Command::Detect { file } => {
            config.validate()?;
            let text = page_text(&std::fs::read(&file)?);

            let detector = AvailabilityDetector::from_config(&config.detection)?;
            let detection = detector.detect(&text);
            println!("{}", serde_json::to_string_pretty(&detection)?);
        }

        Command::Status => {
            log::info!("State file: {}", state_path.display());
            match store.load().await? {
                Some(state) => {
                    log::info!("Status: {}", state.status);
                    log::info!("Last checked: {}", state.last_checked.format(UTC_FORMAT));
                    if let Some(since) = state.available_since {
                        log::info!("Available since: {}", since.format(UTC_FORMAT));
                    }
                }
                None => log::info!("No state recorded yet."),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            AvailabilityDetector::from_config(&config.detection)?;
            if config.fetcher.mode == FetchMode::Browser
                && !cfg!(feature = "browser")
            {
                return Err(AppError::config(
                    "browser mode configured but the `browser` feature is not compiled in",
                ));
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}

/// Text the detector sees for a saved page; invalid UTF-8 is replaced.
fn page_text(bytes: &[u8]) -> String {
    let content = String::from_utf8_lossy(bytes);
    if looks_like_html(&content) {
        visible_text(&content)
    } else {
        content.into_owned()
    }
}

fn looks_like_html(content: &str) -> bool {
    let head = content.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || (head.starts_with('<') && head.contains("<body"))
}
