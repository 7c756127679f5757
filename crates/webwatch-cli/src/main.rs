//! # webwatch CLI entry point
//!
//! Parses command-line arguments, sets up logging and dispatches to the
//! subcommand handlers in the library crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use webwatch_cli::browser::{FirefoxDownload, FirefoxLocator};
use webwatch_cli::config::CONFIG_TEMPLATE;
use webwatch_cli::environment::{
    resolve_cache_root, resolve_data_root, CACHE_ROOT_ENV_VAR, DATA_ROOT_ENV_VAR,
};
use webwatch_cli::history::{run_history, HistoryArgs};
use webwatch_cli::screenshot::{FirefoxScreenshotter, FIREFOX_ENV_VAR};
use webwatch_cli::watch::{run_watch, RunArgs};

/// Watch web pages for changes.
///
/// Every run fetches and screenshots the configured pages, stores the
/// observations and reports what changed since the previous run.
#[derive(Parser, Debug)]
#[command(name = "webwatch", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding stored observations.
    #[arg(long, global = true, env = DATA_ROOT_ENV_VAR)]
    data_root: Option<PathBuf>,

    /// Directory holding downloaded browsers.
    #[arg(long, global = true, env = CACHE_ROOT_ENV_VAR)]
    cache_root: Option<PathBuf>,

    /// Firefox binary used for screenshots. One older than 57 is replaced
    /// by a downloaded build.
    #[arg(long, global = true, env = FIREFOX_ENV_VAR, default_value = "firefox")]
    firefox: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Observe every configured page and report changes.
    Run(RunArgs),

    /// Print a sample configuration file.
    ShowConfigTemplate,

    /// List stored observations of a page, newest first.
    History(HistoryArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "webwatch starting");

    let result = match &cli.command {
        Commands::ShowConfigTemplate => {
            print!("{CONFIG_TEMPLATE}");
            Ok(0)
        }
        Commands::Run(args) => resolve_data_root(cli.data_root.as_deref()).and_then(|root| {
            let cache_root = resolve_cache_root(cli.cache_root.as_deref())?;
            let locator = FirefoxLocator::new(&cli.firefox, cache_root, FirefoxDownload::from_env());
            run_watch(args, &root, FirefoxScreenshotter::located(locator))
        }),
        Commands::History(args) => {
            resolve_data_root(cli.data_root.as_deref()).and_then(|root| run_history(args, &root))
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
