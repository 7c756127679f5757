//! # Run Loop
//!
//! One `webwatch run`: every configured page is observed, compared against
//! its latest stored observation, and the new observation persisted. A
//! failing page does not stop the others; its error is collected and
//! reported after all differences.
//!
//! ## Report Format
//!
//! ```text
//! Differences in https://example.org/
//! 	availability: available
//! 	screenshot: ScreenshotDiff(old(hash)=None, new(hash)=…, new=…, comparison=None)
//! Errors:
//! While inspecting https://broken.example/
//! 	firefox exited with exit status: 1 while capturing https://broken.example/
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use webwatch_core::PageObservation;
use webwatch_diff::{Diffa, PageDiff};
use webwatch_store::Storage;

use crate::config::{
    discover_config_path, PageUnderObservation, WatchConfig, MISSING_CONFIG_GUIDANCE,
};
use crate::environment::storage_dir;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::observe::Observer;
use crate::screenshot::{FirefoxScreenshotter, Screenshotter};

/// `webwatch run` arguments.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Watch configuration file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Execute `webwatch run`.
///
/// Returns exit code 1 when no configuration exists or any page failed.
pub fn run_watch(
    args: &RunArgs,
    data_root: &Path,
    screenshotter: FirefoxScreenshotter,
) -> Result<u8> {
    let config_path = discover_config_path(args.config.as_deref());
    watch_with_config(config_path.as_deref(), data_root, screenshotter)
}

/// One run against an already discovered configuration file.
pub fn watch_with_config(
    config_path: Option<&Path>,
    data_root: &Path,
    screenshotter: FirefoxScreenshotter,
) -> Result<u8> {
    let Some(config_path) = config_path else {
        eprint!("{MISSING_CONFIG_GUIDANCE}");
        return Ok(1);
    };
    tracing::debug!(path = %config_path.display(), "using configuration");
    let config = WatchConfig::load(config_path)?;

    let storage = Storage::open(storage_dir(data_root))?;
    let work = tempfile::Builder::new()
        .prefix("webwatch-run-")
        .tempdir()
        .context("creating temporary run directory")?;
    let observer = Observer::new(
        HttpFetcher::with_default_client()?,
        screenshotter,
        work.path(),
    );

    let report = observe_the_web(&Diffa::new(), &storage, &observer, &config.pages);
    report
        .render(&mut io::stdout().lock())
        .context("writing report")?;
    Ok(if report.is_success() { 0 } else { 1 })
}

/// Outcome of one run, in page order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub diffs: Vec<(String, PageDiff)>,
    pub errors: Vec<(String, anyhow::Error)>,
}

impl RunReport {
    /// `true` when every page was observed and stored.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Write the human-readable report.
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        for (url, diff) in &self.diffs {
            writeln!(out, "Differences in {url}")?;
            for (kind, value) in diff.differences() {
                writeln!(out, "\t{kind}: {value}")?;
            }
        }

        if !self.errors.is_empty() {
            writeln!(out, "Errors:")?;
        }
        for (url, error) in &self.errors {
            writeln!(out, "While inspecting {url}")?;
            writeln!(out, "\t{error:#}")?;
        }
        Ok(())
    }
}

/// Observe, diff and persist every page.
///
/// A page's differences are reported as soon as they are known, so a page
/// whose observation then fails to store shows up under both headings.
pub fn observe_the_web<F: PageFetcher, S: Screenshotter>(
    diffa: &Diffa,
    storage: &Storage,
    observer: &Observer<F, S>,
    pages: &[PageUnderObservation],
) -> RunReport {
    let mut report = RunReport::default();

    for page in pages {
        let outcome = compare(diffa, storage, observer, page).and_then(|(observation, diff)| {
            match diff {
                Some(diff) => report.diffs.push((page.url.clone(), diff)),
                None => tracing::debug!(url = %page.url, "no changes"),
            }
            storage
                .persist(&observation)
                .context("storing observation")
                .map(drop)
        });
        if let Err(e) = outcome {
            tracing::warn!(
                url = %page.url,
                site = %page.name,
                error = %format!("{e:#}"),
                "page failed"
            );
            report.errors.push((page.url.clone(), e));
        }
    }

    tracing::info!(
        pages = pages.len(),
        changed = report.diffs.len(),
        failed = report.errors.len(),
        "run complete"
    );
    report
}

/// Observe `page` and diff it against its latest stored observation.
fn compare<F: PageFetcher, S: Screenshotter>(
    diffa: &Diffa,
    storage: &Storage,
    observer: &Observer<F, S>,
    page: &PageUnderObservation,
) -> Result<(PageObservation, Option<PageDiff>)> {
    let observation = observer
        .observe(page)
        .with_context(|| format!("observing {}", page.url))?;
    let previous = storage
        .latest_observation(&page.url)
        .context("loading previous observation")?;
    let diff = diffa
        .diff(&observation, previous.as_ref())
        .context("comparing with previous observation")?;
    Ok((observation, diff))
}
