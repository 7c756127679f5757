//! `webwatch history`: stored observations of one page, newest first.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use webwatch_core::PageObservation;
use webwatch_store::Storage;

use crate::environment::storage_dir;

/// `webwatch history` arguments.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Page URL exactly as written in the configuration.
    pub url: String,

    /// Show at most this many observations.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `webwatch history`.
pub fn run_history(args: &HistoryArgs, data_root: &Path) -> Result<u8> {
    let storage = Storage::open(storage_dir(data_root))?;
    let observations = observation_history(&storage, &args.url, args.limit)?;
    if observations.is_empty() {
        eprintln!("No observations of {}", args.url);
        return Ok(0);
    }
    render_history(&observations, &mut io::stdout().lock()).context("writing history")?;
    Ok(0)
}

/// Load up to `limit` observations of `url`, newest first.
pub fn observation_history(
    storage: &Storage,
    url: &str,
    limit: Option<usize>,
) -> Result<Vec<PageObservation>> {
    let mut observations = storage
        .observation_history(url)
        .with_context(|| format!("querying observations of {url}"))?;
    tracing::debug!(url = %url, found = observations.len(), "history loaded");
    if let Some(limit) = limit {
        observations.truncate(limit);
    }
    Ok(observations)
}

/// One line per observation: time, availability, screenshot digest.
pub fn render_history(observations: &[PageObservation], out: &mut impl Write) -> io::Result<()> {
    for obs in observations {
        let screenshot = obs
            .screenshot
            .as_ref()
            .map_or_else(|| "-".to_string(), |s| s.content_hash.to_string());
        writeln!(out, "{}\t{}\t{}", obs.observation_time, obs.availability, screenshot)?;
    }
    Ok(())
}
