//! # Page Fetcher
//!
//! Downloads a page body into the run's temporary directory and decides
//! whether the page was available.
//!
//! | outcome | availability | body |
//! |---------|--------------|------|
//! | 2xx response | available | kept |
//! | any other status | unavailable | kept |
//! | connection refused, DNS failure, timeout | unavailable | none |

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use webwatch_core::Availability;

/// Request timeout used by [`HttpFetcher::with_default_client`].
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of fetching one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub availability: Availability,
    /// Temporary file holding the response body.
    pub body: Option<PathBuf>,
}

/// Something that can fetch a page body.
pub trait PageFetcher {
    /// Fetch `url`, writing any body under `work_dir`.
    fn fetch(&self, url: &str, work_dir: &Path) -> anyhow::Result<FetchedPage>;
}

/// [`PageFetcher`] over a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    /// Build a client with [`DEFAULT_FETCH_TIMEOUT`].
    pub fn with_default_client() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .user_agent(concat!("webwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self::new(client))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str, work_dir: &Path) -> anyhow::Result<FetchedPage> {
        let mut response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                tracing::info!(url = %url, error = %e, "page unreachable");
                return Ok(FetchedPage {
                    availability: Availability::Unavailable,
                    body: None,
                });
            }
            Err(e) => return Err(e).with_context(|| format!("requesting {url}")),
        };

        let status = response.status();
        let availability = Availability::from_flag(Some(status.is_success()));
        tracing::debug!(url = %url, status = %status, "fetched page");

        let (mut file, path) = body_file(work_dir)?;
        response
            .copy_to(&mut file)
            .with_context(|| format!("reading body of {url}"))?;
        file.sync_all()
            .with_context(|| format!("writing {}", path.display()))?;

        Ok(FetchedPage {
            availability,
            body: Some(path),
        })
    }
}

fn body_file(work_dir: &Path) -> anyhow::Result<(File, PathBuf)> {
    tempfile::Builder::new()
        .prefix("content-")
        .tempfile_in(work_dir)
        .with_context(|| format!("creating body file in {}", work_dir.display()))?
        .keep()
        .context("keeping body file")
}
