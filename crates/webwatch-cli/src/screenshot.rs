//! # Screenshotter
//!
//! Captures a page as a PNG by running a headless browser. The default
//! implementation drives Firefox:
//!
//! ```text
//! firefox --screenshot <out.png> <url> --no-remote --profile <fresh profile dir>
//! ```
//!
//! A browser that does not finish within the timeout is killed and the page
//! simply has no screenshot. Failing to start the browser, or the browser
//! exiting unsuccessfully, is an error.
//!
//! The binary is either used as given or picked by a [`FirefoxLocator`] on
//! the first capture, which may fetch a newer Firefox into the cache root.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use webwatch_core::Screenshot;

use crate::browser::FirefoxLocator;

/// Environment variable naming the firefox binary.
pub const FIREFOX_ENV_VAR: &str = "WEBWATCHER_FIREFOX";

/// How long firefox gets to produce a screenshot.
pub const DEFAULT_SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Something that can screenshot a page.
pub trait Screenshotter {
    /// Capture `url` into a file under `work_dir`.
    ///
    /// `Ok(None)` means no screenshot could be taken in time.
    fn take_screenshot_of(&self, url: &str, work_dir: &Path) -> anyhow::Result<Option<Screenshot>>;
}

#[derive(Debug, Clone)]
enum Browser {
    Fixed(PathBuf),
    /// Located once; a failed lookup is remembered, not retried per page.
    Located {
        locator: FirefoxLocator,
        resolved: OnceCell<Result<PathBuf, String>>,
    },
}

/// [`Screenshotter`] running a firefox binary.
#[derive(Debug, Clone)]
pub struct FirefoxScreenshotter {
    browser: Browser,
    timeout: Duration,
}

impl FirefoxScreenshotter {
    /// Always run `binary`, whatever its version.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            browser: Browser::Fixed(binary.into()),
            timeout: DEFAULT_SCREENSHOT_TIMEOUT,
        }
    }

    /// Run whatever `locator` picks on the first capture.
    pub fn located(locator: FirefoxLocator) -> Self {
        Self {
            browser: Browser::Located {
                locator,
                resolved: OnceCell::new(),
            },
            timeout: DEFAULT_SCREENSHOT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The binary captures run.
    pub fn binary(&self) -> anyhow::Result<PathBuf> {
        match &self.browser {
            Browser::Fixed(binary) => Ok(binary.clone()),
            Browser::Located { locator, resolved } => {
                let outcome =
                    resolved.get_or_init(|| locator.locate().map_err(|e| format!("{e:#}")));
                outcome.clone().map_err(anyhow::Error::msg)
            }
        }
    }
}

impl Default for FirefoxScreenshotter {
    fn default() -> Self {
        Self::new("firefox")
    }
}

impl Screenshotter for FirefoxScreenshotter {
    fn take_screenshot_of(&self, url: &str, work_dir: &Path) -> anyhow::Result<Option<Screenshot>> {
        let binary = self.binary()?;
        let output = tempfile::Builder::new()
            .prefix("screenshot-")
            .suffix(".png")
            .tempfile_in(work_dir)
            .with_context(|| format!("creating screenshot file in {}", work_dir.display()))?
            .into_temp_path()
            .keep()
            .context("keeping screenshot file")?;
        let profile = tempfile::Builder::new()
            .suffix("_ff_profile")
            .tempdir_in(work_dir)
            .context("creating firefox profile directory")?;

        let mut child = Command::new(&binary)
            .arg("--screenshot")
            .arg(&output)
            .arg(url)
            .arg("--no-remote")
            .arg("--profile")
            .arg(profile.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("starting firefox at {}", binary.display()))?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().context("waiting for firefox")? {
                break status;
            }
            if Instant::now() >= deadline {
                // Already-exited races are harmless here.
                let _ = child.kill();
                let _ = child.wait();
                tracing::info!(url = %url, timeout = ?self.timeout, "screenshot timed out");
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            tracing::warn!(binary = %binary.display(), %status, "firefox failed");
            bail!("firefox exited with {status} while capturing {url}");
        }

        let screenshot = Screenshot::from_file(&output)
            .with_context(|| format!("hashing screenshot {}", output.display()))?;
        tracing::debug!(url = %url, digest = %screenshot.content_hash, "captured screenshot");
        Ok(Some(screenshot))
    }
}
