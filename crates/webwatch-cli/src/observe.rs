//! Turning a configured page into a [`PageObservation`].

use std::path::{Path, PathBuf};

use webwatch_core::PageObservation;

use crate::config::PageUnderObservation;
use crate::fetch::PageFetcher;
use crate::screenshot::Screenshotter;

/// Observes pages with a fetcher and a screenshotter, leaving in-flight
/// files in `work_dir`.
pub struct Observer<F, S> {
    fetcher: F,
    screenshotter: S,
    work_dir: PathBuf,
}

impl<F: PageFetcher, S: Screenshotter> Observer<F, S> {
    pub fn new(fetcher: F, screenshotter: S, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            screenshotter,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Fetch then screenshot `page`, stamped with the current time.
    pub fn observe(&self, page: &PageUnderObservation) -> anyhow::Result<PageObservation> {
        let fetched = self.fetcher.fetch(&page.url, &self.work_dir)?;
        let screenshot = self
            .screenshotter
            .take_screenshot_of(&page.url, &self.work_dir)?;

        Ok(PageObservation::new(page.url.clone(), fetched.availability)
            .with_screenshot(screenshot)
            .with_raw_content(fetched.body))
    }
}
