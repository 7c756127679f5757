//! # webwatch-diff — Observation Change Detection
//!
//! [`Diffa`] compares a freshly made [`PageObservation`] with the most recent
//! stored one and reports what changed as a [`PageDiff`].
//!
//! ## Rules
//!
//! | situation | result |
//! |-----------|--------|
//! | no prior observation | always a diff: availability, screenshot, content |
//! | availability differs | `availability` entry with the new value |
//! | screenshot digests differ, or one side missing | `screenshot` entry |
//! | nothing differs | `None` |
//!
//! Page bodies are only reported on a first observation; bodies are never
//! compared against a prior observation.
//!
//! ## Failure
//!
//! A fresh screenshot is re-hashed from disk before comparison. If that
//! fails the diff fails with [`DiffError::ComparisonFailure`]; it is never
//! reported as "no change".

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use webwatch_core::{
    digest_file, Availability, ContentDigest, ErrorKind, HashError, PageObservation, Screenshot,
};

/// Errors raised while diffing.
#[derive(Error, Debug)]
pub enum DiffError {
    /// A screenshot could not be hashed for comparison.
    #[error("screenshot comparison failed: {0}")]
    ComparisonFailure(#[source] HashError),
}

impl DiffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ComparisonFailure(_) => ErrorKind::ComparisonFailure,
        }
    }
}

/// Category of a reported change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Availability,
    Screenshot,
    Content,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Availability => "availability",
            Self::Screenshot => "screenshot",
            Self::Content => "content",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change in screenshot identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotDiff {
    /// Digest of the prior screenshot, if there was one.
    pub old: Option<ContentDigest>,
    /// Digest of the new screenshot, if there is one.
    pub new: Option<ContentDigest>,
    /// Where the new screenshot's bytes currently are.
    pub new_location: Option<PathBuf>,
    /// Visual comparison image. Reserved; never produced here.
    pub comparison: Option<PathBuf>,
}

impl fmt::Display for ScreenshotDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScreenshotDiff(old(hash)={}, new(hash)={}, new={}, comparison={})",
            display_opt(self.old.as_ref()),
            display_opt(self.new.as_ref()),
            display_opt(self.new_location.as_ref().map(|p| p.display())),
            display_opt(self.comparison.as_ref().map(|p| p.display())),
        )
    }
}

/// The body of a first observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDiff {
    pub location: PathBuf,
}

impl fmt::Display for ContentDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location.display())
    }
}

fn display_opt<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

/// What changed between two observations of one page.
///
/// A `PageDiff` returned by [`Diffa::diff`] always has at least one entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageDiff {
    /// There was no prior observation to compare against.
    pub first_observation: bool,
    pub availability: Option<Availability>,
    pub screenshot: Option<ScreenshotDiff>,
    pub content: Option<ContentDiff>,
}

impl PageDiff {
    pub fn is_empty(&self) -> bool {
        self.availability.is_none() && self.screenshot.is_none() && self.content.is_none()
    }

    /// Present entries as `(kind, rendered value)`, in a fixed order.
    pub fn differences(&self) -> Vec<(ChangeKind, String)> {
        let mut out = Vec::with_capacity(3);
        if let Some(a) = self.availability {
            out.push((ChangeKind::Availability, a.to_string()));
        }
        if let Some(s) = &self.screenshot {
            out.push((ChangeKind::Screenshot, s.to_string()));
        }
        if let Some(c) = &self.content {
            out.push((ChangeKind::Content, c.to_string()));
        }
        out
    }
}

/// The diff engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diffa;

impl Diffa {
    pub fn new() -> Self {
        Self
    }

    /// Compare `new` against `prior`.
    ///
    /// Returns `Ok(None)` when nothing changed.
    pub fn diff(
        &self,
        new: &PageObservation,
        prior: Option<&PageObservation>,
    ) -> Result<Option<PageDiff>, DiffError> {
        let Some(prior) = prior else {
            tracing::debug!(url = %new.url, "no previous observation");
            return Ok(Some(first_observation(new)));
        };

        let availability = (new.availability != prior.availability).then_some(new.availability);
        let screenshot = diff_screenshots(prior.screenshot.as_ref(), new.screenshot.as_ref())?;

        let diff = PageDiff {
            first_observation: false,
            availability,
            screenshot,
            content: None,
        };
        Ok((!diff.is_empty()).then_some(diff))
    }
}

fn first_observation(new: &PageObservation) -> PageDiff {
    PageDiff {
        first_observation: true,
        availability: Some(new.availability),
        screenshot: new.screenshot.as_ref().map(|s| ScreenshotDiff {
            old: None,
            new: Some(s.content_hash),
            new_location: s.content_path.clone(),
            comparison: None,
        }),
        content: new
            .raw_content_location
            .clone()
            .map(|location| ContentDiff { location }),
    }
}

fn diff_screenshots(
    old: Option<&Screenshot>,
    new: Option<&Screenshot>,
) -> Result<Option<ScreenshotDiff>, DiffError> {
    if old == new {
        return Ok(None);
    }

    let old_hash = old.map(|s| s.content_hash);
    let new_hash = match new {
        Some(Screenshot {
            content_path: Some(path),
            ..
        }) => Some(digest_file(path).map_err(DiffError::ComparisonFailure)?),
        Some(s) => Some(s.content_hash),
        None => None,
    };
    if old_hash == new_hash {
        return Ok(None);
    }

    Ok(Some(ScreenshotDiff {
        old: old_hash,
        new: new_hash,
        new_location: new.and_then(|s| s.content_path.clone()),
        comparison: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use webwatch_core::digest_bytes;

    const URL: &str = "https://example.org/";

    fn obs(availability: Availability) -> PageObservation {
        PageObservation::new(URL, availability)
    }

    fn screenshot_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> Screenshot {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        Screenshot::from_file(path).unwrap()
    }

    #[test]
    fn first_observation_is_never_none() {
        let bare = obs(Availability::Unknown);
        let diff = Diffa::new().diff(&bare, None).unwrap().unwrap();
        assert!(diff.first_observation);
        assert_eq!(diff.availability, Some(Availability::Unknown));
        assert!(diff.screenshot.is_none());
        assert!(diff.content.is_none());
    }

    #[test]
    fn first_observation_reports_artefacts_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let shot = screenshot_file(&dir, "shot.png", b"pixels");
        let new = obs(Availability::Available)
            .with_screenshot(Some(shot.clone()))
            .with_raw_content(Some(PathBuf::from("/tmp/body")));

        let diff = Diffa::new().diff(&new, None).unwrap().unwrap();
        assert_eq!(diff.availability, Some(Availability::Available));
        let screenshot = diff.screenshot.unwrap();
        assert_eq!(screenshot.old, None);
        assert_eq!(screenshot.new, Some(shot.content_hash));
        assert_eq!(screenshot.new_location, shot.content_path);
        assert_eq!(diff.content.unwrap().location, PathBuf::from("/tmp/body"));
    }

    #[test]
    fn identical_observations_produce_no_diff() {
        let dir = tempfile::tempdir().unwrap();
        let shot = screenshot_file(&dir, "shot.png", b"pixels");
        let prior = obs(Availability::Available)
            .with_screenshot(Some(Screenshot::from_digest(shot.content_hash)));
        let new = obs(Availability::Available)
            .with_screenshot(Some(shot))
            .with_raw_content(Some(PathBuf::from("/tmp/body")));

        assert_eq!(Diffa::new().diff(&new, Some(&prior)).unwrap(), None);
    }

    #[test]
    fn unknown_equals_unknown() {
        let prior = obs(Availability::Unknown);
        let new = obs(Availability::Unknown);
        assert_eq!(Diffa::new().diff(&new, Some(&prior)).unwrap(), None);
    }

    #[test]
    fn availability_flip_only() {
        let prior = obs(Availability::Available);
        let new = obs(Availability::Unavailable);
        let diff = Diffa::new().diff(&new, Some(&prior)).unwrap().unwrap();
        assert!(!diff.first_observation);
        assert_eq!(diff.availability, Some(Availability::Unavailable));
        assert!(diff.screenshot.is_none());
        assert!(diff.content.is_none());
        assert_eq!(
            diff.differences(),
            vec![(ChangeKind::Availability, "unavailable".to_string())]
        );
    }

    #[test]
    fn changed_screenshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let shot = screenshot_file(&dir, "shot.png", b"new pixels");
        let old_hash = digest_bytes(b"old pixels");
        let prior =
            obs(Availability::Available).with_screenshot(Some(Screenshot::from_digest(old_hash)));
        let new = obs(Availability::Available).with_screenshot(Some(shot.clone()));

        let diff = Diffa::new().diff(&new, Some(&prior)).unwrap().unwrap();
        assert!(diff.availability.is_none());
        let screenshot = diff.screenshot.unwrap();
        assert_eq!(screenshot.old, Some(old_hash));
        assert_eq!(screenshot.new, Some(shot.content_hash));
        assert_eq!(screenshot.comparison, None);
    }

    #[test]
    fn screenshot_appearing_or_vanishing_is_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let shot = screenshot_file(&dir, "shot.png", b"pixels");
        let with = obs(Availability::Available).with_screenshot(Some(shot));
        let without = obs(Availability::Available);

        let gone = Diffa::new().diff(&without, Some(&with)).unwrap().unwrap();
        assert_eq!(gone.screenshot.as_ref().unwrap().new, None);

        let appeared = Diffa::new().diff(&with, Some(&without)).unwrap().unwrap();
        assert_eq!(appeared.screenshot.as_ref().unwrap().old, None);
    }

    #[test]
    fn body_is_not_compared_against_prior() {
        let prior = obs(Availability::Available).with_raw_content(Some(PathBuf::from("/a")));
        let new = obs(Availability::Available).with_raw_content(Some(PathBuf::from("/b")));
        assert_eq!(Diffa::new().diff(&new, Some(&prior)).unwrap(), None);
    }

    #[test]
    fn vanished_screenshot_file_is_comparison_failure() {
        let dir = tempfile::tempdir().unwrap();
        let shot = screenshot_file(&dir, "shot.png", b"pixels");
        fs::remove_file(shot.content_path.as_ref().unwrap()).unwrap();
        let prior = obs(Availability::Available)
            .with_screenshot(Some(Screenshot::from_digest(digest_bytes(b"other"))));
        let new = obs(Availability::Available).with_screenshot(Some(shot));

        let err = Diffa::new().diff(&new, Some(&prior)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComparisonFailure);
    }

    #[test]
    fn screenshot_diff_display() {
        let diff = ScreenshotDiff {
            old: None,
            new: Some(digest_bytes(b"")),
            new_location: None,
            comparison: None,
        };
        assert_eq!(
            diff.to_string(),
            "ScreenshotDiff(old(hash)=None, \
             new(hash)=e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855, \
             new=None, comparison=None)"
        );
    }
}
