//! # Observation Model — One Check of One Page
//!
//! A [`PageObservation`] is what the fetch and screenshot collaborators
//! produce for a single URL at a single instant. It is transient until the
//! store persists it; at that point its in-flight files move into the
//! artefact store and its metadata becomes one log record.
//!
//! ## Record Projection
//!
//! [`Persistable`] splits an observation into the two halves the store needs:
//!
//! | half | contents |
//! |------|----------|
//! | `artefacts()` | role → local file (`screenshot`, `raw_content`) |
//! | `meta()` | `type`, `url`, `timestamp`, `was_available`, `screenshot_content` |
//!
//! `screenshot_content` carries the screenshot digest in hex so a later run
//! can compare against it without reading the stored image back.

use std::path::{Path, PathBuf};

use crate::digest::{digest_file, ContentDigest};
use crate::error::{HashError, ValueError};
use crate::temporal::Timestamp;
use crate::value::{Fields, MetaInfo, MetaValue};

/// Artefact role of a page screenshot.
pub const ROLE_SCREENSHOT: &str = "screenshot";
/// Artefact role of a fetched page body.
pub const ROLE_RAW_CONTENT: &str = "raw_content";

/// `type` value written for page observations.
pub const OBSERVATION_TYPE: &str = "observation";

/// Record field names written by [`PageObservation::meta`].
pub mod fields {
    pub const TYPE: &str = "type";
    pub const URL: &str = "url";
    pub const TIMESTAMP: &str = "timestamp";
    pub const WAS_AVAILABLE: &str = "was_available";
    pub const SCREENSHOT_CONTENT: &str = "screenshot_content";
}

/// Anything the store can persist: a set of artefact files plus metadata.
pub trait Persistable {
    /// Role name → local path of each artefact to move into the store.
    fn artefacts(&self) -> Fields<PathBuf>;

    /// Metadata written to the observation log.
    fn meta(&self) -> MetaInfo;
}

/// Whether the page answered when it was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    Available,
    Unavailable,
    /// No answer was recorded (older records, or a check that never ran).
    Unknown,
}

impl Availability {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Available,
            Some(false) => Self::Unavailable,
            None => Self::Unknown,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Available => Some(true),
            Self::Unavailable => Some(false),
            Self::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured screenshot, identified by its content digest.
///
/// A freshly captured screenshot has a `content_path`; one rebuilt from a
/// log record only knows its digest. Equality compares digests alone.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub content_hash: ContentDigest,
    pub content_path: Option<PathBuf>,
}

impl Screenshot {
    /// Hash the image at `path` and keep the path for persisting.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, HashError> {
        let path = path.into();
        let content_hash = digest_file(&path)?;
        Ok(Self {
            content_hash,
            content_path: Some(path),
        })
    }

    /// A screenshot known only by digest.
    pub fn from_digest(content_hash: ContentDigest) -> Self {
        Self {
            content_hash,
            content_path: None,
        }
    }
}

impl PartialEq for Screenshot {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

impl Eq for Screenshot {}

/// One timestamped check of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageObservation {
    pub url: String,
    pub observation_time: Timestamp,
    pub availability: Availability,
    pub screenshot: Option<Screenshot>,
    pub raw_content_location: Option<PathBuf>,
}

impl PageObservation {
    /// A bare observation stamped with the current time.
    pub fn new(url: impl Into<String>, availability: Availability) -> Self {
        Self {
            url: url.into(),
            observation_time: Timestamp::now(),
            availability,
            screenshot: None,
            raw_content_location: None,
        }
    }

    pub fn observed_at(mut self, observation_time: Timestamp) -> Self {
        self.observation_time = observation_time;
        self
    }

    pub fn with_screenshot(mut self, screenshot: Option<Screenshot>) -> Self {
        self.screenshot = screenshot;
        self
    }

    pub fn with_raw_content(mut self, location: Option<PathBuf>) -> Self {
        self.raw_content_location = location;
        self
    }

    /// Rebuild an observation from a stored record.
    ///
    /// `raw_content_location` is the resolved path of the record's
    /// `raw_content` artefact, if it had one. The screenshot comes back as a
    /// digest-only [`Screenshot`].
    ///
    /// # Errors
    ///
    /// [`ValueError::InvalidField`] if `url` or `timestamp` is missing or
    /// mistyped, or `screenshot_content` is not a hex digest.
    pub fn from_meta(meta: &MetaInfo, raw_content_location: Option<&Path>) -> Result<Self, ValueError> {
        let url = meta
            .get(fields::URL)
            .and_then(MetaValue::as_str)
            .ok_or_else(|| ValueError::invalid_field(fields::URL, "missing or not text"))?;
        let observation_time = *meta
            .get(fields::TIMESTAMP)
            .and_then(MetaValue::as_timestamp)
            .ok_or_else(|| {
                ValueError::invalid_field(fields::TIMESTAMP, "missing or not a timestamp")
            })?;
        let availability = match meta.get(fields::WAS_AVAILABLE) {
            None | Some(MetaValue::Null) => Availability::Unknown,
            Some(MetaValue::Bool(flag)) => Availability::from_flag(Some(*flag)),
            Some(other) => {
                return Err(ValueError::invalid_field(
                    fields::WAS_AVAILABLE,
                    format!("expected bool, found {}", other.kind_name()),
                ))
            }
        };
        let screenshot = match meta.get(fields::SCREENSHOT_CONTENT) {
            None | Some(MetaValue::Null) => None,
            Some(MetaValue::Text(hex)) => Some(Screenshot::from_digest(
                ContentDigest::from_hex(hex)
                    .map_err(|e| ValueError::invalid_field(fields::SCREENSHOT_CONTENT, e.to_string()))?,
            )),
            Some(other) => {
                return Err(ValueError::invalid_field(
                    fields::SCREENSHOT_CONTENT,
                    format!("expected hex text, found {}", other.kind_name()),
                ))
            }
        };

        Ok(Self {
            url: url.to_string(),
            observation_time,
            availability,
            screenshot,
            raw_content_location: raw_content_location.map(Path::to_path_buf),
        })
    }
}

impl Persistable for PageObservation {
    fn artefacts(&self) -> Fields<PathBuf> {
        let mut artefacts = Fields::new();
        if let Some(path) = self.screenshot.as_ref().and_then(|s| s.content_path.clone()) {
            artefacts.insert(ROLE_SCREENSHOT, path);
        }
        if let Some(path) = &self.raw_content_location {
            artefacts.insert(ROLE_RAW_CONTENT, path.clone());
        }
        artefacts
    }

    fn meta(&self) -> MetaInfo {
        let mut meta = Fields::new();
        meta.insert(fields::TYPE, MetaValue::from(OBSERVATION_TYPE));
        meta.insert(fields::URL, MetaValue::from(self.url.as_str()));
        meta.insert(fields::TIMESTAMP, MetaValue::from(self.observation_time));
        meta.insert(
            fields::WAS_AVAILABLE,
            self.availability
                .as_flag()
                .map_or(MetaValue::Null, MetaValue::Bool),
        );
        if let Some(screenshot) = &self.screenshot {
            meta.insert(
                fields::SCREENSHOT_CONTENT,
                MetaValue::from(screenshot.content_hash.to_hex()),
            );
        }
        meta
    }
}
