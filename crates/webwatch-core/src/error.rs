//! # Error Types — Error Kinds Shared Across the Workspace
//!
//! Every library error in webwatch reports one of a small set of
//! [`ErrorKind`]s so callers can branch on the category without matching
//! on crate-specific variants. All errors use `thiserror`.
//!
//! ## Design
//!
//! - I/O failures carry the path that was being touched.
//! - A missing source is `NotFound`, never folded into `IoFailure`.
//! - Hashing errors during a diff are re-labelled `ComparisonFailure` by
//!   the diff crate; they are never swallowed into "no change".

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Broad category of a webwatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An artefact, source file, or log was missing at the expected path.
    NotFound,
    /// A read, write, create, or rename failed.
    IoFailure,
    /// Hashing failed while comparing two observations.
    ComparisonFailure,
    /// A log line could not be parsed into a record.
    MalformedRecord,
    /// The caller supplied something unusable (bad digest text, bad role
    /// name, unsortable query).
    InvalidInput,
}

impl ErrorKind {
    /// Stable lowercase identifier, suitable for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::IoFailure => "io_failure",
            Self::ComparisonFailure => "comparison_failure",
            Self::MalformedRecord => "malformed_record",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by the artefact hasher.
#[derive(Error, Debug)]
pub enum HashError {
    /// The source did not exist when hashing started.
    #[error("unable to open {} for hashing: no such file", path.display())]
    NotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// Any other failure while opening or reading the source.
    #[error("I/O error while hashing {}: {source}", path.display())]
    Io {
        /// The path being hashed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Build a hash error from an I/O error, splitting out `NotFound`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// The broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::IoFailure,
        }
    }
}

/// Error raised when parsing textual forms of core values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A hex digest was the wrong length or contained non-hex characters.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// A timestamp string did not match the record format.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A record field was missing or held the wrong kind of value.
    #[error("record field {field:?}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ValueError {
    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// The broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}
