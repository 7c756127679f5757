//! Store error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use webwatch_core::{ErrorKind, HashError, ValueError};

/// Errors raised by the artefact store, the observation log, and queries.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A file or directory the store needed was not there.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A read, write, create, or rename failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Hashing an artefact source failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// An artefact role was empty or contained characters outside `[a-z0-9_]`.
    #[error("invalid artefact role {0:?}: must match [a-z0-9_]+")]
    InvalidRole(String),

    /// A reference did not point into this store.
    #[error("invalid artefact reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// A log line could not be decoded into a record.
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// A stored observation record had unusable fields.
    #[error("unusable observation record: {0}")]
    Record(#[from] ValueError),

    /// A record used a key the log reserves for itself.
    #[error("record field {0:?} is reserved")]
    ReservedField(String),

    /// A record could not be encoded as a log line.
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// A sort key was absent from a record.
    #[error("cannot order by {field:?}: a record has no such field")]
    MissingSortKey { field: String },

    /// Two records held sort-key values with no defined order.
    #[error("cannot order by {field:?}: {left} and {right} values are not comparable")]
    Incomparable {
        field: String,
        left: &'static str,
        right: &'static str,
    },
}

impl StoreError {
    /// Build an I/O error for `path`, splitting out `NotFound`.
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
            Self::Hash(e) => e.kind(),
            Self::MalformedRecord { .. } | Self::Record(_) => ErrorKind::MalformedRecord,
            Self::InvalidRole(_)
            | Self::InvalidReference { .. }
            | Self::ReservedField(_)
            | Self::Encode(_)
            | Self::MissingSortKey { .. }
            | Self::Incomparable { .. } => ErrorKind::InvalidInput,
        }
    }
}
