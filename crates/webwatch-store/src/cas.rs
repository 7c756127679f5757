//! # Artefact Store — Content-Addressed Payloads
//!
//! Screenshots and fetched page bodies are kept in a single flat directory,
//! each under a name derived from its SHA-256 digest (see
//! [`ContentDigest::to_storage_name`]). Identical content therefore lands on
//! the same name and is stored once.
//!
//! ## Write Discipline
//!
//! New content is copied into a temporary file inside the artefact directory,
//! flushed to disk, and then linked into place under its final name without
//! clobbering. A reader never sees a partially written artefact under a
//! digest-derived name. If a concurrent writer wins the race the loser's
//! temporary file is discarded; both end up referencing the same bytes.
//!
//! ## Empty Content
//!
//! Zero-length payloads are stored under the reserved name
//! [`EMPTY_FILE_NAME`] and are never hashed.
//!
//! ## References
//!
//! [`ArtefactRef`] is a `file://` URI to the stored file. It is what the log
//! records under `_storage` and what [`ArtefactStore::resolve`] turns back
//! into a local path.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tempfile::NamedTempFile;
use url::Url;
use webwatch_core::{digest_bytes, digest_file, ContentDigest};

use crate::error::StoreError;

/// File name used for every zero-length artefact.
pub const EMPTY_FILE_NAME: &str = "_empty_file";

const INCOMING_PREFIX: &str = ".incoming-";

/// Bytes escaped in `file://` references: all but `A-Za-z0-9_.-~/`.
const URI_PATH_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Artefact roles become `_storage` keys; keep them to `[a-z0-9_]+`.
fn validate_role(role: &str) -> Result<(), StoreError> {
    if role.is_empty()
        || !role
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(StoreError::InvalidRole(role.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ArtefactRef
// ---------------------------------------------------------------------------

/// A `file://` reference to a stored artefact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtefactRef(Url);

impl ArtefactRef {
    /// Reference an absolute local path.
    ///
    /// Every byte outside `A-Za-z0-9_.-~/` is percent-encoded, so the
    /// `=` padding of a storage name is written as `%3D`.
    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        if !path.is_absolute() {
            return Err(StoreError::InvalidReference {
                reference: path.display().to_string(),
                reason: "not an absolute path".into(),
            });
        }
        let encoded = percent_encode(path.as_os_str().as_encoded_bytes(), URI_PATH_ESCAPES);
        Self::parse(&format!("file://{encoded}"))
    }

    /// Parse a reference previously produced by the store.
    pub fn parse(reference: &str) -> Result<Self, StoreError> {
        let url = Url::parse(reference).map_err(|e| StoreError::InvalidReference {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "file" {
            return Err(StoreError::InvalidReference {
                reference: reference.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The local path this reference names. Does not check existence.
    pub fn to_file_path(&self) -> Result<PathBuf, StoreError> {
        self.0
            .to_file_path()
            .map_err(|()| StoreError::InvalidReference {
                reference: self.0.to_string(),
                reason: "does not name a local file".into(),
            })
    }
}

impl std::fmt::Display for ArtefactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

// ---------------------------------------------------------------------------
// ArtefactStore
// ---------------------------------------------------------------------------

/// A flat, content-addressed artefact directory.
#[derive(Debug, Clone)]
pub struct ArtefactStore {
    dir: PathBuf,
}

impl ArtefactStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where content with `digest` lives (or would live).
    pub fn path_for(&self, digest: &ContentDigest) -> PathBuf {
        self.dir.join(digest.to_storage_name())
    }

    /// Whether content with `digest` is already stored.
    pub fn contains(&self, digest: &ContentDigest) -> bool {
        self.path_for(digest).is_file()
    }

    /// Move the file at `source` into the store under `role`.
    ///
    /// The source is hashed first; if its content is already stored nothing
    /// is copied. Either way the source file is consumed and the reference
    /// to the stored copy is returned.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidRole`] for a role outside `[a-z0-9_]+`.
    /// - [`StoreError::NotFound`] / hashing errors if `source` is missing or
    ///   unreadable.
    /// - [`StoreError::Io`] if the directory cannot be created or the
    ///   write/rename fails.
    pub fn persist(&self, role: &str, source: &Path) -> Result<ArtefactRef, StoreError> {
        validate_role(role)?;
        let len = fs::metadata(source)
            .map_err(|e| StoreError::from_io(source, e))?
            .len();
        let name = if len == 0 {
            EMPTY_FILE_NAME.to_string()
        } else {
            digest_file(source)?.to_storage_name()
        };

        let dest = self.place(&name, |tmp| {
            let mut src = File::open(source).map_err(|e| StoreError::from_io(source, e))?;
            io::copy(&mut src, tmp).map_err(|e| StoreError::from_io(source, e))?;
            Ok(())
        })?;

        fs::remove_file(source).map_err(|e| StoreError::from_io(source, e))?;
        tracing::debug!(role, source = %source.display(), dest = %dest.display(), "artefact persisted");
        self.reference_for(&dest)
    }

    /// Store an in-memory payload under `role`.
    pub fn persist_bytes(&self, role: &str, bytes: &[u8]) -> Result<ArtefactRef, StoreError> {
        validate_role(role)?;
        let name = if bytes.is_empty() {
            EMPTY_FILE_NAME.to_string()
        } else {
            digest_bytes(bytes).to_storage_name()
        };
        let dest = self.place(&name, |tmp| {
            tmp.write_all(bytes)
                .map_err(|e| StoreError::from_io(tmp.path(), e))
        })?;
        tracing::debug!(role, dest = %dest.display(), "artefact persisted");
        self.reference_for(&dest)
    }

    /// Local path of a stored artefact.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the referenced file no longer exists.
    pub fn resolve(&self, reference: &ArtefactRef) -> Result<PathBuf, StoreError> {
        let path = reference.to_file_path()?;
        if !path.is_file() {
            return Err(StoreError::NotFound { path });
        }
        Ok(path)
    }

    /// Ensure `name` exists in the store, writing it through `fill` if not.
    fn place<F>(&self, name: &str, fill: F) -> Result<PathBuf, StoreError>
    where
        F: FnOnce(&mut NamedTempFile) -> Result<(), StoreError>,
    {
        let dest = self.dir.join(name);
        if dest.is_file() {
            tracing::debug!(name, "artefact already stored, skipping copy");
            return Ok(dest);
        }

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::from_io(&self.dir, e))?;
        let mut tmp = tempfile::Builder::new()
            .prefix(INCOMING_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| StoreError::from_io(&self.dir, e))?;
        fill(&mut tmp)?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::from_io(tmp.path(), e))?;

        match tmp.persist_noclobber(&dest) {
            Ok(_) => {}
            // Another writer stored the same content first.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(name, "artefact appeared concurrently, keeping existing copy");
            }
            Err(e) => return Err(StoreError::from_io(&dest, e.error)),
        }
        Ok(dest)
    }

    fn reference_for(&self, dest: &Path) -> Result<ArtefactRef, StoreError> {
        let absolute = fs::canonicalize(dest).map_err(|e| StoreError::from_io(dest, e))?;
        ArtefactRef::from_path(&absolute)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use webwatch_core::ErrorKind;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn validate_role_accepts_known_roles() {
        assert!(validate_role("screenshot").is_ok());
        assert!(validate_role("raw_content").is_ok());
        assert!(validate_role("v2").is_ok());
    }

    #[test]
    fn validate_role_rejects_invalid() {
        for role in ["", "Screenshot", "raw-content", "../x", "a b"] {
            let err = validate_role(role).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "role {role:?}");
        }
    }

    #[test]
    fn persist_names_file_by_digest() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let src = work.path().join("body");
        fs::write(&src, b"sample_data").unwrap();

        let reference = store.persist("raw_content", &src).unwrap();
        let stored = store.resolve(&reference).unwrap();
        assert_eq!(
            stored.file_name().unwrap().to_str().unwrap(),
            "U-a2RIG0yM2r3tX3PmSyRj5wap4dIEucrHivPP67kps="
        );
        assert_eq!(fs::read(&stored).unwrap(), b"sample_data");
        assert!(reference.as_str().starts_with("file://"));
    }

    #[test]
    fn persist_consumes_source() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let src = work.path().join("body");
        fs::write(&src, b"payload").unwrap();
        store.persist("raw_content", &src).unwrap();
        assert!(!src.exists());
    }

    #[test]
    fn identical_content_is_stored_once() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let first = work.path().join("a");
        let second = work.path().join("b");
        fs::write(&first, b"same bytes").unwrap();
        fs::write(&second, b"same bytes").unwrap();

        let r1 = store.persist("screenshot", &first).unwrap();
        let r2 = store.persist("screenshot", &second).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(file_names(store.dir()).len(), 1);
        assert!(store.contains(&digest_bytes(b"same bytes")));
    }

    #[test]
    fn empty_content_uses_sentinel() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let src = work.path().join("empty");
        fs::write(&src, b"").unwrap();

        let reference = store.persist("raw_content", &src).unwrap();
        let stored = store.resolve(&reference).unwrap();
        assert_eq!(stored.file_name().unwrap().to_str().unwrap(), EMPTY_FILE_NAME);
        assert_eq!(store.persist_bytes("raw_content", b"").unwrap(), reference);
        assert_eq!(file_names(store.dir()), vec![EMPTY_FILE_NAME.to_string()]);
    }

    #[test]
    fn no_temporary_files_remain() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        store.persist_bytes("screenshot", b"one").unwrap();
        store.persist_bytes("screenshot", b"two").unwrap();
        store.persist_bytes("screenshot", b"one").unwrap();
        let names = file_names(store.dir());
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.starts_with(INCOMING_PREFIX)));
    }

    #[test]
    fn persist_bytes_matches_persist() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let src = work.path().join("body");
        fs::write(&src, b"hello world").unwrap();
        let from_file = store.persist("raw_content", &src).unwrap();
        let from_bytes = store.persist_bytes("raw_content", b"hello world").unwrap();
        assert_eq!(from_file, from_bytes);
    }

    #[test]
    fn missing_source_is_not_found() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let err = store
            .persist("raw_content", &work.path().join("absent"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn resolve_missing_artefact_is_not_found() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let reference = store.persist_bytes("raw_content", b"short lived").unwrap();
        fs::remove_file(store.resolve(&reference).unwrap()).unwrap();
        assert_eq!(
            store.resolve(&reference).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn reference_escapes_padding_and_reserved_bytes() {
        let reference =
            ArtefactRef::from_path(Path::new("/srv/web watch/art=facts/ab_-c.d~e=")).unwrap();
        assert_eq!(
            reference.as_str(),
            "file:///srv/web%20watch/art%3Dfacts/ab_-c.d~e%3D"
        );
        assert_eq!(
            reference.to_file_path().unwrap(),
            PathBuf::from("/srv/web watch/art=facts/ab_-c.d~e=")
        );
        assert!(ArtefactRef::from_path(Path::new("relative/file")).is_err());
    }

    #[test]
    fn stored_reference_ends_in_escaped_padding() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let reference = store.persist_bytes("raw_content", b"hello world").unwrap();
        assert!(reference
            .as_str()
            .ends_with("/uU0nuZNNPgilLlLX2n2r_sSE7_N6U4DukIj3rOLvzek%3D"));
        assert_eq!(
            fs::read(store.resolve(&reference).unwrap()).unwrap(),
            b"hello world"
        );
    }

    #[test]
    fn reference_parse_roundtrip() {
        let work = tempfile::tempdir().unwrap();
        let store = ArtefactStore::new(work.path().join("artefacts"));
        let reference = store.persist_bytes("raw_content", b"abc").unwrap();
        assert_eq!(ArtefactRef::parse(reference.as_str()).unwrap(), reference);
        assert!(ArtefactRef::parse("https://example.org/x").is_err());
        assert!(ArtefactRef::parse("not a url").is_err());
    }
}
