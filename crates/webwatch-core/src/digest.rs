//! # Content Digest — Artefact Identity and the Streaming Hasher
//!
//! Defines `ContentDigest`, the SHA-256 identity of an artefact's bytes, and
//! the functions that compute it from files, readers, and byte slices.
//!
//! ## Identity Invariant
//!
//! Two payloads with equal digests are treated as identical content. The
//! artefact store names files by digest, and the diff engine compares
//! screenshots by digest. Nothing else (path, mtime, role) participates in
//! identity.
//!
//! ## Streaming
//!
//! Sources are read in [`CHUNK_SIZE`] pieces through an incremental hasher,
//! so payloads never have to fit in memory. The digest does not depend on how
//! the input is chunked.
//!
//! ## Encodings
//!
//! - Hex (lowercase, 64 chars) for display and for the `screenshot_content`
//!   record field.
//! - Storage name: standard padded base64 with `+` → `_` and `/` → `-`, used
//!   as the artefact file name.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use base64::alphabet::Alphabet;
use base64::engine::{general_purpose, GeneralPurpose};
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::{HashError, ValueError};

/// Number of bytes read per hasher update.
pub const CHUNK_SIZE: usize = 8192;

/// Standard base64 alphabet with the two symbol characters swapped for
/// filename-safe ones (`+` → `_`, `/` → `-`).
const STORAGE_ALPHABET: Alphabet =
    match Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("storage-name alphabet is not a valid base64 alphabet"),
    };

const STORAGE_ENGINE: GeneralPurpose = GeneralPurpose::new(&STORAGE_ALPHABET, general_purpose::PAD);

/// A SHA-256 content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string (case-insensitive).
    pub fn from_hex(hex: &str) -> Result<Self, ValueError> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(ValueError::InvalidDigest(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValueError::InvalidDigest(
                "digest contains non-hex characters".into(),
            ));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|e| ValueError::InvalidDigest(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// The file name this digest occupies in the artefact store.
    pub fn to_storage_name(&self) -> String {
        STORAGE_ENGINE.encode(self.0)
    }

    fn from_hasher(hasher: Sha256) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for ContentDigest {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Digest an in-memory byte slice.
pub fn digest_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentDigest::from_hasher(hasher)
}

/// Digest everything a reader yields, in [`CHUNK_SIZE`] pieces.
pub fn digest_reader<R: Read>(reader: R) -> io::Result<ContentDigest> {
    digest_in_chunks(reader, CHUNK_SIZE)
}

/// Digest the file at `path`.
///
/// # Errors
///
/// [`HashError::NotFound`] if the file does not exist when opened,
/// [`HashError::Io`] for every other open or read failure.
pub fn digest_file(path: &Path) -> Result<ContentDigest, HashError> {
    let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
    digest_reader(file).map_err(|e| HashError::from_io(path, e))
}

fn digest_in_chunks<R: Read>(mut reader: R, chunk_size: usize) -> io::Result<ContentDigest> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(ContentDigest::from_hasher(hasher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    const EMPTY_HEX: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const HELLO_WORLD_HEX: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn empty_input_has_known_digest() {
        assert_eq!(digest_bytes(b"").to_hex(), EMPTY_HEX);
        assert_eq!(digest_reader(io::empty()).unwrap().to_hex(), EMPTY_HEX);
    }

    #[test]
    fn hello_world_matches_sha256() {
        assert_eq!(digest_bytes(b"hello world").to_hex(), HELLO_WORLD_HEX);
    }

    #[test]
    fn can_hash_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("some_file");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(digest_file(&path).unwrap().to_hex(), EMPTY_HEX);
    }

    #[test]
    fn can_hash_file_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("some_file");
        std::fs::write(&path, "hello world").unwrap();
        assert_eq!(digest_file(&path).unwrap().to_hex(), HELLO_WORLD_HEX);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_file(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn directory_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_file(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn file_larger_than_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(digest_file(&path).unwrap(), digest_bytes(&data));
    }

    #[test]
    fn hex_roundtrip() {
        let d = digest_bytes(b"hello world");
        assert_eq!(ContentDigest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(
            ContentDigest::from_hex(&HELLO_WORLD_HEX.to_uppercase()).unwrap(),
            d
        );
        assert_eq!(format!("{d}"), HELLO_WORLD_HEX);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(ContentDigest::from_hex("abc123").is_err());
        assert!(ContentDigest::from_hex("").is_err());
        let non_hex = format!("{}g", &EMPTY_HEX[..63]);
        assert!(ContentDigest::from_hex(&non_hex).is_err());
    }

    #[test]
    fn storage_name_uses_swapped_symbols() {
        // base64.b64encode(sha256(b"").digest(), altchars=b"_-")
        assert_eq!(
            digest_bytes(b"").to_storage_name(),
            "47DEQpj8HBSa_-TImW_5JCeuQeRkm5NMpJWZG3hSuFU="
        );
        assert_eq!(
            digest_bytes(b"hello world").to_storage_name(),
            "uU0nuZNNPgilLlLX2n2r_sSE7_N6U4DukIj3rOLvzek="
        );
    }

    #[test]
    fn storage_name_is_path_safe() {
        let name = digest_bytes(b"sample_data").to_storage_name();
        assert_eq!(name.len(), 44);
        assert!(!name.contains('/'));
        assert!(!name.contains('+'));
    }

    proptest! {
        #[test]
        fn chunk_size_is_not_observable(
            data in proptest::collection::vec(any::<u8>(), 0..20_000),
            chunk in 1usize..10_000,
        ) {
            let chunked = digest_in_chunks(io::Cursor::new(&data), chunk).unwrap();
            prop_assert_eq!(chunked, digest_bytes(&data));
        }
    }
}
