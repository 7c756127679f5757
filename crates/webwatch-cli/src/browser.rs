//! # Browser Provisioning — Finding a Firefox That Can Screenshot
//!
//! Headless `--screenshot` needs Firefox 57 or newer. The configured binary
//! is asked for its version; when it is missing, silent or too old, a
//! pinned Firefox build is fetched into the cache root instead.
//!
//! ## Cache Layout
//!
//! ```text
//! <cache root>/
//! ├── downloads/firefox.tar.bz2   verified package
//! └── firefox/firefox/firefox     unpacked binary
//! ```
//!
//! A downloaded package is only kept, and only unpacked, when its SHA-256
//! matches the expected digest. An already unpacked executable is reused
//! without touching the network.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use webwatch_core::digest_file;

/// Oldest Firefox with headless screenshots.
pub const MIN_FIREFOX_VERSION: [u32; 2] = [57, 0];

/// Environment variable replacing the package URL.
pub const DOWNLOAD_URL_ENV_VAR: &str = "FIREFOX_DOWNLOAD_URL";

/// Environment variable replacing the expected package digest.
pub const DOWNLOAD_SHA256_ENV_VAR: &str = "FIREFOX_DOWNLOAD_SHA256";

pub const PINNED_DOWNLOAD_URL: &str = "https://ftp.mozilla.org/pub/firefox/releases/\
     57.0b14/linux-x86_64/en-US/firefox-57.0b14.tar.bz2";

pub const PINNED_DOWNLOAD_SHA256: &str =
    "772c307edcbdab9ba9bf652c44b69b6c014b831f28cf91a958de67ea6d42ba5f";

const VERSION_TIMEOUT: Duration = Duration::from_secs(1);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

const DOWNLOAD_DIR_NAME: &str = "downloads";
const PACKAGE_FILE_NAME: &str = "firefox.tar.bz2";
const UNPACK_DIR_NAME: &str = "firefox";

// ---------------------------------------------------------------------------
// Version check
// ---------------------------------------------------------------------------

/// Version reported by `binary --version`, if it answers within a second
/// with a `Mozilla Firefox X.Y` line.
pub fn firefox_version(binary: &Path) -> Option<Vec<u32>> {
    let mut child = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + VERSION_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!(binary = %binary.display(), "no answer to --version");
                return None;
            }
        }
    }

    let output = child.wait_with_output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_firefox_version(&String::from_utf8_lossy(&output.stdout))
}

/// Numeric components following `Mozilla Firefox `; `57.0b14` reads as
/// `[57, 0]`.
pub fn parse_firefox_version(text: &str) -> Option<Vec<u32>> {
    let (_, rest) = text.split_once("Mozilla Firefox ")?;
    let number: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let parts = number
        .split('.')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<u32>, _>>()
        .ok()?;
    (!parts.is_empty()).then_some(parts)
}

/// `true` when `version` supports headless screenshots.
pub fn is_supported_version(version: &[u32]) -> bool {
    version >= MIN_FIREFOX_VERSION.as_slice()
}

fn format_version(version: &[u32]) -> String {
    version
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

// ---------------------------------------------------------------------------
// Download source
// ---------------------------------------------------------------------------

/// Where a replacement Firefox comes from and what it must hash to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirefoxDownload {
    pub url: String,
    /// Lowercase hex SHA-256 of the package.
    pub sha256: String,
}

impl FirefoxDownload {
    pub fn pinned() -> Self {
        Self {
            url: PINNED_DOWNLOAD_URL.to_string(),
            sha256: PINNED_DOWNLOAD_SHA256.to_string(),
        }
    }

    /// The pinned build with [`DOWNLOAD_URL_ENV_VAR`] and
    /// [`DOWNLOAD_SHA256_ENV_VAR`] applied.
    pub fn from_env() -> Self {
        Self::with_overrides(
            std::env::var(DOWNLOAD_URL_ENV_VAR).ok(),
            std::env::var(DOWNLOAD_SHA256_ENV_VAR).ok(),
        )
    }

    /// The pinned build with any non-empty override applied.
    pub fn with_overrides(url: Option<String>, sha256: Option<String>) -> Self {
        let pinned = Self::pinned();
        Self {
            url: url.filter(|u| !u.is_empty()).unwrap_or(pinned.url),
            sha256: sha256
                .filter(|h| !h.is_empty())
                .map(|h| h.to_ascii_lowercase())
                .unwrap_or(pinned.sha256),
        }
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Picks the Firefox binary used for screenshots.
#[derive(Debug, Clone)]
pub struct FirefoxLocator {
    configured: PathBuf,
    cache_root: PathBuf,
    download: FirefoxDownload,
}

impl FirefoxLocator {
    pub fn new(
        configured: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        download: FirefoxDownload,
    ) -> Self {
        Self {
            configured: configured.into(),
            cache_root: cache_root.into(),
            download,
        }
    }

    pub fn configured(&self) -> &Path {
        &self.configured
    }

    /// Path of the unpacked replacement binary.
    pub fn unpacked_binary(&self) -> PathBuf {
        self.cache_root
            .join(UNPACK_DIR_NAME)
            .join("firefox")
            .join("firefox")
    }

    /// Path of the verified package.
    pub fn package_path(&self) -> PathBuf {
        self.cache_root
            .join(DOWNLOAD_DIR_NAME)
            .join(PACKAGE_FILE_NAME)
    }

    /// The configured binary if it is recent enough, else the cached or
    /// freshly downloaded replacement.
    ///
    /// # Errors
    ///
    /// The configured binary is unusable and no verified replacement could
    /// be fetched or unpacked.
    pub fn locate(&self) -> Result<PathBuf> {
        match firefox_version(&self.configured) {
            Some(version) if is_supported_version(&version) => {
                tracing::debug!(
                    binary = %self.configured.display(),
                    version = %format_version(&version),
                    "using configured firefox"
                );
                return Ok(self.configured.clone());
            }
            Some(version) => tracing::info!(
                binary = %self.configured.display(),
                version = %format_version(&version),
                "configured firefox too old for screenshots"
            ),
            None => tracing::info!(
                binary = %self.configured.display(),
                "configured firefox not usable"
            ),
        }

        self.replacement().with_context(|| {
            format!(
                "firefox at {} is missing or older than {}, and no replacement is available",
                self.configured.display(),
                format_version(&MIN_FIREFOX_VERSION)
            )
        })
    }

    fn replacement(&self) -> Result<PathBuf> {
        let binary = self.unpacked_binary();
        if is_executable(&binary) {
            tracing::debug!(binary = %binary.display(), "using cached firefox");
            return Ok(binary);
        }

        let package = self.verified_package()?;
        let target = self.cache_root.join(UNPACK_DIR_NAME);
        let file = fs::File::open(&package)
            .with_context(|| format!("opening {}", package.display()))?;
        tar::Archive::new(BzDecoder::new(BufReader::new(file)))
            .unpack(&target)
            .with_context(|| format!("unpacking {} into {}", package.display(), target.display()))?;

        if !is_executable(&binary) {
            bail!(
                "package {} does not contain an executable firefox/firefox",
                package.display()
            );
        }
        tracing::info!(binary = %binary.display(), "unpacked firefox");
        Ok(binary)
    }

    /// The cached package if it still hashes right, else a fresh download.
    fn verified_package(&self) -> Result<PathBuf> {
        let package = self.package_path();
        if package.is_file() {
            match digest_file(&package) {
                Ok(digest) if digest.to_hex() == self.download.sha256 => return Ok(package),
                _ => tracing::debug!(path = %package.display(), "cached package is stale"),
            }
        }

        let downloads = self.cache_root.join(DOWNLOAD_DIR_NAME);
        fs::create_dir_all(&downloads)
            .with_context(|| format!("creating {}", downloads.display()))?;

        tracing::info!(url = %self.download.url, "downloading firefox");
        let client = reqwest::blocking::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("building download client")?;
        let mut response = client
            .get(&self.download.url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("downloading {}", self.download.url))?;

        let mut partial = tempfile::NamedTempFile::new_in(&downloads)
            .with_context(|| format!("creating download file in {}", downloads.display()))?;
        response
            .copy_to(partial.as_file_mut())
            .with_context(|| format!("downloading {}", self.download.url))?;

        let digest = digest_file(partial.path()).context("hashing downloaded package")?;
        if digest.to_hex() != self.download.sha256 {
            bail!(
                "package from {} has SHA-256 {}, expected {}",
                self.download.url,
                digest,
                self.download.sha256
            );
        }
        partial
            .persist(&package)
            .with_context(|| format!("saving {}", package.display()))?;
        Ok(package)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
