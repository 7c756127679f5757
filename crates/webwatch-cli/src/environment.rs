//! Local directories used by webwatch.

use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data root.
pub const DATA_ROOT_ENV_VAR: &str = "WEBWATCHER_DATA_ROOT";

const APP_DIR_NAME: &str = "webwatcher";
const STORAGE_DIR_NAME: &str = "storage";

/// Environment variable overriding the cache root.
pub const CACHE_ROOT_ENV_VAR: &str = "WEBWATCHER_CACHE_ROOT";

/// Pick the data root and make sure it exists.
///
/// Preference: `explicit` (flag or environment), then the platform data
/// directory. If the chosen directory cannot be created the system temp
/// directory is used instead.
pub fn resolve_data_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    resolve_root("data", explicit, dirs::data_dir())
}

/// Pick the cache root (downloaded browsers) and make sure it exists.
///
/// Same preference order as [`resolve_data_root`], with the platform cache
/// directory in place of the data directory.
pub fn resolve_cache_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    resolve_root("cache", explicit, dirs::cache_dir())
}

fn resolve_root(
    purpose: &str,
    explicit: Option<&Path>,
    platform_dir: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    let preferred = explicit
        .map(Path::to_path_buf)
        .or_else(|| platform_dir.map(|d| d.join(APP_DIR_NAME)));

    if let Some(root) = preferred {
        match fs::create_dir_all(&root) {
            Ok(()) => return Ok(root),
            Err(e) => tracing::warn!(
                path = %root.display(),
                error = %e,
                "cannot use {purpose} root, falling back to temp directory"
            ),
        }
    }

    let fallback = std::env::temp_dir().join(APP_DIR_NAME);
    fs::create_dir_all(&fallback).map_err(|e| {
        anyhow::anyhow!("cannot create {purpose} root {}: {e}", fallback.display())
    })?;
    Ok(fallback)
}

/// Storage directory under a data root.
pub fn storage_dir(data_root: &Path) -> PathBuf {
    data_root.join(STORAGE_DIR_NAME)
}
