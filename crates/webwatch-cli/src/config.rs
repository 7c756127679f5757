//! # Watch Configuration
//!
//! Which pages to observe. The file is TOML with one `[site.<name>]` table
//! per page:
//!
//! ```toml
//! [site.example]
//! url = "https://example.org/"
//! ```
//!
//! ## Discovery
//!
//! The first of these that names an existing file wins:
//!
//! 1. the `--config` path,
//! 2. `config.toml` in the working directory,
//! 3. the path in `WEBWATCHER_CONFIG_PATH`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable naming a configuration file.
pub const CONFIG_PATH_ENV_VAR: &str = "WEBWATCHER_CONFIG_PATH";

/// File looked for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Printed by `webwatch show-config-template`.
pub const CONFIG_TEMPLATE: &str = "\
# webwatch configuration
#
# Every [site.<name>] table is one page to watch. The name is for your own
# reference; `url` is the page to fetch and screenshot.

[site.example]
url = \"https://example.org/\"

[site.rust-blog]
url = \"https://blog.rust-lang.org/\"
";

/// Printed to stderr when no configuration file can be found.
pub const MISSING_CONFIG_GUIDANCE: &str = "\
webwatch needs a configuration file telling it which pages to watch,
and none was found. Provide one in any of these ways:
* on the command line with --config <file>
* a file called `config.toml` in the current directory
* a path in the WEBWATCHER_CONFIG_PATH environment variable
To see a sample configuration file, run:
\twebwatch show-config-template
";

/// One page to observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUnderObservation {
    /// Site name from the configuration.
    pub name: String,
    pub url: String,
}

/// Parsed watch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Pages in file order.
    pub pages: Vec<PageUnderObservation>,
}

#[derive(Deserialize)]
struct RawConfig {
    site: Option<toml::Table>,
}

#[derive(Deserialize)]
struct RawSite {
    url: Option<String>,
}

impl WatchConfig {
    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|e| e.at(path))
    }

    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })?;
        let sites = raw.site.ok_or(ConfigError::NoSites { path: None })?;

        let mut pages = Vec::with_capacity(sites.len());
        for (name, value) in sites {
            let site: RawSite = value.try_into().map_err(|e: toml::de::Error| {
                ConfigError::InvalidSite {
                    site: name.clone(),
                    reason: e.message().to_string(),
                }
            })?;
            let url = site
                .url
                .ok_or_else(|| ConfigError::MissingUrl { site: name.clone() })?;
            pages.push(PageUnderObservation { name, url });
        }
        Ok(Self { pages })
    }
}

/// Locate the configuration file.
///
/// `env_path` is the value of [`CONFIG_PATH_ENV_VAR`], if set.
pub fn find_config_path(
    explicit: Option<&Path>,
    working_dir: &Path,
    env_path: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| p.is_file()) {
        return Some(path.to_path_buf());
    }
    if let Some(path) = explicit {
        tracing::warn!(path = %path.display(), "configuration file not found, searching defaults");
    }
    let in_working_dir = working_dir.join(DEFAULT_CONFIG_FILE);
    if in_working_dir.is_file() {
        return Some(in_working_dir);
    }
    env_path.filter(|p| p.is_file())
}

/// [`find_config_path`] against the process working directory and
/// environment.
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_path = std::env::var_os(CONFIG_PATH_ENV_VAR).map(PathBuf::from);
    find_config_path(explicit, &working_dir, env_path)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration{}: {source}", describe(.path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },
    #[error("configuration{} specifies no sites", describe(.path))]
    NoSites { path: Option<PathBuf> },
    #[error("no url specified for site {site:?}")]
    MissingUrl { site: String },
    #[error("invalid settings for site {site:?}: {reason}")]
    InvalidSite { site: String, reason: String },
}

impl ConfigError {
    fn at(self, file: &Path) -> Self {
        match self {
            Self::Parse { source, .. } => Self::Parse {
                path: Some(file.to_path_buf()),
                source,
            },
            Self::NoSites { .. } => Self::NoSites {
                path: Some(file.to_path_buf()),
            },
            other => other,
        }
    }
}

fn describe(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}
