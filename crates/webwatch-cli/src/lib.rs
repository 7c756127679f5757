//! # webwatch-cli — Watching Web Pages for Changes
//!
//! Provides the `webwatch` command. Each run fetches and screenshots every
//! configured page, compares the result with the page's latest stored
//! observation, prints what changed and stores the new observation.
//!
//! ## Subcommands
//!
//! - `webwatch run` — observe every configured page.
//! - `webwatch show-config-template` — print a sample configuration.
//! - `webwatch history <url>` — list stored observations of a page.
//!
//! ```bash
//! webwatch show-config-template > config.toml
//! webwatch run
//! webwatch -v run --config sites.toml
//! webwatch history https://example.org/ --limit 10
//! ```
//!
//! ## Collaborators
//!
//! Fetching and screenshotting sit behind the [`fetch::PageFetcher`] and
//! [`screenshot::Screenshotter`] traits so the run loop can be driven by
//! stubs in tests. [`browser::FirefoxLocator`] makes sure the screenshots
//! come from a Firefox recent enough to take them.

pub mod browser;
pub mod config;
pub mod environment;
pub mod fetch;
pub mod history;
pub mod observe;
pub mod screenshot;
pub mod watch;
