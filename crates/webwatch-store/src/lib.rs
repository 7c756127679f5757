//! # webwatch-store — Durable Observation Storage
//!
//! Persists page observations and answers "what did this page look like last
//! time?". A storage root holds two things:
//!
//! ```text
//! <root>/
//! ├── record.dat     append-only log, one JSON record per line
//! └── artefacts/     content-addressed payloads (screenshots, page bodies)
//! ```
//!
//! ## Crate Structure
//!
//! - [`cas`]: artefact store, digest-named files with deduplication.
//! - [`codec`]: record line encoding.
//! - [`log`]: the append-only record file and its lazy scanner.
//! - [`query`]: filter / having / order_by / fetch over the log.
//! - [`Storage`]: the facade tying them together.
//!
//! ## Persist Order
//!
//! Artefacts are moved into the store before the record is appended, so any
//! reference that appears in the log already resolves.

pub mod cas;
pub mod codec;
pub mod error;
pub mod log;
pub mod query;

use std::fs;
use std::path::{Path, PathBuf};

use webwatch_core::observation::{fields, ROLE_RAW_CONTENT};
use webwatch_core::{Fields, MetaInfo, MetaValue, PageObservation, Persistable};

pub use cas::{ArtefactRef, ArtefactStore, EMPTY_FILE_NAME};
pub use error::StoreError;
pub use log::{LogScan, ObservationLog, StoredRecord, STORAGE_FIELD};
pub use query::{SortOrder, StorageQuery};

/// Name of the record file under the storage root.
pub const RECORD_FILE_NAME: &str = "record.dat";
/// Name of the artefact directory under the storage root.
pub const ARTEFACT_DIR_NAME: &str = "artefacts";

/// Observation storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    artefacts: ArtefactStore,
    log: ObservationLog,
}

impl Storage {
    /// Open (creating if needed) the storage rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let artefact_dir = root.join(ARTEFACT_DIR_NAME);
        fs::create_dir_all(&artefact_dir).map_err(|e| StoreError::from_io(&artefact_dir, e))?;
        tracing::debug!(root = %root.display(), "storage opened");
        Ok(Self {
            log: ObservationLog::new(root.join(RECORD_FILE_NAME)),
            artefacts: ArtefactStore::new(artefact_dir),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artefacts(&self) -> &ArtefactStore {
        &self.artefacts
    }

    pub fn log(&self) -> &ObservationLog {
        &self.log
    }

    /// Move `item`'s artefacts into the store and append its record.
    ///
    /// Returns the role → reference mapping written under `_storage`.
    ///
    /// # Errors
    ///
    /// Any artefact or log failure. Artefacts already moved before a failure
    /// stay in the store unreferenced.
    pub fn persist(&self, item: &impl Persistable) -> Result<Fields<ArtefactRef>, StoreError> {
        let mut stored = Fields::new();
        for (role, location) in item.artefacts() {
            let reference = self.artefacts.persist(&role, &location)?;
            stored.insert(role, reference);
        }
        self.log.append(&item.meta(), &stored)?;
        Ok(stored)
    }

    /// Start a query matching every field in `filters`.
    pub fn find(&self, filters: MetaInfo) -> StorageQuery<'_> {
        StorageQuery::new(&self.log, filters)
    }

    /// Query for the observation records of `url`, newest first.
    pub fn observations_of(&self, url: &str) -> StorageQuery<'_> {
        let filters: MetaInfo = [(fields::URL, MetaValue::from(url))].into_iter().collect();
        self.find(filters)
            .having([fields::TIMESTAMP])
            .order_by([fields::TIMESTAMP], SortOrder::Descending)
    }

    /// The most recent stored observation of `url`, if there is one.
    ///
    /// The screenshot comes back digest-only; the raw content location is
    /// the stored artefact's path. A record whose fields do not describe an
    /// observation is skipped with a warning and the next older one is used.
    pub fn latest_observation(&self, url: &str) -> Result<Option<PageObservation>, StoreError> {
        Ok(self.observation_history(url)?.into_iter().next())
    }

    /// Every readable stored observation of `url`, newest first.
    ///
    /// Records that cannot be turned into a [`PageObservation`] are skipped
    /// with a warning, like malformed log lines.
    pub fn observation_history(&self, url: &str) -> Result<Vec<PageObservation>, StoreError> {
        let records = self.observations_of(url).fetch()?;
        let mut observations = Vec::with_capacity(records.len());
        for record in &records {
            match self.observation_from(record) {
                Ok(observation) => observations.push(observation),
                Err(e) => tracing::warn!(
                    path = %self.log.path().display(),
                    line = record.line,
                    url = %url,
                    error = %e,
                    "skipping unreadable observation record"
                ),
            }
        }
        Ok(observations)
    }

    /// Rebuild a [`PageObservation`] from a stored record.
    pub fn observation_from(&self, record: &StoredRecord) -> Result<PageObservation, StoreError> {
        let raw_content = record
            .artefact(ROLE_RAW_CONTENT)
            .map(ArtefactRef::to_file_path)
            .transpose()?;
        Ok(PageObservation::from_meta(&record.meta, raw_content.as_deref())?)
    }
}
