//! # Observation Log — Append-Only Record File
//!
//! One record per line, encoded by [`crate::codec`]. Records are only ever
//! appended; nothing in this crate rewrites or truncates the file.
//!
//! ## Scanning
//!
//! [`ObservationLog::scan`] opens the file afresh on every call and yields
//! records lazily in append order. A missing file is an empty log. A line
//! that cannot be decoded is yielded as [`StoreError::MalformedRecord`] so
//! the caller decides whether to skip it; the scan continues past it.
//!
//! ## Visibility
//!
//! Each append is a single `write_all` of the full line followed by a flush.
//! There is no locking: one writer at a time is assumed, and a concurrent
//! reader may observe a partial final line (reported as malformed).

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use webwatch_core::{Fields, MetaInfo, MetaValue};

use crate::cas::ArtefactRef;
use crate::codec::{decode_line, encode_line};
use crate::error::StoreError;

/// Record key holding the role → artefact reference mapping.
pub const STORAGE_FIELD: &str = "_storage";

/// A record read back from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// 1-based line number in the log file.
    pub line: usize,
    /// Record metadata, without the `_storage` block.
    pub meta: MetaInfo,
    /// Artefact role → stored reference. Empty when the record had none.
    pub storage: Fields<ArtefactRef>,
}

impl StoredRecord {
    pub fn get(&self, field: &str) -> Option<&MetaValue> {
        self.meta.get(field)
    }

    /// Reference of the artefact stored under `role`, if any.
    pub fn artefact(&self, role: &str) -> Option<&ArtefactRef> {
        self.storage.get(role)
    }
}

/// Handle on a record file.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    path: PathBuf,
}

impl ObservationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// `storage` is written under `_storage` only when non-empty.
    ///
    /// # Errors
    ///
    /// [`StoreError::ReservedField`] if `meta` already uses the `_storage`
    /// key, [`StoreError::Encode`] if it cannot be encoded, and
    /// [`StoreError::Io`] if the open or write fails.
    pub fn append(&self, meta: &MetaInfo, storage: &Fields<ArtefactRef>) -> Result<(), StoreError> {
        if meta.contains_key(STORAGE_FIELD) {
            return Err(StoreError::ReservedField(STORAGE_FIELD.to_string()));
        }

        let mut record = meta.clone();
        if !storage.is_empty() {
            let refs: MetaInfo = storage
                .iter()
                .map(|(role, reference)| (role, MetaValue::from(reference.as_str())))
                .collect();
            record.insert(STORAGE_FIELD, MetaValue::Map(refs));
        }
        let mut line = encode_line(&record).map_err(StoreError::Encode)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::from_io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::from_io(&self.path, e))?;
        file.write_all(&line)
            .and_then(|()| file.flush())
            .map_err(|e| StoreError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        tracing::debug!(path = %self.path.display(), bytes = line.len(), "record appended");
        Ok(())
    }

    /// Lazily read every record in append order.
    ///
    /// # Errors
    ///
    /// Opening the file fails for a reason other than absence.
    pub fn scan(&self) -> Result<LogScan, StoreError> {
        let reader = match File::open(&self.path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::from_io(&self.path, e)),
        };
        Ok(LogScan {
            path: self.path.clone(),
            reader,
            line: 0,
            buf: Vec::new(),
        })
    }
}

/// Iterator over the records of an [`ObservationLog`].
#[derive(Debug)]
pub struct LogScan {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    line: usize,
    buf: Vec<u8>,
}

impl Iterator for LogScan {
    type Item = Result<StoredRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();
            match reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.reader = None;
                    return Some(Err(StoreError::Io {
                        path: self.path.clone(),
                        source: e,
                    }));
                }
            }
            self.line += 1;

            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text.trim(),
                Err(e) => return Some(Err(malformed(self.line, e))),
            };
            if text.is_empty() {
                continue;
            }
            return Some(parse_record(self.line, text));
        }
    }
}

fn malformed(line: usize, reason: impl std::fmt::Display) -> StoreError {
    StoreError::MalformedRecord {
        line,
        reason: reason.to_string(),
    }
}

fn parse_record(line: usize, text: &str) -> Result<StoredRecord, StoreError> {
    let mut meta = decode_line(text).map_err(|e| malformed(line, e))?;
    let storage = match meta.remove(STORAGE_FIELD) {
        None => Fields::new(),
        Some(MetaValue::Map(refs)) => refs
            .iter()
            .map(|(role, value)| {
                let text = value
                    .as_str()
                    .ok_or_else(|| malformed(line, format!("{STORAGE_FIELD}.{role} is not text")))?;
                let reference =
                    ArtefactRef::parse(text).map_err(|e| malformed(line, e))?;
                Ok((role.to_string(), reference))
            })
            .collect::<Result<Fields<ArtefactRef>, StoreError>>()?,
        Some(other) => {
            return Err(malformed(
                line,
                format!("{STORAGE_FIELD} must be a map, found {}", other.kind_name()),
            ))
        }
    };
    Ok(StoredRecord {
        line,
        meta,
        storage,
    })
}
