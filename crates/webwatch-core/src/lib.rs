//! # webwatch-core — Foundational Types for webwatch
//!
//! This crate is the leaf of the webwatch workspace. It defines the types
//! every other crate agrees on: how artefact content is identified, how
//! record values are represented, how timestamps are written, and what an
//! observation of a page looks like.
//!
//! ## Key Design Principles
//!
//! 1. **Digest is identity.** Two artefacts are the same artefact exactly
//!    when their [`ContentDigest`] values are equal. Paths and references are
//!    derived from the digest, never the other way around.
//!
//! 2. **Streaming hasher.** [`digest_file()`] and [`digest_reader()`] read in
//!    fixed 8 KiB chunks. The chunk size is a performance knob only.
//!
//! 3. **Microsecond timestamps.** [`Timestamp`] truncates to microseconds so
//!    that the textual record format round-trips to an equal value.
//!
//! 4. **Absence is a value.** A missing screenshot, a missing body, or an
//!    unknown availability are ordinary states of a [`PageObservation`], not
//!    errors.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `webwatch-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod observation;
pub mod temporal;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use digest::{digest_bytes, digest_file, digest_reader, ContentDigest, CHUNK_SIZE};
pub use error::{ErrorKind, HashError, ValueError};
pub use observation::{Availability, PageObservation, Persistable, Screenshot};
pub use temporal::Timestamp;
pub use value::{Fields, MetaInfo, MetaValue};
