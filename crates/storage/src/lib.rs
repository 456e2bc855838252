//! # rconhub Persistent Store
//!
//! Two small binary databases that survive restarts:
//!
//! - `ban` - append-only ban list with in-place deactivation
//! - `ladder` - cumulative per-account statistics, kept sorted by score
//!
//! Both sit on the same engine:
//!
//! - `schema` - declarative field table (name, kind, first version)
//! - `engine` - versioned file: header, record stream, upgrade, reset
//!
//! ## File Layout
//!
//! ```text
//! [u8 version][record][record]...
//! ```
//!
//! Integers are little-endian, strings carry a `u32` length prefix, side
//! tables a `u64` pair count.

pub mod error;
pub mod schema;
pub mod engine;
pub mod ban;
pub mod ladder;

pub use error::{Result, StorageError};
pub use schema::{Field, FieldKind, Record, RecordReader, RecordWriter, Schema};
pub use engine::{OpenOutcome, VersionedFile};
pub use ban::{BanRecord, BanStore};
pub use ladder::{LadderEntry, LadderPeaks, LadderStore, LadderTotals};
