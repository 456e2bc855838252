//! Storage errors

use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record truncated at byte {0}")]
    Truncated(u64),

    #[error("Corrupt length field at byte {0}")]
    Corrupt(u64),

    #[error("Unsupported file version {found} (supported {oldest}..={current})")]
    UnsupportedVersion { found: u8, oldest: u8, current: u8 },

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("No record at index {0}")]
    OutOfRange(usize),
}

pub type Result<T> = std::result::Result<T, StorageError>;
