//! Durability pipeline: state-delta encoding, WAL segments, snapshot files
//!
//! Everything on disk uses one self-describing tagged value encoding, shared
//! between the WAL and snapshots. The crate only knows about formats and
//! files; replaying recovered state into a live graph is orchestrated by the
//! engine crate.
//!
//! Directory layout under the configured durability directory:
//!
//! ```text
//! <dir>/wal/current.wal          active WAL segment
//! <dir>/wal/wal-<max_tx>.log     sealed WAL segments, sorted by max tx id
//! <dir>/snapshots/snapshot-<tx>.snap
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delta;
pub mod encoding;
pub mod snapshot;
pub mod wal;

pub use delta::StateDelta;
pub use encoding::{DecodeError, HashingWriter, ValueDecoder, ValueEncoder};
pub use snapshot::{
    list_snapshot_files, read_snapshot, snapshot_path, SnapshotContents, SnapshotEdge,
    SnapshotVertex, SnapshotWriter,
};
pub use wal::{list_wal_files, WalReader, WalWriter};

use thiserror::Error;

/// Errors produced by the durability pipeline.
#[derive(Debug, Error)]
pub enum DurabilityError {
    /// Underlying file I/O failed.
    #[error("durability I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A snapshot file failed validation (magic, version or content hash).
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result alias for durability operations.
pub type Result<T> = std::result::Result<T, DurabilityError>;

impl From<DurabilityError> for terrane_core::StorageError {
    fn from(e: DurabilityError) -> Self {
        terrane_core::StorageError::Durability(e.to_string())
    }
}
