//! Error types for the storage core
//!
//! `StorageError` is the error surface of every public storage operation.
//! Serialization failures and deleted-record reads are ordinary outcomes a
//! caller is expected to handle (by aborting and retrying); `Fatal` marks
//! invariant violations where continuing would corrupt state.

use crate::value::ValueError;
use std::io;
use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the storage core.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another transaction modified the record first; the caller must abort.
    #[error("serialization failure: a concurrent transaction modified the record first")]
    Serialization,

    /// A current-state read hit a record the reading transaction has deleted.
    #[error("record was deleted by the current transaction")]
    RecordDeleted,

    /// An index for this (label, property) pair already exists.
    #[error("index on :{label}({property}) already exists")]
    IndexExists {
        /// Label name of the requested index.
        label: String,
        /// Property name of the requested index.
        property: String,
    },

    /// Transaction-level failure: command-id overflow, use after commit,
    /// cooperative abort.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// The operation would touch a record owned by another worker.
    #[error("not yet implemented: {0}")]
    NotYetImplemented(&'static str),

    /// Durability pipeline failure (WAL append, snapshot write).
    #[error("durability error: {0}")]
    Durability(String),

    /// Invariant violation; the storage state can no longer be trusted.
    #[error("invariant violation: {0}")]
    Fatal(String),
}

impl StorageError {
    /// Build a `Transaction` error.
    pub fn transaction(msg: impl Into<String>) -> Self {
        StorageError::Transaction(msg.into())
    }

    /// Build a `Durability` error.
    pub fn durability(msg: impl Into<String>) -> Self {
        StorageError::Durability(msg.into())
    }

    /// Build a `Fatal` error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        StorageError::Fatal(msg.into())
    }

    /// Whether this is a serialization conflict (retryable after abort).
    pub fn is_serialization(&self) -> bool {
        matches!(self, StorageError::Serialization)
    }

    /// Whether this error means state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Fatal(_))
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Durability(e.to_string())
    }
}

impl From<ValueError> for StorageError {
    fn from(e: ValueError) -> Self {
        StorageError::Transaction(e.to_string())
    }
}
