//! Core types for the Terrane graph storage engine
//!
//! This crate defines the foundational types shared by every layer:
//! - Transaction and command identifiers (`TxId`, `CmdId`)
//! - Global entity ids packing a worker id and a local sequence (`Gid`)
//! - Dense ids minted by the name registries (`LabelId`, `EdgeTypeId`, `PropertyId`)
//! - The property value model with its total ordering (`PropertyValue`)
//! - The error hierarchy (`StorageError`, `ValueError`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StorageError};
pub use types::{CmdId, EdgeTypeId, Gid, LabelId, PropertyId, TxId};
pub use value::{PropertyValue, ValueError};
