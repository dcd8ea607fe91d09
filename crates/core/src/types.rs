//! Identifier types
//!
//! All ids are newtypes over small integers:
//! - `TxId` and `CmdId` stamp record versions for MVCC visibility
//! - `Gid` identifies a vertex or edge across the whole cluster
//! - `LabelId`, `EdgeTypeId` and `PropertyId` are dense ids minted by the
//!   name registries; they are process-local and never persisted

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier.
///
/// Assigned monotonically by the transaction engine and never reused.
/// The value `0` is reserved for "no transaction" (e.g. an expiration
/// stamp that has not been installed yet).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TxId(pub u64);

impl TxId {
    /// The reserved "no transaction" id.
    pub const NONE: TxId = TxId(0);

    /// Raw numeric value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved "none" id.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Per-transaction command identifier.
///
/// Strictly increases within a transaction; advancing past the maximum is a
/// fatal transaction error. `0` is reserved for "no command" so that an
/// uninstalled expiration stamp reads as (TxId::NONE, CmdId::NONE).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct CmdId(pub u64);

impl CmdId {
    /// The reserved "no command" id.
    pub const NONE: CmdId = CmdId(0);

    /// The first command id of every transaction.
    pub const FIRST: CmdId = CmdId(1);

    /// Raw numeric value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CmdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd{}", self.0)
    }
}

/// Number of high bits of a `Gid` holding the worker id.
pub const GID_WORKER_BITS: u32 = 10;

/// Number of low bits of a `Gid` holding the local sequence.
pub const GID_LOCAL_BITS: u32 = 64 - GID_WORKER_BITS;

const GID_LOCAL_MASK: u64 = (1 << GID_LOCAL_BITS) - 1;

/// Global entity id.
///
/// Packs a worker id (10 high bits) and a monotonically increasing local id
/// (54 low bits) into one `u64`, so an id is unique within the cluster
/// without coordination between workers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Gid(u64);

impl Gid {
    /// Smallest representable gid (used for index range endpoints).
    pub const MIN: Gid = Gid(0);

    /// Largest representable gid (used for index range endpoints).
    pub const MAX: Gid = Gid(u64::MAX);

    /// Pack a (worker, local) pair.
    ///
    /// Panics if either component is out of range; generators guarantee the
    /// local sequence never reaches 2^54.
    pub fn new(worker_id: u16, local_id: u64) -> Gid {
        assert!((worker_id as u64) < (1 << GID_WORKER_BITS), "worker id out of range");
        assert!(local_id <= GID_LOCAL_MASK, "local id out of range");
        Gid(((worker_id as u64) << GID_LOCAL_BITS) | local_id)
    }

    /// Reconstruct from a raw packed value (durability, wire).
    pub fn from_u64(raw: u64) -> Gid {
        Gid(raw)
    }

    /// Raw packed value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Worker id component.
    pub fn worker_id(self) -> u16 {
        (self.0 >> GID_LOCAL_BITS) as u16
    }

    /// Local sequence component.
    pub fn local_id(self) -> u64 {
        self.0 & GID_LOCAL_MASK
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! dense_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u16);

        impl $name {
            /// Raw numeric value.
            pub fn raw(self) -> u16 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

dense_id! {
    /// Dense id for a vertex label, minted by the label registry.
    LabelId
}

dense_id! {
    /// Dense id for an edge type, minted by the edge-type registry.
    EdgeTypeId
}

dense_id! {
    /// Dense id for a property key, minted by the property registry.
    PropertyId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txid_none_reserved() {
        assert!(TxId::NONE.is_none());
        assert!(!TxId(1).is_none());
        assert_eq!(TxId::NONE.raw(), 0);
    }

    #[test]
    fn test_txid_ordering() {
        assert!(TxId(1) < TxId(2));
        assert!(TxId::NONE < TxId(1));
    }

    #[test]
    fn test_cmdid_first_follows_none() {
        assert!(CmdId::NONE < CmdId::FIRST);
        assert_eq!(CmdId::FIRST.raw(), 1);
    }

    #[test]
    fn test_gid_pack_unpack() {
        let gid = Gid::new(7, 123_456);
        assert_eq!(gid.worker_id(), 7);
        assert_eq!(gid.local_id(), 123_456);
        assert_eq!(Gid::from_u64(gid.as_u64()), gid);
    }

    #[test]
    fn test_gid_worker_zero() {
        // Worker 0 gids are numerically equal to their local id
        let gid = Gid::new(0, 42);
        assert_eq!(gid.as_u64(), 42);
    }

    #[test]
    fn test_gid_max_components() {
        let gid = Gid::new(1023, (1 << GID_LOCAL_BITS) - 1);
        assert_eq!(gid.worker_id(), 1023);
        assert_eq!(gid.local_id(), (1 << GID_LOCAL_BITS) - 1);
    }

    #[test]
    #[should_panic(expected = "worker id out of range")]
    fn test_gid_worker_out_of_range() {
        let _ = Gid::new(1024, 0);
    }

    #[test]
    fn test_gid_local_ids_order_within_worker() {
        // Within one worker, gid order follows local id order
        let a = Gid::new(3, 10);
        let b = Gid::new(3, 11);
        assert!(a < b);
    }

    #[test]
    fn test_dense_id_display() {
        assert_eq!(LabelId(4).to_string(), "4");
        assert_eq!(PropertyId(0).raw(), 0);
    }
}
