//! State deltas
//!
//! A `StateDelta` is one serializable, self-describing mutation. Transaction
//! lifecycle deltas (`TxBegin`/`TxCommit`/`TxAbort`) are appended to the WAL
//! under the engine lock, so their order in the log is a legal serialization;
//! data deltas are appended by accessors outside that lock and may interleave
//! across transactions.
//!
//! Labels, edge types and property keys travel as names: dense ids are
//! process-local and are re-minted during replay.

use crate::encoding::{DecodeError, ValueDecoder, ValueEncoder};
use std::io::{self, Read, Write};
use terrane_core::{Gid, PropertyValue, TxId};

const DELTA_TX_BEGIN: u8 = 0x01;
const DELTA_TX_COMMIT: u8 = 0x02;
const DELTA_TX_ABORT: u8 = 0x03;
const DELTA_CREATE_VERTEX: u8 = 0x04;
const DELTA_REMOVE_VERTEX: u8 = 0x05;
const DELTA_CREATE_EDGE: u8 = 0x06;
const DELTA_REMOVE_EDGE: u8 = 0x07;
const DELTA_SET_VERTEX_PROPERTY: u8 = 0x08;
const DELTA_SET_EDGE_PROPERTY: u8 = 0x09;
const DELTA_ADD_LABEL: u8 = 0x0a;
const DELTA_REMOVE_LABEL: u8 = 0x0b;
const DELTA_BUILD_INDEX: u8 = 0x0c;

/// One durable mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    /// A transaction began.
    TxBegin {
        /// The transaction.
        tx: TxId,
    },
    /// A transaction committed.
    TxCommit {
        /// The transaction.
        tx: TxId,
    },
    /// A transaction aborted.
    TxAbort {
        /// The transaction.
        tx: TxId,
    },
    /// A vertex was inserted.
    CreateVertex {
        /// Writing transaction.
        tx: TxId,
        /// The new vertex.
        gid: Gid,
    },
    /// A vertex was logically removed.
    RemoveVertex {
        /// Writing transaction.
        tx: TxId,
        /// The removed vertex.
        gid: Gid,
    },
    /// An edge was inserted.
    CreateEdge {
        /// Writing transaction.
        tx: TxId,
        /// The new edge.
        gid: Gid,
        /// Source vertex.
        from: Gid,
        /// Destination vertex.
        to: Gid,
        /// Edge type name.
        edge_type: String,
    },
    /// An edge was logically removed.
    RemoveEdge {
        /// Writing transaction.
        tx: TxId,
        /// The removed edge.
        gid: Gid,
    },
    /// A vertex property was set (`Null` clears it).
    SetVertexProperty {
        /// Writing transaction.
        tx: TxId,
        /// The vertex.
        gid: Gid,
        /// Property key name.
        property: String,
        /// New value.
        value: PropertyValue,
    },
    /// An edge property was set (`Null` clears it).
    SetEdgeProperty {
        /// Writing transaction.
        tx: TxId,
        /// The edge.
        gid: Gid,
        /// Property key name.
        property: String,
        /// New value.
        value: PropertyValue,
    },
    /// A label was added to a vertex.
    AddLabel {
        /// Writing transaction.
        tx: TxId,
        /// The vertex.
        gid: Gid,
        /// Label name.
        label: String,
    },
    /// A label was removed from a vertex.
    RemoveLabel {
        /// Writing transaction.
        tx: TxId,
        /// The vertex.
        gid: Gid,
        /// Label name.
        label: String,
    },
    /// A label-property index was built.
    BuildIndex {
        /// Transaction that initiated the build.
        tx: TxId,
        /// Label name.
        label: String,
        /// Property key name.
        property: String,
    },
}

impl StateDelta {
    /// The transaction this delta belongs to.
    pub fn tx_id(&self) -> TxId {
        match self {
            StateDelta::TxBegin { tx }
            | StateDelta::TxCommit { tx }
            | StateDelta::TxAbort { tx }
            | StateDelta::CreateVertex { tx, .. }
            | StateDelta::RemoveVertex { tx, .. }
            | StateDelta::CreateEdge { tx, .. }
            | StateDelta::RemoveEdge { tx, .. }
            | StateDelta::SetVertexProperty { tx, .. }
            | StateDelta::SetEdgeProperty { tx, .. }
            | StateDelta::AddLabel { tx, .. }
            | StateDelta::RemoveLabel { tx, .. }
            | StateDelta::BuildIndex { tx, .. } => *tx,
        }
    }

    /// Whether this is a lifecycle delta (begin/commit/abort).
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            StateDelta::TxBegin { .. } | StateDelta::TxCommit { .. } | StateDelta::TxAbort { .. }
        )
    }

    /// Encode into a writer.
    pub fn encode<W: Write>(&self, w: W) -> io::Result<()> {
        let mut enc = ValueEncoder::new(w);
        match self {
            StateDelta::TxBegin { tx } => {
                enc.write_u8(DELTA_TX_BEGIN)?;
                enc.write_u64(tx.raw())?;
            }
            StateDelta::TxCommit { tx } => {
                enc.write_u8(DELTA_TX_COMMIT)?;
                enc.write_u64(tx.raw())?;
            }
            StateDelta::TxAbort { tx } => {
                enc.write_u8(DELTA_TX_ABORT)?;
                enc.write_u64(tx.raw())?;
            }
            StateDelta::CreateVertex { tx, gid } => {
                enc.write_u8(DELTA_CREATE_VERTEX)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
            }
            StateDelta::RemoveVertex { tx, gid } => {
                enc.write_u8(DELTA_REMOVE_VERTEX)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
            }
            StateDelta::CreateEdge {
                tx,
                gid,
                from,
                to,
                edge_type,
            } => {
                enc.write_u8(DELTA_CREATE_EDGE)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
                enc.write_u64(from.as_u64())?;
                enc.write_u64(to.as_u64())?;
                enc.write_raw_string(edge_type)?;
            }
            StateDelta::RemoveEdge { tx, gid } => {
                enc.write_u8(DELTA_REMOVE_EDGE)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
            }
            StateDelta::SetVertexProperty {
                tx,
                gid,
                property,
                value,
            } => {
                enc.write_u8(DELTA_SET_VERTEX_PROPERTY)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
                enc.write_raw_string(property)?;
                enc.write_value(value)?;
            }
            StateDelta::SetEdgeProperty {
                tx,
                gid,
                property,
                value,
            } => {
                enc.write_u8(DELTA_SET_EDGE_PROPERTY)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
                enc.write_raw_string(property)?;
                enc.write_value(value)?;
            }
            StateDelta::AddLabel { tx, gid, label } => {
                enc.write_u8(DELTA_ADD_LABEL)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
                enc.write_raw_string(label)?;
            }
            StateDelta::RemoveLabel { tx, gid, label } => {
                enc.write_u8(DELTA_REMOVE_LABEL)?;
                enc.write_u64(tx.raw())?;
                enc.write_u64(gid.as_u64())?;
                enc.write_raw_string(label)?;
            }
            StateDelta::BuildIndex {
                tx,
                label,
                property,
            } => {
                enc.write_u8(DELTA_BUILD_INDEX)?;
                enc.write_u64(tx.raw())?;
                enc.write_raw_string(label)?;
                enc.write_raw_string(property)?;
            }
        }
        Ok(())
    }

    /// Encode into a fresh byte buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf).expect("encoding into a Vec cannot fail");
        buf
    }

    /// Decode one delta from a reader.
    pub fn decode<R: Read>(r: R) -> Result<StateDelta, DecodeError> {
        let mut dec = ValueDecoder::new(r);
        let tag = dec.read_u8()?;
        let tx = TxId(dec.read_u64()?);
        Ok(match tag {
            DELTA_TX_BEGIN => StateDelta::TxBegin { tx },
            DELTA_TX_COMMIT => StateDelta::TxCommit { tx },
            DELTA_TX_ABORT => StateDelta::TxAbort { tx },
            DELTA_CREATE_VERTEX => StateDelta::CreateVertex {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
            },
            DELTA_REMOVE_VERTEX => StateDelta::RemoveVertex {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
            },
            DELTA_CREATE_EDGE => StateDelta::CreateEdge {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
                from: Gid::from_u64(dec.read_u64()?),
                to: Gid::from_u64(dec.read_u64()?),
                edge_type: dec.read_raw_string()?,
            },
            DELTA_REMOVE_EDGE => StateDelta::RemoveEdge {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
            },
            DELTA_SET_VERTEX_PROPERTY => StateDelta::SetVertexProperty {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
                property: dec.read_raw_string()?,
                value: dec.read_value()?,
            },
            DELTA_SET_EDGE_PROPERTY => StateDelta::SetEdgeProperty {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
                property: dec.read_raw_string()?,
                value: dec.read_value()?,
            },
            DELTA_ADD_LABEL => StateDelta::AddLabel {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
                label: dec.read_raw_string()?,
            },
            DELTA_REMOVE_LABEL => StateDelta::RemoveLabel {
                tx,
                gid: Gid::from_u64(dec.read_u64()?),
                label: dec.read_raw_string()?,
            },
            DELTA_BUILD_INDEX => StateDelta::BuildIndex {
                tx,
                label: dec.read_raw_string()?,
                property: dec.read_raw_string()?,
            },
            other => return Err(DecodeError::UnknownTag(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_deltas() -> Vec<StateDelta> {
        let tx = TxId(7);
        let gid = Gid::new(0, 12);
        vec![
            StateDelta::TxBegin { tx },
            StateDelta::TxCommit { tx },
            StateDelta::TxAbort { tx },
            StateDelta::CreateVertex { tx, gid },
            StateDelta::RemoveVertex { tx, gid },
            StateDelta::CreateEdge {
                tx,
                gid,
                from: Gid::new(0, 1),
                to: Gid::new(0, 2),
                edge_type: "KNOWS".into(),
            },
            StateDelta::RemoveEdge { tx, gid },
            StateDelta::SetVertexProperty {
                tx,
                gid,
                property: "age".into(),
                value: PropertyValue::Int(30),
            },
            StateDelta::SetEdgeProperty {
                tx,
                gid,
                property: "weight".into(),
                value: PropertyValue::Double(0.5),
            },
            StateDelta::AddLabel {
                tx,
                gid,
                label: "Person".into(),
            },
            StateDelta::RemoveLabel {
                tx,
                gid,
                label: "Person".into(),
            },
            StateDelta::BuildIndex {
                tx,
                label: "Person".into(),
                property: "age".into(),
            },
        ]
    }

    #[test]
    fn test_round_trip_all_variants() {
        for delta in sample_deltas() {
            let bytes = delta.to_bytes();
            let decoded = StateDelta::decode(&bytes[..]).unwrap();
            assert_eq!(decoded, delta);
            assert_eq!(decoded.tx_id(), TxId(7));
        }
    }

    #[test]
    fn test_lifecycle_classifier() {
        assert!(StateDelta::TxBegin { tx: TxId(1) }.is_lifecycle());
        assert!(!StateDelta::RemoveVertex {
            tx: TxId(1),
            gid: Gid::new(0, 0)
        }
        .is_lifecycle());
    }

    #[test]
    fn test_unknown_delta_tag() {
        let mut bytes = vec![0x6fu8];
        bytes.extend_from_slice(&1u64.to_le_bytes());
        assert!(matches!(
            StateDelta::decode(&bytes[..]),
            Err(DecodeError::UnknownTag(0x6f))
        ));
    }

    proptest! {
        #[test]
        fn prop_set_property_round_trip(
            raw_tx in 1u64..1_000_000,
            local in 0u64..1_000_000,
            name in "[a-z]{1,12}",
            value in any::<i64>(),
        ) {
            let delta = StateDelta::SetVertexProperty {
                tx: TxId(raw_tx),
                gid: Gid::new(0, local),
                property: name,
                value: PropertyValue::Int(value),
            };
            prop_assert_eq!(StateDelta::decode(&delta.to_bytes()[..]).unwrap(), delta);
        }
    }
}
