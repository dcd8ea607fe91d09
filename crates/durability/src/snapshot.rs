//! Snapshot files
//!
//! A snapshot is one self-contained file describing the whole graph as seen
//! by the snapshotting transaction:
//!
//! ```text
//! MAGIC (4 bytes) || VERSION (int64) ||
//! vertex_generator_high (int64) || edge_generator_high (int64) ||
//! snapshotter_tx_id (int64) || snapshotter_snapshot (list<int64>) ||
//! indexes (list<string>, label/property interleaved) ||
//! vertices... || edges... ||
//! FOOTER: vertex_count (int64) || edge_count (int64) || hash (u64)
//! ```
//!
//! The xxh3-64 hash covers everything from the magic through the trailing
//! counts inclusive. Validation is strict: a snapshot that fails the magic,
//! version or hash check is rejected whole and recovery falls back to an
//! older file.

use crate::encoding::{
    DecodeError, HashingWriter, ValueDecoder, ValueEncoder, TAG_EDGE, TAG_VERTEX,
};
use crate::DurabilityError;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use terrane_core::{Gid, PropertyValue, TxId};
use tracing::debug;

/// Magic bytes identifying a snapshot file.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"TRSN";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: i64 = 1;

/// Size of the footer counts region: two tagged Int64 values.
const COUNTS_LEN: usize = 18;

/// Path of the snapshot written by transaction `tx` in `dir`.
pub fn snapshot_path(dir: &Path, tx: TxId) -> PathBuf {
    dir.join(format!("snapshot-{:020}.snap", tx.raw()))
}

/// All snapshot files in `dir`, newest (highest tx id) first.
pub fn list_snapshot_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("snapshot-") && name.ends_with(".snap") {
            files.push(entry.path());
        }
    }
    files.sort();
    files.reverse();
    Ok(files)
}

/// Streaming snapshot writer.
///
/// The header is written at creation; vertices must all be written before
/// the first edge; `finish` appends the counts and the content hash.
pub struct SnapshotWriter {
    enc: ValueEncoder<HashingWriter<BufWriter<File>>>,
    path: PathBuf,
    vertex_count: i64,
    edge_count: i64,
}

impl SnapshotWriter {
    /// Create the file and write the header.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        path: impl Into<PathBuf>,
        vertex_generator_high: u64,
        edge_generator_high: u64,
        snapshotter_tx: TxId,
        snapshotter_snapshot: &[TxId],
        indexes: &[(String, String)],
    ) -> crate::Result<SnapshotWriter> {
        let path = path.into();
        let file = File::create(&path)?;
        let mut enc = ValueEncoder::new(HashingWriter::new(BufWriter::new(file)));

        enc.write_bytes(&SNAPSHOT_MAGIC)?;
        enc.write_int(SNAPSHOT_VERSION)?;
        enc.write_int(vertex_generator_high as i64)?;
        enc.write_int(edge_generator_high as i64)?;
        enc.write_int(snapshotter_tx.raw() as i64)?;
        let snapshot: Vec<i64> = snapshotter_snapshot.iter().map(|t| t.raw() as i64).collect();
        enc.write_int_list(&snapshot)?;
        let interleaved: Vec<String> = indexes
            .iter()
            .flat_map(|(label, property)| [label.clone(), property.clone()])
            .collect();
        enc.write_string_list(&interleaved)?;

        Ok(SnapshotWriter {
            enc,
            path,
            vertex_count: 0,
            edge_count: 0,
        })
    }

    /// Append one vertex record.
    pub fn write_vertex(
        &mut self,
        gid: Gid,
        labels: &[String],
        properties: &[(String, PropertyValue)],
    ) -> crate::Result<()> {
        debug_assert_eq!(self.edge_count, 0, "vertices must precede edges");
        self.enc.write_u8(TAG_VERTEX)?;
        self.enc.write_u64(gid.as_u64())?;
        self.enc.write_u32(labels.len() as u32)?;
        for label in labels {
            self.enc.write_raw_string(label)?;
        }
        self.enc.write_property_pairs(properties)?;
        self.vertex_count += 1;
        Ok(())
    }

    /// Append one edge record.
    pub fn write_edge(
        &mut self,
        gid: Gid,
        from: Gid,
        to: Gid,
        edge_type: &str,
        properties: &[(String, PropertyValue)],
    ) -> crate::Result<()> {
        self.enc.write_u8(TAG_EDGE)?;
        self.enc.write_u64(gid.as_u64())?;
        self.enc.write_u64(from.as_u64())?;
        self.enc.write_u64(to.as_u64())?;
        self.enc.write_raw_string(edge_type)?;
        self.enc.write_property_pairs(properties)?;
        self.edge_count += 1;
        Ok(())
    }

    /// Write the footer (counts + hash), fsync and return the path.
    pub fn finish(mut self) -> crate::Result<PathBuf> {
        self.enc.write_int(self.vertex_count)?;
        self.enc.write_int(self.edge_count)?;

        let hashing = self.enc.into_inner();
        let digest = hashing.digest();
        let mut buffered = hashing.into_inner();
        buffered.write_all(&digest.to_le_bytes())?;
        buffered.flush()?;
        buffered.get_ref().sync_data()?;

        debug!(
            path = %self.path.display(),
            vertices = self.vertex_count,
            edges = self.edge_count,
            "snapshot written"
        );
        Ok(self.path)
    }
}

/// One vertex as stored in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotVertex {
    /// Entity id.
    pub gid: Gid,
    /// Label names.
    pub labels: Vec<String>,
    /// Property key names and values.
    pub properties: Vec<(String, PropertyValue)>,
}

/// One edge as stored in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEdge {
    /// Entity id.
    pub gid: Gid,
    /// Source vertex.
    pub from: Gid,
    /// Destination vertex.
    pub to: Gid,
    /// Edge type name.
    pub edge_type: String,
    /// Property key names and values.
    pub properties: Vec<(String, PropertyValue)>,
}

/// A fully decoded and validated snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotContents {
    /// Vertex gid generator high-water mark at snapshot time.
    pub vertex_generator_high: u64,
    /// Edge gid generator high-water mark at snapshot time.
    pub edge_generator_high: u64,
    /// The transaction that wrote the snapshot.
    pub snapshotter_tx: TxId,
    /// That transaction's snapshot set.
    pub snapshotter_snapshot: Vec<TxId>,
    /// Existing (label, property) indexes at snapshot time.
    pub indexes: Vec<(String, String)>,
    /// All vertices.
    pub vertices: Vec<SnapshotVertex>,
    /// All edges.
    pub edges: Vec<SnapshotEdge>,
}

/// Read and strictly validate a snapshot file.
pub fn read_snapshot(path: &Path) -> crate::Result<SnapshotContents> {
    let bytes = fs::read(path)?;
    if bytes.len() < SNAPSHOT_MAGIC.len() + COUNTS_LEN + 8 {
        return Err(DurabilityError::InvalidSnapshot("file too short".into()));
    }

    let hashed_len = bytes.len() - 8;
    let stored_hash = u64::from_le_bytes(bytes[hashed_len..].try_into().expect("8 bytes"));
    let computed = xxhash_rust::xxh3::xxh3_64(&bytes[..hashed_len]);
    if stored_hash != computed {
        return Err(DurabilityError::InvalidSnapshot(format!(
            "hash mismatch: stored {:#018x}, computed {:#018x}",
            stored_hash, computed
        )));
    }

    // The counts sit at the end of the hashed region; they size the record
    // streams that precede them
    let counts_at = hashed_len - COUNTS_LEN;
    let mut counts = ValueDecoder::new(&bytes[counts_at..hashed_len]);
    let vertex_count = counts.read_int()?;
    let edge_count = counts.read_int()?;
    if vertex_count < 0 || edge_count < 0 {
        return Err(DurabilityError::InvalidSnapshot("negative counts".into()));
    }

    let mut cursor = Cursor::new(&bytes[..counts_at]);
    let mut dec = ValueDecoder::new(&mut cursor);

    let mut magic = [0u8; 4];
    dec.read_bytes(&mut magic)?;
    if magic != SNAPSHOT_MAGIC {
        return Err(DurabilityError::InvalidSnapshot("bad magic bytes".into()));
    }
    let version = dec.read_int()?;
    if version != SNAPSHOT_VERSION {
        return Err(DurabilityError::InvalidSnapshot(format!(
            "unsupported version {}",
            version
        )));
    }

    let vertex_generator_high = dec.read_int()? as u64;
    let edge_generator_high = dec.read_int()? as u64;
    let snapshotter_tx = TxId(dec.read_int()? as u64);
    let snapshotter_snapshot: Vec<TxId> =
        dec.read_int_list()?.into_iter().map(|t| TxId(t as u64)).collect();

    let interleaved = dec.read_string_list()?;
    if interleaved.len() % 2 != 0 {
        return Err(DurabilityError::InvalidSnapshot(
            "odd index name count".into(),
        ));
    }
    let indexes: Vec<(String, String)> = interleaved
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();

    let mut vertices = Vec::with_capacity(vertex_count as usize);
    for _ in 0..vertex_count {
        vertices.push(read_vertex(&mut dec)?);
    }
    let mut edges = Vec::with_capacity(edge_count as usize);
    for _ in 0..edge_count {
        edges.push(read_edge(&mut dec)?);
    }

    drop(dec);
    if cursor.position() != counts_at as u64 {
        return Err(DurabilityError::InvalidSnapshot(
            "trailing bytes before footer".into(),
        ));
    }

    Ok(SnapshotContents {
        vertex_generator_high,
        edge_generator_high,
        snapshotter_tx,
        snapshotter_snapshot,
        indexes,
        vertices,
        edges,
    })
}

fn read_vertex<R: std::io::Read>(dec: &mut ValueDecoder<R>) -> Result<SnapshotVertex, DecodeError> {
    let tag = dec.read_u8()?;
    if tag != TAG_VERTEX {
        return Err(DecodeError::Corrupt(format!(
            "expected vertex record, found tag 0x{:02x}",
            tag
        )));
    }
    let gid = Gid::from_u64(dec.read_u64()?);
    let label_count = dec.read_u32()?;
    let mut labels = Vec::with_capacity(label_count.min(1024) as usize);
    for _ in 0..label_count {
        labels.push(dec.read_raw_string()?);
    }
    let properties = dec.read_property_pairs()?;
    Ok(SnapshotVertex {
        gid,
        labels,
        properties,
    })
}

fn read_edge<R: std::io::Read>(dec: &mut ValueDecoder<R>) -> Result<SnapshotEdge, DecodeError> {
    let tag = dec.read_u8()?;
    if tag != TAG_EDGE {
        return Err(DecodeError::Corrupt(format!(
            "expected edge record, found tag 0x{:02x}",
            tag
        )));
    }
    Ok(SnapshotEdge {
        gid: Gid::from_u64(dec.read_u64()?),
        from: Gid::from_u64(dec.read_u64()?),
        to: Gid::from_u64(dec.read_u64()?),
        edge_type: dec.read_raw_string()?,
        properties: dec.read_property_pairs()?,
    })
}
