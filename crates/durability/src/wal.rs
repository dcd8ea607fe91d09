//! Write-ahead log segments
//!
//! The WAL lives under `<dir>/wal/`. The active segment is `current.wal`;
//! when it exceeds the size threshold it is fsynced and renamed to
//! `wal-<max_tx_id>.log`, with the tx id zero-padded so sealed segments sort
//! chronologically by the largest transaction they contain. Re-opening a
//! directory seals any leftover active segment first, so exactly one file is
//! ever append-mode.
//!
//! Record framing, per delta:
//!
//! ```text
//! ┌─────────────────┬─────────────────────────┬────────────┐
//! │ Length (4 bytes)│ Payload (StateDelta)    │ CRC32 (4)  │
//! └─────────────────┴─────────────────────────┴────────────┘
//! ```
//!
//! Readers stop cleanly at a short read, a CRC mismatch or an unknown delta
//! tag: a torn tail ends the stream, it does not fail recovery.

use crate::delta::StateDelta;
use crate::encoding::DecodeError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use terrane_core::TxId;
use tracing::{debug, warn};

/// Name of the active segment.
pub const ACTIVE_SEGMENT: &str = "current.wal";

/// Upper bound on a single framed delta; larger lengths are treated as a
/// torn tail.
const MAX_DELTA_LEN: u32 = 64 * 1024 * 1024;

fn sealed_name(max_tx: TxId) -> String {
    format!("wal-{:020}.log", max_tx.raw())
}

/// Append-only WAL writer owning the active segment.
///
/// Shared as `Arc<Mutex<WalWriter>>`: lifecycle deltas are appended under
/// the engine lock, data deltas by accessors outside it.
pub struct WalWriter {
    dir: PathBuf,
    file: BufWriter<File>,
    size: u64,
    max_tx: TxId,
    segment_size: u64,
}

impl WalWriter {
    /// Open the WAL in `dir`, sealing any leftover active segment.
    pub fn open(dir: impl Into<PathBuf>, segment_size: u64) -> io::Result<WalWriter> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        seal_leftover_segment(&dir)?;

        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(dir.join(ACTIVE_SEGMENT))?;

        Ok(WalWriter {
            dir,
            file: BufWriter::new(file),
            size: 0,
            max_tx: TxId::NONE,
            segment_size,
        })
    }

    /// Append one delta to the active segment, rotating first if full.
    pub fn append(&mut self, delta: &StateDelta) -> io::Result<()> {
        let payload = delta.to_bytes();
        let frame_len = 8 + payload.len() as u64;
        if self.size > 0 && self.size + frame_len > self.segment_size {
            self.rotate()?;
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);

        self.file.write_u32::<LittleEndian>(payload.len() as u32)?;
        self.file.write_all(&payload)?;
        self.file.write_u32::<LittleEndian>(hasher.finalize())?;

        self.size += frame_len;
        self.max_tx = self.max_tx.max(delta.tx_id());
        Ok(())
    }

    /// Flush buffered records and fsync the active segment.
    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()
    }

    /// Seal the active segment if it contains anything, then start a fresh
    /// one. Called on shutdown so every record lands in a sorted file.
    pub fn seal(&mut self) -> io::Result<()> {
        if self.size > 0 {
            self.rotate()
        } else {
            self.flush()
        }
    }

    /// Largest transaction id appended to the active segment so far.
    pub fn max_tx(&self) -> TxId {
        self.max_tx
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.flush()?;

        // Pick a free sealed name; tx ids are unique so collisions only
        // happen for empty-max segments
        let mut tx = self.max_tx;
        let mut target = self.dir.join(sealed_name(tx));
        while target.exists() {
            tx = TxId(tx.raw() + 1);
            target = self.dir.join(sealed_name(tx));
        }
        fs::rename(self.dir.join(ACTIVE_SEGMENT), &target)?;
        debug!(segment = %target.display(), "sealed wal segment");

        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(self.dir.join(ACTIVE_SEGMENT))?;
        self.file = BufWriter::new(file);
        self.size = 0;
        self.max_tx = TxId::NONE;
        Ok(())
    }
}

/// Seal a `current.wal` left behind by a previous process, naming it after
/// the largest readable transaction id it contains.
fn seal_leftover_segment(dir: &Path) -> io::Result<()> {
    let active = dir.join(ACTIVE_SEGMENT);
    if !active.exists() {
        return Ok(());
    }

    let mut max_tx = TxId::NONE;
    if let Ok(reader) = WalReader::open(&active) {
        for delta in reader {
            max_tx = max_tx.max(delta.tx_id());
        }
    }

    let mut tx = max_tx;
    let mut target = dir.join(sealed_name(tx));
    while target.exists() {
        tx = TxId(tx.raw() + 1);
        target = dir.join(sealed_name(tx));
    }
    debug!(segment = %target.display(), "sealing leftover wal segment");
    fs::rename(active, target)
}

/// Reader over one WAL file, yielding deltas until the stream ends.
pub struct WalReader {
    path: PathBuf,
    r: BufReader<File>,
    clean_end: bool,
}

impl WalReader {
    /// Open a WAL file for reading.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<WalReader> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(WalReader {
            path,
            r: BufReader::new(file),
            clean_end: true,
        })
    }

    /// Whether the stream ended at a record boundary.
    ///
    /// False after a torn tail, a CRC mismatch or an unknown tag stopped
    /// iteration; recovery reports such a replay as partial.
    pub fn ended_cleanly(&self) -> bool {
        self.clean_end
    }

    fn read_delta(&mut self) -> Result<Option<StateDelta>, DecodeError> {
        let len = match self.r.read_u32::<LittleEndian>() {
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if len > MAX_DELTA_LEN {
            return Err(DecodeError::Corrupt(format!("delta length {} too large", len)));
        }

        let mut payload = vec![0u8; len as usize];
        self.r.read_exact(&mut payload)?;
        let stored_crc = self.r.read_u32::<LittleEndian>()?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        if hasher.finalize() != stored_crc {
            return Err(DecodeError::Corrupt("crc mismatch".into()));
        }

        StateDelta::decode(&payload[..]).map(Some)
    }
}

impl Iterator for WalReader {
    type Item = StateDelta;

    fn next(&mut self) -> Option<StateDelta> {
        match self.read_delta() {
            Ok(next) => next,
            Err(e) => {
                // Torn tails and foreign tags end the stream without failing
                // the replay
                self.clean_end = false;
                if !e.is_eof() {
                    warn!(file = %self.path.display(), error = %e, "wal stream ended early");
                }
                None
            }
        }
    }
}

/// All WAL files in `dir`, sealed segments sorted by filename (max tx id)
/// with the active segment last.
pub fn list_wal_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut sealed = Vec::new();
    if !dir.exists() {
        return Ok(sealed);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("wal-") && name.ends_with(".log") {
            sealed.push(entry.path());
        }
    }
    sealed.sort();

    let active = dir.join(ACTIVE_SEGMENT);
    if active.exists() {
        sealed.push(active);
    }
    Ok(sealed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use terrane_core::Gid;

    fn delta(tx: u64, local: u64) -> StateDelta {
        StateDelta::CreateVertex {
            tx: TxId(tx),
            gid: Gid::new(0, local),
        }
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("wal");

        let mut writer = WalWriter::open(&wal_dir, 1 << 20).unwrap();
        writer.append(&StateDelta::TxBegin { tx: TxId(1) }).unwrap();
        writer.append(&delta(1, 5)).unwrap();
        writer.append(&StateDelta::TxCommit { tx: TxId(1) }).unwrap();
        writer.flush().unwrap();

        let deltas: Vec<_> = WalReader::open(wal_dir.join(ACTIVE_SEGMENT))
            .unwrap()
            .collect();
        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[1], delta(1, 5));
    }

    #[test]
    fn test_rotation_names_by_max_tx() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("wal");

        // Tiny segment size forces a rotation on every few appends
        let mut writer = WalWriter::open(&wal_dir, 64).unwrap();
        for tx in 1..=20u64 {
            writer.append(&StateDelta::TxBegin { tx: TxId(tx) }).unwrap();
            writer.append(&StateDelta::TxCommit { tx: TxId(tx) }).unwrap();
        }
        writer.seal().unwrap();

        let files = list_wal_files(&wal_dir).unwrap();
        assert!(files.len() > 1, "expected multiple sealed segments");

        // Sorted files must replay in tx order
        let mut last = TxId::NONE;
        for file in files {
            for d in WalReader::open(file).unwrap() {
                if let StateDelta::TxBegin { tx } = d {
                    assert!(tx > last);
                    last = tx;
                }
            }
        }
        assert_eq!(last, TxId(20));
    }

    #[test]
    fn test_truncated_tail_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("wal");

        let mut writer = WalWriter::open(&wal_dir, 1 << 20).unwrap();
        writer.append(&delta(1, 1)).unwrap();
        writer.append(&delta(1, 2)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        // Chop a few bytes off the end, tearing the last record
        let path = wal_dir.join(ACTIVE_SEGMENT);
        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 3)
            .unwrap();

        let deltas: Vec<_> = WalReader::open(&path).unwrap().collect();
        assert_eq!(deltas, vec![delta(1, 1)]);
    }

    #[test]
    fn test_corrupt_record_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("wal");

        let mut writer = WalWriter::open(&wal_dir, 1 << 20).unwrap();
        writer.append(&delta(1, 1)).unwrap();
        writer.append(&delta(1, 2)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        // Flip a payload byte of the second record
        let path = wal_dir.join(ACTIVE_SEGMENT);
        let mut bytes = fs::read(&path).unwrap();
        let mid = bytes.len() - 6;
        bytes[mid] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let deltas: Vec<_> = WalReader::open(&path).unwrap().collect();
        assert_eq!(deltas, vec![delta(1, 1)]);
    }

    #[test]
    fn test_reopen_seals_leftover() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("wal");

        {
            let mut writer = WalWriter::open(&wal_dir, 1 << 20).unwrap();
            writer.append(&StateDelta::TxBegin { tx: TxId(9) }).unwrap();
            writer.flush().unwrap();
        }

        let writer = WalWriter::open(&wal_dir, 1 << 20).unwrap();
        drop(writer);

        let files = list_wal_files(&wal_dir).unwrap();
        // Sealed segment named after tx 9, plus a fresh active segment
        assert!(files[0].file_name().unwrap().to_string_lossy().contains("wal-"));
        let sealed: Vec<_> = WalReader::open(&files[0]).unwrap().collect();
        assert_eq!(sealed, vec![StateDelta::TxBegin { tx: TxId(9) }]);
    }

    #[test]
    fn test_list_files_order() {
        let dir = tempfile::tempdir().unwrap();
        let wal_dir = dir.path().join("wal");
        fs::create_dir_all(&wal_dir).unwrap();
        fs::write(wal_dir.join("wal-00000000000000000012.log"), b"").unwrap();
        fs::write(wal_dir.join("wal-00000000000000000003.log"), b"").unwrap();
        fs::write(wal_dir.join(ACTIVE_SEGMENT), b"").unwrap();

        let files = list_wal_files(&wal_dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "wal-00000000000000000003.log",
                "wal-00000000000000000012.log",
                ACTIVE_SEGMENT,
            ]
        );
    }
}
