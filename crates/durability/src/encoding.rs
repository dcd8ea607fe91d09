//! Self-describing tagged value encoding
//!
//! Every value written to the WAL or a snapshot carries a one-byte tag, so
//! a reader can decode a stream without out-of-band schema and can stop
//! cleanly at a tag it does not understand. All integers are little-endian.
//!
//! Tags:
//!
//! | tag  | payload                                             |
//! |------|-----------------------------------------------------|
//! | 0x00 | Null — empty                                        |
//! | 0x01 | Bool — u8                                           |
//! | 0x02 | Int64 — i64                                         |
//! | 0x03 | Float64 — f64                                       |
//! | 0x04 | String — u32 length + UTF-8 bytes                   |
//! | 0x05 | List — u32 count + tagged values                    |
//! | 0x06 | Map — u32 count + (raw string, tagged value) pairs  |
//! | 0x07 | Vertex — gid, labels, properties                    |
//! | 0x08 | Edge — gid, endpoints, type, properties             |
//!
//! Vertex and Edge composites appear only in snapshots and are assembled by
//! the snapshot module from these primitives.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use terrane_core::PropertyValue;
use thiserror::Error;
use xxhash_rust::xxh3::Xxh3;

/// Tag byte for `Null`.
pub const TAG_NULL: u8 = 0x00;
/// Tag byte for `Bool`.
pub const TAG_BOOL: u8 = 0x01;
/// Tag byte for `Int64`.
pub const TAG_INT: u8 = 0x02;
/// Tag byte for `Float64`.
pub const TAG_DOUBLE: u8 = 0x03;
/// Tag byte for `String`.
pub const TAG_STRING: u8 = 0x04;
/// Tag byte for `List`.
pub const TAG_LIST: u8 = 0x05;
/// Tag byte for `Map`.
pub const TAG_MAP: u8 = 0x06;
/// Tag byte for a snapshot vertex record.
pub const TAG_VERTEX: u8 = 0x07;
/// Tag byte for a snapshot edge record.
pub const TAG_EDGE: u8 = 0x08;

/// Nesting limit while decoding, so corrupt input cannot blow the stack.
const MAX_DEPTH: u32 = 64;

/// Errors produced while decoding a tagged stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The underlying reader failed (including an unexpected end of input).
    #[error("I/O error while decoding: {0}")]
    Io(#[from] io::Error),

    /// A tag byte that this version does not understand.
    ///
    /// Readers treat this as a clean end of the stream, not corruption.
    #[error("unknown tag 0x{0:02x}")]
    UnknownTag(u8),

    /// Structurally invalid data behind a known tag.
    #[error("corrupt stream: {0}")]
    Corrupt(String),
}

impl DecodeError {
    /// Whether this error is an unexpected end of input (a truncated tail).
    pub fn is_eof(&self) -> bool {
        matches!(self, DecodeError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Writer for the tagged encoding.
pub struct ValueEncoder<W: Write> {
    w: W,
}

impl<W: Write> ValueEncoder<W> {
    /// Wrap a writer.
    pub fn new(w: W) -> Self {
        ValueEncoder { w }
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.w
    }

    /// Write raw bytes with no tag or length (magic bytes, hashes).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.w.write_all(bytes)
    }

    /// Write an untagged u8.
    pub fn write_u8(&mut self, v: u8) -> io::Result<()> {
        self.w.write_u8(v)
    }

    /// Write an untagged u32.
    pub fn write_u32(&mut self, v: u32) -> io::Result<()> {
        self.w.write_u32::<LittleEndian>(v)
    }

    /// Write an untagged u64.
    pub fn write_u64(&mut self, v: u64) -> io::Result<()> {
        self.w.write_u64::<LittleEndian>(v)
    }

    /// Write a tagged Int64.
    pub fn write_int(&mut self, v: i64) -> io::Result<()> {
        self.w.write_u8(TAG_INT)?;
        self.w.write_i64::<LittleEndian>(v)
    }

    /// Write a length-prefixed string without a tag (composite fields).
    pub fn write_raw_string(&mut self, s: &str) -> io::Result<()> {
        self.w.write_u32::<LittleEndian>(s.len() as u32)?;
        self.w.write_all(s.as_bytes())
    }

    /// Write a tagged String.
    pub fn write_string(&mut self, s: &str) -> io::Result<()> {
        self.w.write_u8(TAG_STRING)?;
        self.write_raw_string(s)
    }

    /// Write a tagged List of Int64, the shape transaction-id sets use.
    pub fn write_int_list(&mut self, values: &[i64]) -> io::Result<()> {
        self.w.write_u8(TAG_LIST)?;
        self.w.write_u32::<LittleEndian>(values.len() as u32)?;
        for v in values {
            self.write_int(*v)?;
        }
        Ok(())
    }

    /// Write a tagged List of String.
    pub fn write_string_list(&mut self, values: &[String]) -> io::Result<()> {
        self.w.write_u8(TAG_LIST)?;
        self.w.write_u32::<LittleEndian>(values.len() as u32)?;
        for v in values {
            self.write_string(v)?;
        }
        Ok(())
    }

    /// Write a tagged property value.
    pub fn write_value(&mut self, value: &PropertyValue) -> io::Result<()> {
        match value {
            PropertyValue::Null => self.w.write_u8(TAG_NULL),
            PropertyValue::Bool(b) => {
                self.w.write_u8(TAG_BOOL)?;
                self.w.write_u8(*b as u8)
            }
            PropertyValue::Int(i) => self.write_int(*i),
            PropertyValue::Double(d) => {
                self.w.write_u8(TAG_DOUBLE)?;
                self.w.write_f64::<LittleEndian>(*d)
            }
            PropertyValue::String(s) => self.write_string(s),
            PropertyValue::List(items) => {
                self.w.write_u8(TAG_LIST)?;
                self.w.write_u32::<LittleEndian>(items.len() as u32)?;
                for item in items {
                    self.write_value(item)?;
                }
                Ok(())
            }
            PropertyValue::Map(entries) => {
                self.w.write_u8(TAG_MAP)?;
                self.w.write_u32::<LittleEndian>(entries.len() as u32)?;
                for (key, item) in entries {
                    self.write_raw_string(key)?;
                    self.write_value(item)?;
                }
                Ok(())
            }
        }
    }

    /// Write a property map as `u32 count + (raw name, tagged value)` pairs.
    pub fn write_property_pairs(&mut self, props: &[(String, PropertyValue)]) -> io::Result<()> {
        self.w.write_u32::<LittleEndian>(props.len() as u32)?;
        for (name, value) in props {
            self.write_raw_string(name)?;
            self.write_value(value)?;
        }
        Ok(())
    }
}

/// Reader for the tagged encoding.
pub struct ValueDecoder<R: Read> {
    r: R,
}

impl<R: Read> ValueDecoder<R> {
    /// Wrap a reader.
    pub fn new(r: R) -> Self {
        ValueDecoder { r }
    }

    /// Read raw bytes with no tag or length.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        self.r.read_exact(buf)?;
        Ok(())
    }

    /// Read an untagged u8.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.r.read_u8()?)
    }

    /// Read an untagged u32.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(self.r.read_u32::<LittleEndian>()?)
    }

    /// Read an untagged u64.
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(self.r.read_u64::<LittleEndian>()?)
    }

    fn expect_tag(&mut self, expected: u8) -> Result<(), DecodeError> {
        let tag = self.r.read_u8()?;
        if tag != expected {
            return Err(DecodeError::Corrupt(format!(
                "expected tag 0x{:02x}, found 0x{:02x}",
                expected, tag
            )));
        }
        Ok(())
    }

    /// Read a tagged Int64.
    pub fn read_int(&mut self) -> Result<i64, DecodeError> {
        self.expect_tag(TAG_INT)?;
        Ok(self.r.read_i64::<LittleEndian>()?)
    }

    /// Read a length-prefixed string without a tag.
    pub fn read_raw_string(&mut self) -> Result<String, DecodeError> {
        let len = self.r.read_u32::<LittleEndian>()? as usize;
        let mut buf = vec![0u8; len];
        self.r.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| DecodeError::Corrupt(e.to_string()))
    }

    /// Read a tagged String.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        self.expect_tag(TAG_STRING)?;
        self.read_raw_string()
    }

    /// Read a tagged List of Int64.
    pub fn read_int_list(&mut self) -> Result<Vec<i64>, DecodeError> {
        self.expect_tag(TAG_LIST)?;
        let count = self.r.read_u32::<LittleEndian>()?;
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(self.read_int()?);
        }
        Ok(values)
    }

    /// Read a tagged List of String.
    pub fn read_string_list(&mut self) -> Result<Vec<String>, DecodeError> {
        self.expect_tag(TAG_LIST)?;
        let count = self.r.read_u32::<LittleEndian>()?;
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(self.read_string()?);
        }
        Ok(values)
    }

    /// Read a tagged property value.
    pub fn read_value(&mut self) -> Result<PropertyValue, DecodeError> {
        self.read_value_depth(0)
    }

    fn read_value_depth(&mut self, depth: u32) -> Result<PropertyValue, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::Corrupt("value nesting too deep".into()));
        }
        let tag = self.r.read_u8()?;
        match tag {
            TAG_NULL => Ok(PropertyValue::Null),
            TAG_BOOL => Ok(PropertyValue::Bool(self.r.read_u8()? != 0)),
            TAG_INT => Ok(PropertyValue::Int(self.r.read_i64::<LittleEndian>()?)),
            TAG_DOUBLE => Ok(PropertyValue::Double(self.r.read_f64::<LittleEndian>()?)),
            TAG_STRING => Ok(PropertyValue::String(self.read_raw_string()?)),
            TAG_LIST => {
                let count = self.r.read_u32::<LittleEndian>()?;
                let mut items = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    items.push(self.read_value_depth(depth + 1)?);
                }
                Ok(PropertyValue::List(items))
            }
            TAG_MAP => {
                let count = self.r.read_u32::<LittleEndian>()?;
                let mut entries = std::collections::BTreeMap::new();
                for _ in 0..count {
                    let key = self.read_raw_string()?;
                    entries.insert(key, self.read_value_depth(depth + 1)?);
                }
                Ok(PropertyValue::Map(entries))
            }
            other => Err(DecodeError::UnknownTag(other)),
        }
    }

    /// Read a property map written by [`ValueEncoder::write_property_pairs`].
    pub fn read_property_pairs(&mut self) -> Result<Vec<(String, PropertyValue)>, DecodeError> {
        let count = self.r.read_u32::<LittleEndian>()?;
        let mut props = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let name = self.read_raw_string()?;
            props.push((name, self.read_value()?));
        }
        Ok(props)
    }
}

/// Writer adapter computing a streaming xxh3-64 over everything written.
///
/// The snapshot content hash covers every byte from the magic through the
/// trailing counts, so the whole file is written through this adapter and
/// the digest is appended raw afterwards.
pub struct HashingWriter<W: Write> {
    inner: W,
    hasher: Xxh3,
}

impl<W: Write> HashingWriter<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        HashingWriter {
            inner,
            hasher: Xxh3::new(),
        }
    }

    /// Digest of everything written so far.
    pub fn digest(&self) -> u64 {
        self.hasher.digest()
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::io::Cursor;

    fn round_trip(value: &PropertyValue) -> PropertyValue {
        let mut enc = ValueEncoder::new(Vec::new());
        enc.write_value(value).unwrap();
        let bytes = enc.into_inner();
        ValueDecoder::new(Cursor::new(bytes)).read_value().unwrap()
    }

    #[test]
    fn test_scalar_round_trip() {
        for v in [
            PropertyValue::Null,
            PropertyValue::Bool(true),
            PropertyValue::Int(-42),
            PropertyValue::Double(2.5),
            PropertyValue::from("hello"),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn test_nested_round_trip() {
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), PropertyValue::Int(1));
        let v = PropertyValue::List(vec![
            PropertyValue::Map(map),
            PropertyValue::List(vec![PropertyValue::Null]),
        ]);
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn test_unknown_tag() {
        let err = ValueDecoder::new(Cursor::new(vec![0x7fu8]))
            .read_value()
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTag(0x7f)));
    }

    #[test]
    fn test_truncated_is_eof() {
        // A string tag promising 100 bytes with none behind it
        let mut bytes = vec![TAG_STRING];
        bytes.extend_from_slice(&100u32.to_le_bytes());
        let err = ValueDecoder::new(Cursor::new(bytes)).read_value().unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn test_int_list_round_trip() {
        let mut enc = ValueEncoder::new(Vec::new());
        enc.write_int_list(&[1, 2, 3]).unwrap();
        let bytes = enc.into_inner();
        let list = ValueDecoder::new(Cursor::new(bytes)).read_int_list().unwrap();
        assert_eq!(list, vec![1, 2, 3]);
    }

    #[test]
    fn test_hashing_writer_matches_oneshot() {
        let mut w = HashingWriter::new(Vec::new());
        w.write_all(b"abc").unwrap();
        w.write_all(b"def").unwrap();
        assert_eq!(w.digest(), xxhash_rust::xxh3::xxh3_64(b"abcdef"));
    }

    proptest! {
        #[test]
        fn prop_value_round_trip(i in any::<i64>(), s in "[a-z]{0,16}", b in any::<bool>()) {
            let v = PropertyValue::List(vec![
                PropertyValue::Int(i),
                PropertyValue::from(s),
                PropertyValue::Bool(b),
            ]);
            prop_assert_eq!(round_trip(&v), v);
        }
    }
}
