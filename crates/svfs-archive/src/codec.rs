//! Fixed-width integer fields and the archive header layout.
//!
//! ```text
//! +-------------------------+
//! | data offset      (u48)  |
//! | hash length      (u48)  |
//! | hash bytes       (utf8) |
//! +-------------------------+
//! | name length      (u48)  |  repeated per entry,
//! | data length      (u48)  |  in payload order
//! | name bytes       (utf8) |
//! +-------------------------+
//! | terminator  (u48 == 0)  |
//! +-------------------------+
//! | payload bytes ...       |  starts at data offset
//! +-------------------------+
//! ```
//!
//! Every integer is a 6-byte big-endian unsigned value.

use std::fmt;
use std::path::Path;

use crate::error::{ArchiveError, ArchiveResult};

/// Width in bytes of every length/offset field.
pub const INT_SIZE: usize = 6;

/// Unsigned integer restricted to 48 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct U48(u64);

impl U48 {
    pub const MAX: U48 = U48((1 << 48) - 1);
    pub const ZERO: U48 = U48(0);

    /// Range-check `value`, naming `field` in the error.
    pub fn new(field: &'static str, value: u64) -> ArchiveResult<Self> {
        if value > Self::MAX.0 {
            return Err(ArchiveError::ValueOutOfRange {
                field,
                value: value as i128,
            });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn to_be_bytes(self) -> [u8; INT_SIZE] {
        let b = self.0.to_be_bytes();
        [b[2], b[3], b[4], b[5], b[6], b[7]]
    }

    pub fn from_be_bytes(bytes: [u8; INT_SIZE]) -> Self {
        let mut wide = [0u8; 8];
        wide[2..].copy_from_slice(&bytes);
        Self(u64::from_be_bytes(wide))
    }
}

impl fmt::Display for U48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u64> for U48 {
    type Error = ArchiveError;

    fn try_from(value: u64) -> ArchiveResult<Self> {
        Self::new("value", value)
    }
}

impl TryFrom<usize> for U48 {
    type Error = ArchiveError;

    fn try_from(value: usize) -> ArchiveResult<Self> {
        Self::new("value", value as u64)
    }
}

impl TryFrom<i64> for U48 {
    type Error = ArchiveError;

    fn try_from(value: i64) -> ArchiveResult<Self> {
        if value < 0 {
            return Err(ArchiveError::ValueOutOfRange {
                field: "value",
                value: value as i128,
            });
        }
        Self::new("value", value as u64)
    }
}

impl From<U48> for u64 {
    fn from(value: U48) -> Self {
        value.0
    }
}

/// Total header length for a hash of `hash_len` bytes followed by index
/// records whose names have the given byte lengths.
pub fn header_len(hash_len: usize, name_lens: impl IntoIterator<Item = usize>) -> u64 {
    let int = INT_SIZE as u64;
    let records: u64 = name_lens
        .into_iter()
        .map(|len| int + int + len as u64)
        .sum();
    int + int + hash_len as u64 + records + int
}

/// Index record as it appears in the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRecord {
    pub name: String,
    pub length: u64,
}

/// Parsed archive header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub data_offset: u64,
    pub hash: String,
    pub records: Vec<IndexRecord>,
}

impl ArchiveHeader {
    /// Parse the header at the start of `data`. `origin` only labels errors.
    ///
    /// Fails when a field runs past the end of `data`, when a string is not
    /// UTF-8, or when the declared data offset disagrees with where the
    /// header actually ends.
    pub fn parse(data: &[u8], origin: &Path) -> ArchiveResult<Self> {
        let mut reader = HeaderReader {
            data,
            pos: 0,
            origin,
        };

        let data_offset = reader.read_u48("data offset")?;
        let hash_len = reader.read_u48("hash length")?;
        let hash = reader.read_str(hash_len, "hash")?;

        let mut records = Vec::new();
        loop {
            let name_len = reader.read_u48("name length")?;
            if name_len == 0 {
                break;
            }
            let length = reader.read_u48("data length")?;
            let name = reader.read_str(name_len, "entry name")?;
            records.push(IndexRecord { name, length });
        }

        if reader.pos as u64 != data_offset {
            return Err(ArchiveError::malformed(
                origin,
                format!(
                    "declared data offset {data_offset} but header ends at {}",
                    reader.pos
                ),
            ));
        }

        Ok(Self {
            data_offset,
            hash,
            records,
        })
    }

    /// Encoded length of this header.
    pub fn encoded_len(&self) -> u64 {
        header_len(self.hash.len(), self.records.iter().map(|r| r.name.len()))
    }
}

struct HeaderReader<'a> {
    data: &'a [u8],
    pos: usize,
    origin: &'a Path,
}

impl<'a> HeaderReader<'a> {
    fn take(&mut self, len: u64, what: &str) -> ArchiveResult<&'a [u8]> {
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| self.pos.checked_add(len))
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                ArchiveError::malformed(
                    self.origin,
                    format!("truncated {what} at offset {}", self.pos),
                )
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u48(&mut self, what: &str) -> ArchiveResult<u64> {
        let bytes = self.take(INT_SIZE as u64, what)?;
        let mut field = [0u8; INT_SIZE];
        field.copy_from_slice(bytes);
        Ok(U48::from_be_bytes(field).get())
    }

    fn read_str(&mut self, len: u64, what: &str) -> ArchiveResult<String> {
        let offset = self.pos;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            ArchiveError::malformed(
                self.origin,
                format!("{what} at offset {offset} is not valid UTF-8"),
            )
        })
    }
}
