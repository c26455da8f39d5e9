//! Journal record types and serialization for the file store.
//!
//! ## Record Format
//!
//! | Field   | Size     | Notes                              |
//! |---------|----------|------------------------------------|
//! | magic   | 4 bytes  | `AKVJ`                             |
//! | version | 2 bytes  | little-endian                      |
//! | type    | 1 byte   | 1 = set, 2 = delete                |
//! | length  | 4 bytes  | payload length, little-endian      |
//! | payload | variable | CBOR-encoded [`JournalRecord`]     |
//! | crc32   | 4 bytes  | IEEE CRC over all preceding bytes  |

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"AKVJ";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Size of the fixed record header (magic + version + type + length).
pub const HEADER_SIZE: usize = 4 + 2 + 1 + 4;

/// Size of the trailing checksum.
pub const CRC_SIZE: usize = 4;

/// A single mutation recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// A key was set.
    Set {
        /// Domain of the key.
        domain: String,
        /// The key.
        key: String,
        /// The new value.
        value: String,
    },
    /// A key was deleted.
    Delete {
        /// Domain of the key.
        domain: String,
        /// The key.
        key: String,
    },
}

impl JournalRecord {
    fn type_byte(&self) -> u8 {
        match self {
            Self::Set { .. } => 1,
            Self::Delete { .. } => 2,
        }
    }

    /// Serializes the record with its envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or exceeds 4 GiB.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload)
            .map_err(|e| StorageError::Codec(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StorageError::Codec("journal record payload too large".into()))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(self.type_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Decodes the record starting at `offset`.
    ///
    /// Returns `Ok(None)` at a clean end of input, otherwise the record and
    /// the offset of the next one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] for a torn or damaged record.
    pub fn decode_at(buf: &[u8], offset: usize) -> StorageResult<Option<(Self, usize)>> {
        let rest = &buf[offset.min(buf.len())..];
        if rest.is_empty() {
            return Ok(None);
        }
        let at = offset as u64;
        if rest.len() < HEADER_SIZE + CRC_SIZE {
            return Err(StorageError::corrupted(at, "truncated record header"));
        }
        if rest[0..4] != JOURNAL_MAGIC {
            return Err(StorageError::corrupted(at, "bad magic"));
        }
        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version != JOURNAL_VERSION {
            return Err(StorageError::corrupted(
                at,
                format!("unsupported journal version {version}"),
            ));
        }
        let type_byte = rest[6];
        let len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;
        let total = HEADER_SIZE + len + CRC_SIZE;
        if rest.len() < total {
            return Err(StorageError::corrupted(at, "truncated record payload"));
        }

        let body = &rest[..HEADER_SIZE + len];
        let stored_crc = u32::from_le_bytes([
            rest[HEADER_SIZE + len],
            rest[HEADER_SIZE + len + 1],
            rest[HEADER_SIZE + len + 2],
            rest[HEADER_SIZE + len + 3],
        ]);
        let actual_crc = compute_crc32(body);
        if stored_crc != actual_crc {
            return Err(StorageError::corrupted(
                at,
                format!("checksum mismatch: expected {stored_crc:08x}, got {actual_crc:08x}"),
            ));
        }

        let record: JournalRecord = ciborium::from_reader(&body[HEADER_SIZE..])
            .map_err(|e| StorageError::corrupted(at, e.to_string()))?;
        if record.type_byte() != type_byte {
            return Err(StorageError::corrupted(at, "record type mismatch"));
        }
        Ok(Some((record, offset + total)))
    }
}

/// Computes the IEEE CRC32 of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
