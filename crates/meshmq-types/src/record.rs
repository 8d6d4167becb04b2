//! # Checksummed Durable Records
//!
//! Every value the broker writes to durable storage is framed as a 4-byte
//! big-endian CRC32 over the bincode body, followed by the body itself.
//! Readers verify the checksum before decoding; a record that fails either
//! step is reported as corrupt and treated by callers as absent rather than
//! aborting the surrounding scan.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Width of the checksum prefix in bytes.
const CHECKSUM_LEN: usize = 4;

/// A record that could not be decoded.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The stored value is shorter than the checksum prefix.
    #[error("record truncated: {len} bytes")]
    Truncated {
        /// Stored length in bytes.
        len: usize,
    },

    /// The stored checksum does not match the body.
    #[error("record checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum read from the record.
        stored: u32,
        /// Checksum computed over the body.
        computed: u32,
    },

    /// The body failed to serialize or deserialize.
    #[error("record codec error: {0}")]
    Codec(String),
}

/// Encodes a value as `crc32(body) || body`.
pub fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, RecordError> {
    let body = bincode::serialize(value).map_err(|e| RecordError::Codec(e.to_string()))?;
    let checksum = crc32fast::hash(&body);
    let mut out = Vec::with_capacity(CHECKSUM_LEN + body.len());
    out.extend_from_slice(&checksum.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Verifies the checksum and decodes the body.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RecordError> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(RecordError::Truncated { len: bytes.len() });
    }
    let (prefix, body) = bytes.split_at(CHECKSUM_LEN);
    let mut stored_bytes = [0u8; CHECKSUM_LEN];
    stored_bytes.copy_from_slice(prefix);
    let stored = u32::from_be_bytes(stored_bytes);
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(RecordError::ChecksumMismatch { stored, computed });
    }
    bincode::deserialize(body).map_err(|e| RecordError::Codec(e.to_string()))
}
