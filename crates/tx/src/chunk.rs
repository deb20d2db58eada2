//! Payload chunks for upload outside the transaction body
//!
//! Gateways only take small payloads inline. A larger payload is submitted as
//! a data-free transaction header followed by one [`DataChunk`] per merkle
//! chunk, each carrying the proof that ties its bytes to the signed
//! `data_root`.

use std::ops::Range;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::{Result, TxError};
use crate::merkle::{MAX_CHUNK_SIZE, validate_path};

/// Largest payload sent inside the transaction body.
pub const MAX_INLINE_DATA_SIZE: usize = MAX_CHUNK_SIZE;

/// One payload chunk and its inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    /// Root the proof leads from.
    pub data_root: Vec<u8>,
    /// Length of the whole payload.
    pub data_size: u64,
    /// Merkle path from the root to this chunk.
    pub data_path: Vec<u8>,
    /// Offset of the chunk's last byte in the payload.
    pub offset: u64,
    /// The chunk bytes.
    pub chunk: Bytes,
}

impl DataChunk {
    /// Checks the proof against the root and the bytes, returning the chunk's
    /// byte range within the payload.
    pub fn verify(&self) -> Result<Range<usize>> {
        let invalid = || TxError::InvalidChunkProof(self.offset);
        let data_size = usize::try_from(self.data_size).map_err(|_| invalid())?;
        let offset = usize::try_from(self.offset).map_err(|_| invalid())?;

        let (range, data_hash) = validate_path(&self.data_root, offset, data_size, &self.data_path)
            .ok_or_else(invalid)?;
        if range.len() != self.chunk.len() || Sha256::digest(&self.chunk).as_slice() != data_hash {
            return Err(invalid());
        }
        Ok(range)
    }
}

/// Gateway JSON form of a chunk.
#[derive(Debug, Serialize, Deserialize)]
struct WireChunk {
    data_root: String,
    data_size: String,
    data_path: String,
    offset: String,
    chunk: String,
}

impl From<&DataChunk> for WireChunk {
    fn from(chunk: &DataChunk) -> Self {
        Self {
            data_root: b64url_encode(&chunk.data_root),
            data_size: chunk.data_size.to_string(),
            data_path: b64url_encode(&chunk.data_path),
            offset: chunk.offset.to_string(),
            chunk: b64url_encode(&chunk.chunk),
        }
    }
}

fn parse_decimal(field: &'static str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|e: std::num::ParseIntError| TxError::invalid_field(field, e.to_string()))
}

impl TryFrom<WireChunk> for DataChunk {
    type Error = TxError;

    fn try_from(wire: WireChunk) -> Result<Self> {
        Ok(Self {
            data_root: b64url_decode("data_root", &wire.data_root)?,
            data_size: parse_decimal("data_size", &wire.data_size)?,
            data_path: b64url_decode("data_path", &wire.data_path)?,
            offset: parse_decimal("offset", &wire.offset)?,
            chunk: b64url_decode("chunk", &wire.chunk)?.into(),
        })
    }
}

impl Serialize for DataChunk {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireChunk::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataChunk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = WireChunk::deserialize(deserializer)?;
        Self::try_from(wire).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transaction;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_chunks_reassemble_payload() {
        let data = payload(2 * MAX_CHUNK_SIZE + 5_000);
        let tx = Transaction::new(data.clone());
        let chunks = tx.data_chunks();
        assert_eq!(chunks.len(), 3);

        let mut joined = Vec::new();
        for chunk in &chunks {
            assert_eq!(chunk.data_root, tx.data_root());
            assert_eq!(chunk.data_size, data.len() as u64);
            let range = chunk.verify().unwrap();
            assert_eq!(range.start, joined.len());
            joined.extend_from_slice(&chunk.chunk);
        }
        assert_eq!(joined, data);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_chunk() {
        let tx = Transaction::new(payload(2 * MAX_CHUNK_SIZE));
        let chunks = tx.data_chunks();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| !chunk.chunk.is_empty()));
    }

    #[test]
    fn test_swapped_bytes_fail_verification() {
        let tx = Transaction::new(payload(MAX_CHUNK_SIZE + 50_000));
        let mut chunks = tx.data_chunks();
        let second = chunks[1].chunk.clone();
        chunks[0].chunk = second;
        assert_eq!(
            chunks[0].verify(),
            Err(TxError::InvalidChunkProof(chunks[0].offset))
        );
    }

    #[test]
    fn test_wire_json() {
        let tx = Transaction::new(payload(MAX_CHUNK_SIZE + 50_000));
        let chunk = &tx.data_chunks()[1];
        let json = serde_json::to_value(chunk).unwrap();
        assert_eq!(json["data_size"], (MAX_CHUNK_SIZE + 50_000).to_string());
        assert_eq!(json["offset"], chunk.offset.to_string());
        assert_eq!(json["data_root"], b64url_encode(tx.data_root()));

        let back: DataChunk = serde_json::from_value(json).unwrap();
        assert_eq!(&back, chunk);
    }
}
