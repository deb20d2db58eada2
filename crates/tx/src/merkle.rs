//! Data root computation
//!
//! Transaction data is split into chunks of at most [`MAX_CHUNK_SIZE`] bytes
//! and committed to with a SHA-256 merkle tree whose nodes also commit to byte
//! offsets. The root goes into the signed transaction as `data_root`.
//!
//! Chunking rules:
//! - while at least [`MAX_CHUNK_SIZE`] bytes remain, cut a full chunk, unless
//!   that would leave a non-empty tail shorter than [`MIN_CHUNK_SIZE`], in
//!   which case the remainder is split in half (rounding the first half up)
//! - whatever remains becomes the final chunk, even when it is empty
//!
//! Node ids:
//!
//! ```text
//! leaf   = H(H(H(chunk)) || H(note(max_byte_range)))
//! branch = H(H(left.id) || H(right.id) || H(note(left.max_byte_range)))
//! ```
//!
//! where `note` is a 32-byte big-endian integer. An odd node at the end of a
//! layer is carried up unchanged. Empty data has an empty root.
//!
//! A chunk's inclusion proof (`data_path`) lists, from the root down, every
//! branch as `left.id || right.id || note(left.max_byte_range)`, followed by
//! the leaf as `data_hash || note(max_byte_range)`.
//!
//! ## Example Usage
//!
//! ```
//! use permakey_tx::merkle::{MAX_CHUNK_SIZE, chunk_data, data_root};
//!
//! assert!(data_root(b"").is_empty());
//! assert_eq!(data_root(b"hello").len(), 32);
//!
//! let chunks = chunk_data(&vec![0u8; MAX_CHUNK_SIZE + 1000]);
//! assert_eq!(chunks.len(), 2);
//! ```

use std::ops::Range;

use sha2::{Digest, Sha256};

/// Largest chunk size.
pub const MAX_CHUNK_SIZE: usize = 256 * 1024;

/// Smallest size of a chunk that is not the last one.
pub const MIN_CHUNK_SIZE: usize = 32 * 1024;

/// Size of an offset note.
pub const NOTE_SIZE: usize = 32;

/// Size of a node id.
pub const HASH_SIZE: usize = 32;

/// A chunk's data hash and byte range within the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// SHA-256 of the chunk bytes.
    pub data_hash: [u8; HASH_SIZE],
    /// Offset of the first byte.
    pub min_byte_range: usize,
    /// Offset one past the last byte.
    pub max_byte_range: usize,
}

impl Chunk {
    /// Number of bytes in the chunk.
    pub const fn len(&self) -> usize {
        self.max_byte_range - self.min_byte_range
    }

    /// Returns true for the trailing empty chunk.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inclusion proof of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    /// Offset of the chunk's last byte.
    pub offset: usize,
    /// Branch and leaf segments from the root down.
    pub data_path: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    id: [u8; HASH_SIZE],
    max_byte_range: usize,
}

fn hash(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn note(value: usize) -> [u8; NOTE_SIZE] {
    let mut out = [0u8; NOTE_SIZE];
    out[NOTE_SIZE - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    out
}

fn note_value(bytes: &[u8]) -> Option<usize> {
    let (high, low) = bytes.split_at(NOTE_SIZE - 8);
    if high.iter().any(|&b| b != 0) {
        return None;
    }
    usize::try_from(u64::from_be_bytes(low.try_into().ok()?)).ok()
}

/// Splits `data` into chunks.
pub fn chunk_data(data: &[u8]) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(data.len() / MAX_CHUNK_SIZE + 1);
    let mut rest = data;
    let mut cursor = 0;

    while rest.len() >= MAX_CHUNK_SIZE {
        let mut size = MAX_CHUNK_SIZE;
        let next = rest.len() - MAX_CHUNK_SIZE;
        if next > 0 && next < MIN_CHUNK_SIZE {
            size = rest.len().div_ceil(2);
        }

        let (chunk, tail) = rest.split_at(size);
        chunks.push(Chunk {
            data_hash: hash(&[chunk]),
            min_byte_range: cursor,
            max_byte_range: cursor + size,
        });
        cursor += size;
        rest = tail;
    }

    chunks.push(Chunk {
        data_hash: hash(&[rest]),
        min_byte_range: cursor,
        max_byte_range: cursor + rest.len(),
    });
    chunks
}

fn leaf(chunk: &Chunk) -> Node {
    Node {
        id: hash(&[
            hash(&[chunk.data_hash.as_slice()]).as_slice(),
            hash(&[note(chunk.max_byte_range).as_slice()]).as_slice(),
        ]),
        max_byte_range: chunk.max_byte_range,
    }
}

fn branch(left: Node, right: Node) -> Node {
    Node {
        id: hash(&[
            hash(&[left.id.as_slice()]).as_slice(),
            hash(&[right.id.as_slice()]).as_slice(),
            hash(&[note(left.max_byte_range).as_slice()]).as_slice(),
        ]),
        max_byte_range: right.max_byte_range,
    }
}

fn build_root(mut layer: Vec<Node>) -> Option<Node> {
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => branch(*left, *right),
                _ => pair[0],
            })
            .collect();
    }
    layer.pop()
}

/// Merkle root over `chunks`.
pub fn root_of(chunks: &[Chunk]) -> Option<[u8; HASH_SIZE]> {
    build_root(chunks.iter().map(leaf).collect()).map(|node| node.id)
}

/// Inclusion proofs for `chunks`, in chunk order.
pub fn proofs_of(chunks: &[Chunk]) -> Vec<Proof> {
    // Segments per leaf, collected bottom-up.
    let mut segments: Vec<Vec<Vec<u8>>> = chunks
        .iter()
        .map(|chunk| {
            let end = note(chunk.max_byte_range);
            vec![[chunk.data_hash.as_slice(), end.as_slice()].concat()]
        })
        .collect();

    let mut layer: Vec<(Node, Range<usize>)> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| (leaf(chunk), i..i + 1))
        .collect();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [(left, lhs), (right, rhs)] => {
                    let segment = [
                        left.id.as_slice(),
                        right.id.as_slice(),
                        note(left.max_byte_range).as_slice(),
                    ]
                    .concat();
                    for leaf_segments in &mut segments[lhs.start..rhs.end] {
                        leaf_segments.push(segment.clone());
                    }
                    (branch(*left, *right), lhs.start..rhs.end)
                }
                _ => pair[0].clone(),
            })
            .collect();
    }

    chunks
        .iter()
        .zip(segments)
        .map(|(chunk, leaf_segments)| Proof {
            offset: chunk.max_byte_range.saturating_sub(1),
            data_path: leaf_segments.into_iter().rev().flatten().collect(),
        })
        .collect()
}

/// Walks `data_path` from `root` towards the chunk holding byte `offset` of
/// `data_size` bytes of data.
///
/// Returns the chunk's byte range and data hash when every node on the path
/// hashes to its parent.
pub fn validate_path(
    root: &[u8],
    offset: usize,
    data_size: usize,
    data_path: &[u8],
) -> Option<(Range<usize>, [u8; HASH_SIZE])> {
    if data_size == 0 {
        return None;
    }
    let target = offset.min(data_size - 1);
    let mut id: [u8; HASH_SIZE] = root.try_into().ok()?;
    let (mut left_bound, mut right_bound) = (0, data_size);
    let mut rest = data_path;

    loop {
        if rest.len() == HASH_SIZE + NOTE_SIZE {
            let (data_hash, end) = rest.split_at(HASH_SIZE);
            if hash(&[hash(&[data_hash]).as_slice(), hash(&[end]).as_slice()]) != id {
                return None;
            }
            return Some((left_bound..right_bound, data_hash.try_into().ok()?));
        }
        if rest.len() < 2 * HASH_SIZE + NOTE_SIZE {
            return None;
        }

        let (left, tail) = rest.split_at(HASH_SIZE);
        let (right, tail) = tail.split_at(HASH_SIZE);
        let (boundary, tail) = tail.split_at(NOTE_SIZE);
        if hash(&[
            hash(&[left]).as_slice(),
            hash(&[right]).as_slice(),
            hash(&[boundary]).as_slice(),
        ]) != id
        {
            return None;
        }

        let boundary = note_value(boundary)?;
        if target < boundary {
            id = left.try_into().ok()?;
            right_bound = right_bound.min(boundary);
        } else {
            id = right.try_into().ok()?;
            left_bound = left_bound.max(boundary);
        }
        rest = tail;
    }
}

/// The `data_root` field for `data`: 32 bytes, or empty for empty data.
pub fn data_root(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    root_of(&chunk_data(data))
        .map(|root| root.to_vec())
        .unwrap_or_default()
}
