//! Deep hash over nested byte lists
//!
//! The network signs a structured value rather than a flat byte string. Each
//! node is hashed with SHA-384 together with a tag naming its kind and length,
//! so that no two different structures can produce the same input:
//!
//! ```text
//! blob(b)  = H(H("blob" || len(b)) || H(b))
//! list(xs) = fold(H("list" || len(xs)), |acc, x| H(acc || deep_hash(x)))
//! ```
//!
//! Lengths are written as ASCII decimal.

use sha2::{Digest, Sha384};

/// Output size of the deep hash.
pub const DEEP_HASH_LENGTH: usize = 48;

/// A node of the structure being hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepHashItem {
    /// A leaf byte string.
    Blob(Vec<u8>),
    /// An ordered list of nodes.
    List(Vec<DeepHashItem>),
}

impl DeepHashItem {
    /// A leaf from anything byte-like.
    pub fn blob(bytes: impl AsRef<[u8]>) -> Self {
        Self::Blob(bytes.as_ref().to_vec())
    }
}

fn sha384(parts: &[&[u8]]) -> [u8; DEEP_HASH_LENGTH] {
    let mut hasher = Sha384::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; DEEP_HASH_LENGTH];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn tag_hash(kind: &str, len: usize) -> [u8; DEEP_HASH_LENGTH] {
    sha384(&[kind.as_bytes(), len.to_string().as_bytes()])
}

/// Hashes `item` and its children.
pub fn deep_hash(item: &DeepHashItem) -> [u8; DEEP_HASH_LENGTH] {
    match item {
        DeepHashItem::Blob(bytes) => {
            let tag = tag_hash("blob", bytes.len());
            let data = sha384(&[bytes.as_slice()]);
            sha384(&[tag.as_slice(), data.as_slice()])
        }
        DeepHashItem::List(items) => items
            .iter()
            .fold(tag_hash("list", items.len()), |acc, child| {
                sha384(&[acc.as_slice(), deep_hash(child).as_slice()])
            }),
    }
}
