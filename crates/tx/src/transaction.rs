//! Format-2 data transactions
//!
//! A [`Transaction`] carries a payload, its tags and the fields the network
//! needs to price and order it. Signing sets the owner to the signer's modulus,
//! signs the deep hash of the canonical fields with RSA-PSS and derives the
//! identifier from the signature. Because the PSS salt is random, signing the
//! same content twice yields two different identifiers.
//!
//! ## Example Usage
//!
//! ```
//! use permakey_primitives::{Seed, generate_keypair};
//! use permakey_tx::{Tag, Transaction, Winston};
//!
//! let key = generate_keypair(&Seed::new([4u8; 32]), 1024).unwrap();
//!
//! let mut tx = Transaction::new(b"hello".to_vec())
//!     .with_tag(Tag::content_type("text/plain"))
//!     .with_reward(Winston::from(1_000u64))
//!     .with_anchor(vec![0u8; 32]);
//! tx.sign(&key).unwrap();
//!
//! tx.verify().unwrap();
//! assert_eq!(tx.id().unwrap().to_string().len(), 43);
//! ```

use std::fmt;

use bytes::Bytes;
use permakey_primitives::{Jwk, RsaKeyPair, StorageAddress, verify_pss_with_modulus};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::chunk::{DataChunk, MAX_INLINE_DATA_SIZE};
use crate::deep_hash::{DEEP_HASH_LENGTH, DeepHashItem, deep_hash};
use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::{Result, TxError};
use crate::merkle::{chunk_data, data_root, proofs_of};
use crate::tags::{CONTENT_TYPE_TAG, Tag, WireTag};
use crate::winston::Winston;

/// Transaction format produced by this crate.
pub const FORMAT: u8 = 2;

/// Identifier of a signed transaction: SHA-256 of its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Identifier for a raw signature.
    pub fn from_signature(signature: &[u8]) -> Self {
        Self(Sha256::digest(signature).into())
    }

    /// Raw identifier bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&b64url_encode(&self.0))
    }
}

/// A format-2 transaction.
#[derive(Clone, PartialEq, Eq)]
pub struct Transaction {
    last_tx: Vec<u8>,
    owner: Vec<u8>,
    tags: Vec<Tag>,
    target: Vec<u8>,
    quantity: Winston,
    data: Bytes,
    data_size: u64,
    data_root: Vec<u8>,
    reward: Winston,
    signature: Vec<u8>,
}

impl Transaction {
    /// Creates an unsigned data transaction and commits to `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            last_tx: Vec::new(),
            owner: Vec::new(),
            tags: Vec::new(),
            target: Vec::new(),
            quantity: Winston::ZERO,
            data_size: data.len() as u64,
            data_root: data_root(&data),
            data,
            reward: Winston::ZERO,
            signature: Vec::new(),
        }
    }

    /// Appends a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Sets the anchor (`last_tx`).
    #[must_use]
    pub fn with_anchor(mut self, anchor: Vec<u8>) -> Self {
        self.last_tx = anchor;
        self
    }

    /// Sets the fee paid to the network.
    #[must_use]
    pub const fn with_reward(mut self, reward: Winston) -> Self {
        self.reward = reward;
        self
    }

    /// Payload bytes.
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload length.
    pub const fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Returns true when the payload travels inside the transaction body.
    pub fn carries_data_inline(&self) -> bool {
        self.data.len() <= MAX_INLINE_DATA_SIZE
    }

    /// This transaction without its payload bytes, for submission ahead of
    /// its chunks. Size, root and signature are kept.
    #[must_use]
    pub fn header(&self) -> Self {
        Self {
            data: Bytes::new(),
            ..self.clone()
        }
    }

    /// The payload as uploadable chunks with their proofs, in order.
    pub fn data_chunks(&self) -> Vec<DataChunk> {
        let chunks = chunk_data(&self.data);
        let proofs = proofs_of(&chunks);
        chunks
            .iter()
            .zip(proofs)
            .filter(|(chunk, _)| !chunk.is_empty())
            .map(|(chunk, proof)| DataChunk {
                data_root: self.data_root.clone(),
                data_size: self.data_size,
                data_path: proof.data_path,
                offset: proof.offset as u64,
                chunk: self.data.slice(chunk.min_byte_range..chunk.max_byte_range),
            })
            .collect()
    }

    /// Merkle root of the payload, empty for an empty payload.
    pub fn data_root(&self) -> &[u8] {
        &self.data_root
    }

    /// Tags in order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// The `Content-Type` tag value, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.name == CONTENT_TYPE_TAG.as_bytes())
            .and_then(Tag::value_str)
    }

    /// Fee paid to the network.
    pub const fn reward(&self) -> Winston {
        self.reward
    }

    /// Anchor bytes.
    pub fn anchor(&self) -> &[u8] {
        &self.last_tx
    }

    /// Owner modulus bytes, empty until signed.
    pub fn owner(&self) -> &[u8] {
        &self.owner
    }

    /// Signature bytes, empty until signed.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Returns true once a signature is attached.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Identifier of the signed transaction.
    pub fn id(&self) -> Result<TxId> {
        if self.is_signed() {
            Ok(TxId::from_signature(&self.signature))
        } else {
            Err(TxError::Unsigned)
        }
    }

    /// Address of the owner.
    pub fn owner_address(&self) -> StorageAddress {
        StorageAddress::from_modulus(&self.owner)
    }

    /// The deep hash covered by the signature.
    pub fn signature_data(&self) -> [u8; DEEP_HASH_LENGTH] {
        let tags = self
            .tags
            .iter()
            .map(|tag| {
                DeepHashItem::List(vec![
                    DeepHashItem::blob(&tag.name),
                    DeepHashItem::blob(&tag.value),
                ])
            })
            .collect();

        deep_hash(&DeepHashItem::List(vec![
            DeepHashItem::blob(FORMAT.to_string()),
            DeepHashItem::blob(&self.owner),
            DeepHashItem::blob(&self.target),
            DeepHashItem::blob(self.quantity.to_string()),
            DeepHashItem::blob(self.reward.to_string()),
            DeepHashItem::blob(&self.last_tx),
            DeepHashItem::List(tags),
            DeepHashItem::blob(self.data_size.to_string()),
            DeepHashItem::blob(&self.data_root),
        ]))
    }

    /// Sets the owner to `key` and signs.
    pub fn sign(&mut self, key: &RsaKeyPair) -> Result<TxId> {
        self.owner = key.modulus_bytes();
        self.signature = key.sign_pss(&self.signature_data())?;
        self.id()
    }

    /// Decodes `jwk` and signs with it.
    pub fn sign_with_jwk(&mut self, jwk: &Jwk) -> Result<TxId> {
        let key = jwk.to_keypair()?;
        self.sign(&key)
    }

    /// Checks the signature against the owner.
    pub fn verify(&self) -> Result<()> {
        if !self.is_signed() {
            return Err(TxError::Unsigned);
        }
        if verify_pss_with_modulus(&self.owner, &self.signature_data(), &self.signature) {
            Ok(())
        } else {
            Err(TxError::BadSignature)
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id().ok().map(|id| id.to_string()))
            .field("data_size", &self.data_size)
            .field("reward", &self.reward)
            .field("tags", &self.tags.len())
            .finish_non_exhaustive()
    }
}

/// Gateway JSON form of a transaction.
#[derive(Debug, Serialize, Deserialize)]
struct WireTransaction {
    format: u8,
    #[serde(default)]
    id: String,
    last_tx: String,
    owner: String,
    tags: Vec<WireTag>,
    target: String,
    quantity: String,
    data: String,
    data_size: String,
    #[serde(default)]
    data_tree: Vec<String>,
    data_root: String,
    reward: String,
    signature: String,
}

impl From<&Transaction> for WireTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            format: FORMAT,
            id: tx.id().map(|id| id.to_string()).unwrap_or_default(),
            last_tx: b64url_encode(&tx.last_tx),
            owner: b64url_encode(&tx.owner),
            tags: tx.tags.iter().map(WireTag::from).collect(),
            target: b64url_encode(&tx.target),
            quantity: tx.quantity.to_string(),
            data: b64url_encode(&tx.data),
            data_size: tx.data_size.to_string(),
            data_tree: Vec::new(),
            data_root: b64url_encode(&tx.data_root),
            reward: tx.reward.to_string(),
            signature: b64url_encode(&tx.signature),
        }
    }
}

impl TryFrom<WireTransaction> for Transaction {
    type Error = TxError;

    fn try_from(wire: WireTransaction) -> Result<Self> {
        if wire.format != FORMAT {
            return Err(TxError::invalid_field("format", format!("{} is not 2", wire.format)));
        }
        let data_size = wire
            .data_size
            .parse::<u64>()
            .map_err(|e| TxError::invalid_field("data_size", e.to_string()))?;
        let tx = Self {
            last_tx: b64url_decode("last_tx", &wire.last_tx)?,
            owner: b64url_decode("owner", &wire.owner)?,
            tags: wire
                .tags
                .into_iter()
                .map(Tag::try_from)
                .collect::<Result<_>>()?,
            target: b64url_decode("target", &wire.target)?,
            quantity: wire.quantity.parse()?,
            data: b64url_decode("data", &wire.data)?.into(),
            data_size,
            data_root: b64url_decode("data_root", &wire.data_root)?,
            reward: wire.reward.parse()?,
            signature: b64url_decode("signature", &wire.signature)?,
        };
        if !wire.id.is_empty() && tx.id().map(|id| id.to_string()).ok() != Some(wire.id) {
            return Err(TxError::IdMismatch);
        }
        Ok(tx)
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireTransaction::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = WireTransaction::deserialize(deserializer)?;
        Self::try_from(wire).map_err(serde::de::Error::custom)
    }
}
