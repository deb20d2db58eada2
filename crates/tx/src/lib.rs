//! Storage-network transactions
//!
//! Builds, signs and serializes the format-2 data transactions accepted by
//! permanent-storage gateways.
//!
//! ## Key Components
//!
//! - **Transaction**: payload, tags, anchor, reward and signature ([`Transaction`])
//! - **Deep hash**: the SHA-384 structure hash that is signed ([`deep_hash`])
//! - **Data root**: chunked SHA-256 merkle commitment to the payload ([`merkle`])
//! - **Chunks**: proof-carrying pieces of payloads too large to inline ([`DataChunk`])
//! - **Content type**: magic-number sniffing for the `Content-Type` tag ([`content_type`])
//! - **Winston**: integer token amounts ([`Winston`])
//!
//! ## Usage Examples
//!
//! ```
//! use permakey_primitives::{Jwk, Seed, generate_keypair};
//! use permakey_tx::{Tag, Transaction, Winston, content_type};
//!
//! let jwk = Jwk::from(&generate_keypair(&Seed::new([2u8; 32]), 1024).unwrap());
//! let payload = b"\x89PNG\r\n\x1a\n...".to_vec();
//! let kind = content_type::detect(&payload);
//!
//! let mut tx = Transaction::new(payload)
//!     .with_tag(Tag::content_type(kind.mime))
//!     .with_reward(Winston::from(42u64));
//! let id = tx.sign_with_jwk(&jwk).unwrap();
//!
//! let body = serde_json::to_string(&tx).unwrap();
//! assert!(body.contains(&id.to_string()));
//! ```

pub mod chunk;
pub mod content_type;
pub mod deep_hash;
mod encoding;
pub mod error;
pub mod merkle;
pub mod tags;
pub mod transaction;
pub mod winston;

pub use chunk::{DataChunk, MAX_INLINE_DATA_SIZE};
pub use content_type::{ContentType, OCTET_STREAM, detect};
pub use encoding::{b64url_decode, b64url_encode};
pub use error::{Result, TxError};
pub use tags::{CONTENT_TYPE_TAG, Tag};
pub use transaction::{FORMAT, Transaction, TxId};
pub use winston::{AR_DECIMALS, Winston};
