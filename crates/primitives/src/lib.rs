//! Core primitives for deterministic storage-network identities
//!
//! This crate turns a 32-byte EVM private key into an RSA identity for a
//! permanent storage network, and provides the signature primitive that
//! identity uses. Nothing here touches process-wide randomness except the PSS
//! salt; key generation is a pure function of the secret.
//!
//! ## Key Components
//!
//! - **Seed derivation**: PBKDF2-HMAC-SHA256 over the secret ([`derive_seed`])
//! - **DRBG**: an HMAC-SHA256 counter-mode byte stream ([`HmacDrbg`])
//! - **RSA**: seeded key generation and RSASSA-PSS ([`RsaKeyGenerator`], [`RsaKeyPair`])
//! - **JWK**: the network's key file format ([`Jwk`])
//! - **StorageAddress**: SHA-256 of the modulus
//!
//! ## Usage Examples
//!
//! ```
//! use permakey_primitives::{
//!     DEFAULT_SEED_LABEL, HmacDrbg, Jwk, RsaKeyGenerator, SourceSecret, StorageAddress,
//! };
//!
//! let secret: SourceSecret =
//!     "0x0000000000000000000000000000000000000000000000000000000000000001"
//!         .parse()
//!         .unwrap();
//! let seed = secret.derive_seed(DEFAULT_SEED_LABEL);
//!
//! // Small key to keep the example quick; identities use DEFAULT_KEY_BITS.
//! let generator = RsaKeyGenerator::new(512).unwrap();
//! let key = generator.generate(&mut HmacDrbg::new(&seed)).unwrap();
//!
//! let jwk = Jwk::from(&key);
//! let address = StorageAddress::from_jwk(&jwk).unwrap();
//! println!("derived {address}");
//!
//! let signature = key.sign_pss(b"hello").unwrap();
//! assert!(key.verify_pss(b"hello", &signature));
//! ```

pub mod address;
pub mod drbg;
pub mod error;
pub mod jwk;
pub mod rsa;
pub mod secret;

// Re-export core types
pub use address::StorageAddress;
pub use drbg::{ByteSource, HmacDrbg};
pub use error::{KeyError, Result};
pub use jwk::Jwk;
pub use rsa::{
    CancelFlag, DEFAULT_KEY_BITS, PUBLIC_EXPONENT, RsaKeyGenerator, RsaKeyPair, generate_keypair,
    verify_pss, verify_pss_with_modulus,
};
pub use secret::{DEFAULT_SEED_LABEL, SEED_ROUNDS, Seed, SourceSecret, derive_seed};
