//! Error types for the permakey-primitives crate
//!
//! Every fallible operation in this crate returns [`KeyError`]. The variants
//! split into two groups that callers usually treat differently:
//!
//! - derivation failures ([`KeyError::InvalidSecretLength`],
//!   [`KeyError::KeyGenerationExhausted`], [`KeyError::Cancelled`]) raised while
//!   turning a secret into a keypair
//! - decoding failures ([`KeyError::MalformedKey`]) raised while reading a
//!   caller-supplied JWK
//!
//! ## Example Usage
//!
//! ```
//! use permakey_primitives::error::{KeyError, Result};
//! use permakey_primitives::derive_seed;
//!
//! fn handle() -> Result<()> {
//!     match derive_seed(&[0u8; 31], "label") {
//!         Err(KeyError::InvalidSecretLength { expected, actual }) => {
//!             assert_eq!((expected, actual), (32, 31));
//!             Ok(())
//!         }
//!         other => other.map(|_| ()),
//!     }
//! }
//! # handle().unwrap();
//! ```

use thiserror::Error;

/// Result type for operations in the primitives crate
pub type Result<T> = std::result::Result<T, KeyError>;

/// Main error type for the primitives crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The source secret does not have the required width.
    #[error("invalid secret length: expected {expected} bytes, got {actual}")]
    InvalidSecretLength {
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// The source secret is not valid hex.
    #[error("invalid secret encoding: {0}")]
    InvalidSecretEncoding(String),

    /// The requested key size cannot be generated.
    #[error("unsupported key size: {0} bits")]
    UnsupportedKeySize(usize),

    /// The prime search ran out of draws without producing a valid pair.
    #[error("key generation exhausted after {attempts} candidate draws")]
    KeyGenerationExhausted {
        /// Number of fresh candidate draws consumed.
        attempts: usize,
    },

    /// The prime search was interrupted by its caller.
    #[error("key generation cancelled")]
    Cancelled,

    /// A JWK field failed to decode or violates a key relation.
    #[error("malformed key: field `{field}` {reason}")]
    MalformedKey {
        /// The offending JWK member.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A signing or verification input did not fit the key.
    #[error("signature error: {0}")]
    Signature(&'static str),
}

impl KeyError {
    pub(crate) fn malformed<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Self::MalformedKey {
            field,
            reason: reason.into(),
        }
    }

    /// Returns true when the error was caused by caller-supplied key material
    /// rather than by the derivation process.
    pub const fn is_decoding(&self) -> bool {
        matches!(self, Self::MalformedKey { .. })
    }
}
