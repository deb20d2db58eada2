//! Error types for the permakey-tx crate

use permakey_primitives::KeyError;
use thiserror::Error;

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TxError>;

/// Errors raised while building, signing or decoding a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// The signing key was rejected or could not sign.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The operation needs a signed transaction.
    #[error("transaction is not signed")]
    Unsigned,

    /// A wire field could not be decoded.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name of the wire field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A decimal amount could not be parsed.
    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    /// The signature does not verify against the owner.
    #[error("signature does not match owner")]
    BadSignature,

    /// The identifier is not the hash of the signature.
    #[error("identifier does not match signature")]
    IdMismatch,

    /// A chunk's proof does not lead from the data root to its bytes.
    #[error("chunk at offset {0} does not match its proof")]
    InvalidChunkProof(u64),
}

impl TxError {
    pub(crate) fn invalid_field<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
