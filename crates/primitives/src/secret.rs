//! Source secrets and seed derivation
//!
//! A [`SourceSecret`] is the raw 32-byte private key of the originating chain
//! account. It is stretched into a [`Seed`] with PBKDF2-HMAC-SHA256 and the
//! seed, not the secret, initializes the byte stream used for key generation.
//!
//! ## Example Usage
//!
//! ```
//! use permakey_primitives::{DEFAULT_SEED_LABEL, SourceSecret};
//!
//! let secret: SourceSecret = "0x0000000000000000000000000000000000000000000000000000000000000001"
//!     .parse()
//!     .unwrap();
//! let a = secret.derive_seed(DEFAULT_SEED_LABEL);
//! let b = secret.derive_seed(DEFAULT_SEED_LABEL);
//! assert_eq!(a, b);
//! ```

use std::fmt;
use std::str::FromStr;

use alloy_primitives::hex;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{KeyError, Result};

/// Width of a source secret in bytes.
pub const SECRET_LENGTH: usize = 32;

/// Width of a derived seed in bytes.
pub const SEED_LENGTH: usize = 32;

/// PBKDF2 iteration count used for seed stretching.
pub const SEED_ROUNDS: u32 = 100_000;

/// Salt used when no other label is configured.
pub const DEFAULT_SEED_LABEL: &str = "ArweaveJWKDerive";

/// Raw private-key bytes of the originating chain account.
///
/// The bytes are wiped when the value is dropped and are never printed by
/// `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SourceSecret([u8; SECRET_LENGTH]);

impl SourceSecret {
    /// Creates a secret from a byte slice, checking the width.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SECRET_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| KeyError::InvalidSecretLength {
                    expected: SECRET_LENGTH,
                    actual: bytes.len(),
                })?;
        Ok(Self(bytes))
    }

    /// Parses a hex encoded secret, with or without a `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        // The decoder error text never contains the input itself.
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|e| KeyError::InvalidSecretEncoding(e.to_string()))?,
        );
        Self::from_slice(&bytes)
    }

    /// Returns the raw secret bytes.
    pub const fn as_bytes(&self) -> &[u8; SECRET_LENGTH] {
        &self.0
    }

    /// Stretches this secret into a seed under `label`.
    pub fn derive_seed(&self, label: &str) -> Seed {
        stretch(&self.0, label)
    }
}

impl FromStr for SourceSecret {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for SourceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SourceSecret(<redacted>)")
    }
}

/// Fixed-size output of the seed stretching function.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LENGTH]);

impl Seed {
    /// Wraps raw seed bytes.
    pub const fn new(bytes: [u8; SEED_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the seed bytes.
    pub const fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// Stretches `secret` into a 32-byte seed.
///
/// PBKDF2-HMAC-SHA256 with [`SEED_ROUNDS`] iterations and `label` as salt.
/// The running time does not depend on the secret's content. Fails only when
/// `secret` is not [`SECRET_LENGTH`] bytes wide.
pub fn derive_seed(secret: &[u8], label: &str) -> Result<Seed> {
    if secret.len() != SECRET_LENGTH {
        return Err(KeyError::InvalidSecretLength {
            expected: SECRET_LENGTH,
            actual: secret.len(),
        });
    }
    Ok(stretch(secret, label))
}

fn stretch(secret: &[u8], label: &str) -> Seed {
    let mut out = [0u8; SEED_LENGTH];
    pbkdf2_hmac::<Sha256>(secret, label.as_bytes(), SEED_ROUNDS, &mut out);
    let seed = Seed(out);
    out.zeroize();
    seed
}
