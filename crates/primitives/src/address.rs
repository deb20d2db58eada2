//! Storage-network address implementation
//!
//! A [`StorageAddress`] is the SHA-256 digest of an RSA modulus, rendered as
//! 43 characters of unpadded base64url. It is a pure function of the public
//! key: the same JWK always resolves to the same address.
//!
//! ## Example Usage
//!
//! ```
//! use permakey_primitives::{Jwk, Seed, StorageAddress, generate_keypair};
//!
//! let key = generate_keypair(&Seed::new([7u8; 32]), 512).unwrap();
//! let jwk = Jwk::from(&key);
//!
//! let address = StorageAddress::from_jwk(&jwk).unwrap();
//! assert_eq!(address, StorageAddress::from_keypair(&key));
//! assert_eq!(address.to_string().len(), 43);
//!
//! let parsed: StorageAddress = address.to_string().parse().unwrap();
//! assert_eq!(parsed, address);
//! ```

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use alloy_primitives::B256;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::{KeyError, Result};
use crate::jwk::Jwk;
use crate::rsa::RsaKeyPair;

/// Length of the rendered address.
pub const ENCODED_ADDRESS_LENGTH: usize = 43;

/// A 256-bit wallet address on the storage network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StorageAddress(pub B256);

impl StorageAddress {
    /// Creates an address from raw digest bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(B256::new(bytes))
    }

    /// Returns the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Hashes raw modulus bytes (the transaction `owner` field).
    pub fn from_modulus(modulus: &[u8]) -> Self {
        Self::new(Sha256::digest(modulus).into())
    }

    /// Resolves the address of a JWK from its `n` member.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        Ok(Self::from_modulus(&jwk.owner_bytes()?))
    }

    /// Resolves the address of a keypair.
    pub fn from_keypair(key: &RsaKeyPair) -> Self {
        Self::from_modulus(&key.modulus_bytes())
    }

    /// Base64url rendering without padding.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_slice())
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl FromStr for StorageAddress {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| KeyError::malformed("address", format!("is not base64url: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::malformed("address", "is not 32 bytes"))?;
        Ok(Self::new(bytes))
    }
}

impl Deref for StorageAddress {
    type Target = B256;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<B256> for StorageAddress {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<StorageAddress> for B256 {
    fn from(addr: StorageAddress) -> Self {
        addr.0
    }
}

impl AsRef<[u8]> for StorageAddress {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::generate_keypair;
    use crate::secret::Seed;
    use proptest::prelude::*;

    #[test]
    fn test_address_of_known_modulus() {
        // SHA-256 of the empty string.
        let address = StorageAddress::from_modulus(&[]);
        assert_eq!(
            address.to_string(),
            "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
        );
    }

    #[test]
    fn test_jwk_and_keypair_agree() {
        let key = generate_keypair(&Seed::new([8u8; 32]), 512).unwrap();
        let jwk = Jwk::from(&key);
        let a = StorageAddress::from_jwk(&jwk).unwrap();
        let b = StorageAddress::from_jwk(&jwk).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, StorageAddress::from_keypair(&key));
        assert_eq!(a.to_string().len(), ENCODED_ADDRESS_LENGTH);
    }

    #[test]
    fn test_missing_modulus() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty":"RSA"}"#).unwrap();
        assert!(StorageAddress::from_jwk(&jwk).unwrap_err().is_decoding());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("AQAB".parse::<StorageAddress>().is_err());
        assert!("***".parse::<StorageAddress>().is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parse(bytes in any::<[u8; 32]>()) {
            let address = StorageAddress::new(bytes);
            let rendered = address.to_string();
            prop_assert_eq!(rendered.len(), ENCODED_ADDRESS_LENGTH);
            prop_assert_eq!(rendered.parse::<StorageAddress>().unwrap(), address);
        }

        #[test]
        fn prop_from_modulus_is_pure(modulus in proptest::collection::vec(any::<u8>(), 0..600)) {
            prop_assert_eq!(
                StorageAddress::from_modulus(&modulus),
                StorageAddress::from_modulus(&modulus)
            );
        }
    }
}
