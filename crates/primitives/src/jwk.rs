//! JSON Web Key encoding of RSA keypairs
//!
//! Each integer component is written as its minimal unsigned big-endian byte
//! string, base64url encoded without padding. The public exponent is always
//! the three bytes `01 00 01` (`"AQAB"`).
//!
//! ## Example Usage
//!
//! ```
//! use permakey_primitives::{Jwk, Seed, generate_keypair};
//!
//! let key = generate_keypair(&Seed::new([1u8; 32]), 512).unwrap();
//! let jwk = Jwk::from(&key);
//! assert_eq!(jwk.e, "AQAB");
//! assert_eq!(jwk.to_keypair().unwrap(), key);
//! ```

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{KeyError, Result};
use crate::rsa::RsaKeyPair;

/// The only key type this crate produces or accepts.
pub const KEY_TYPE: &str = "RSA";

/// Encoded public exponent 65537.
pub const ENCODED_PUBLIC_EXPONENT: &str = "AQAB";

/// An RSA private key in JWK form.
///
/// Missing members deserialize as empty strings so that structural problems
/// surface from [`Jwk::to_keypair`] as [`KeyError::MalformedKey`] rather than
/// as a serde error.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `"RSA"`.
    #[serde(default)]
    pub kty: String,
    /// Modulus.
    #[serde(default)]
    pub n: String,
    /// Public exponent.
    #[serde(default)]
    pub e: String,
    /// Private exponent.
    #[serde(default)]
    pub d: String,
    /// First prime factor.
    #[serde(default)]
    pub p: String,
    /// Second prime factor.
    #[serde(default)]
    pub q: String,
    /// First CRT exponent.
    #[serde(default)]
    pub dp: String,
    /// Second CRT exponent.
    #[serde(default)]
    pub dq: String,
    /// CRT coefficient.
    #[serde(default)]
    pub qi: String,
}

/// Base64url (no padding) of the minimal big-endian bytes of `value`.
pub fn encode_uint(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn decode_field(field: &'static str, value: &str) -> Result<BigUint> {
    if value.is_empty() {
        return Err(KeyError::malformed(field, "is missing"));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| KeyError::malformed(field, format!("is not base64url: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

impl Jwk {
    /// Encodes a keypair (`to_jwk`).
    pub fn from_keypair(key: &RsaKeyPair) -> Self {
        Self {
            kty: KEY_TYPE.to_string(),
            n: encode_uint(key.n()),
            e: ENCODED_PUBLIC_EXPONENT.to_string(),
            d: encode_uint(key.d()),
            p: encode_uint(key.p()),
            q: encode_uint(key.q()),
            dp: encode_uint(key.dp()),
            dq: encode_uint(key.dq()),
            qi: encode_uint(key.qinv()),
        }
    }

    /// Decodes and validates the keypair (`from_jwk`).
    pub fn to_keypair(&self) -> Result<RsaKeyPair> {
        if self.kty != KEY_TYPE {
            return Err(KeyError::malformed("kty", format!("is {:?}, expected \"RSA\"", self.kty)));
        }
        let key = RsaKeyPair::from_components(
            decode_field("n", &self.n)?,
            decode_field("e", &self.e)?,
            decode_field("d", &self.d)?,
            decode_field("p", &self.p)?,
            decode_field("q", &self.q)?,
            decode_field("dp", &self.dp)?,
            decode_field("dq", &self.dq)?,
            decode_field("qi", &self.qi)?,
        );
        key.validate()?;
        Ok(key)
    }

    /// Raw modulus bytes as carried in the `n` member.
    pub fn owner_bytes(&self) -> Result<Vec<u8>> {
        if self.n.is_empty() {
            return Err(KeyError::malformed("n", "is missing"));
        }
        URL_SAFE_NO_PAD
            .decode(&self.n)
            .map_err(|e| KeyError::malformed("n", format!("is not base64url: {e}")))
    }
}

impl From<&RsaKeyPair> for Jwk {
    fn from(key: &RsaKeyPair) -> Self {
        Self::from_keypair(key)
    }
}

impl TryFrom<&Jwk> for RsaKeyPair {
    type Error = KeyError;

    fn try_from(jwk: &Jwk) -> Result<Self> {
        jwk.to_keypair()
    }
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("n", &self.n)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::generate_keypair;
    use crate::secret::Seed;
    use proptest::prelude::*;
    use std::sync::LazyLock;

    static KEY: LazyLock<RsaKeyPair> =
        LazyLock::new(|| generate_keypair(&Seed::new([21u8; 32]), 512).unwrap());

    #[test]
    fn test_encode_minimal_bytes() {
        assert_eq!(encode_uint(&BigUint::from(65537u32)), "AQAB");
        assert_eq!(encode_uint(&BigUint::from(0u32)), "AA");
        assert_eq!(encode_uint(&BigUint::from(255u32)), "_w");
    }

    #[test]
    fn test_round_trip() {
        let jwk = Jwk::from(&*KEY);
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.e, ENCODED_PUBLIC_EXPONENT);
        assert_eq!(RsaKeyPair::try_from(&jwk).unwrap(), *KEY);
    }

    #[test]
    fn test_json_member_names() {
        let json = serde_json::to_value(Jwk::from(&*KEY)).unwrap();
        for member in ["kty", "n", "e", "d", "p", "q", "dp", "dq", "qi"] {
            assert!(json.get(member).is_some(), "missing {member}");
        }
        let back: Jwk = serde_json::from_value(json).unwrap();
        assert_eq!(back.to_keypair().unwrap(), *KEY);
    }

    #[test]
    fn test_rejects_non_base64url() {
        let mut jwk = Jwk::from(&*KEY);
        jwk.d = "not+base64/url==".to_string();
        assert!(matches!(
            jwk.to_keypair(),
            Err(KeyError::MalformedKey { field: "d", .. })
        ));
    }

    #[test]
    fn test_rejects_missing_members() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty":"RSA","n":"AQAB"}"#).unwrap();
        assert!(matches!(
            jwk.to_keypair(),
            Err(KeyError::MalformedKey { field: "d", .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_kty_and_exponent() {
        let mut jwk = Jwk::from(&*KEY);
        jwk.kty = "EC".to_string();
        assert!(matches!(
            jwk.to_keypair(),
            Err(KeyError::MalformedKey { field: "kty", .. })
        ));

        let mut jwk = Jwk::from(&*KEY);
        jwk.e = "Aw".to_string();
        assert!(matches!(
            jwk.to_keypair(),
            Err(KeyError::MalformedKey { field: "e", .. })
        ));
    }

    #[test]
    fn test_rejects_swapped_components() {
        let mut jwk = Jwk::from(&*KEY);
        std::mem::swap(&mut jwk.dp, &mut jwk.dq);
        assert!(jwk.to_keypair().unwrap_err().is_decoding());
    }

    #[test]
    fn test_debug_hides_private_members() {
        let rendered = format!("{:?}", Jwk::from(&*KEY));
        assert!(!rendered.contains(&Jwk::from(&*KEY).d));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn prop_round_trip_generated_keys(seed in any::<[u8; 32]>()) {
            let key = generate_keypair(&Seed::new(seed), 384).unwrap();
            let jwk = Jwk::from(&key);
            prop_assert_eq!(jwk.to_keypair().unwrap(), key);
        }

        #[test]
        fn prop_encoding_is_minimal(bytes in proptest::collection::vec(any::<u8>(), 1..64)) {
            let value = BigUint::from_bytes_be(&bytes);
            let decoded = URL_SAFE_NO_PAD.decode(encode_uint(&value)).unwrap();
            prop_assert!(decoded.len() == 1 || decoded[0] != 0);
            prop_assert_eq!(BigUint::from_bytes_be(&decoded), value);
        }
    }
}
