//! RSA keypair components and the raw RSA operations

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_integer::{ExtendedGcd, Integer};
use num_traits::{One, Zero};

use crate::error::{KeyError, Result};

use super::keygen::PUBLIC_EXPONENT;

/// The integer components of an RSA private key.
///
/// Invariants for keys produced by this crate or accepted by
/// [`RsaKeyPair::validate`]: `n = p * q`, `p != q`, `e = 65537`,
/// `d * e = 1 mod lcm(p - 1, q - 1)`, `dp = d mod (p - 1)`,
/// `dq = d mod (q - 1)` and `qinv * q = 1 mod p`.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaKeyPair {
    n: BigUint,
    e: BigUint,
    d: BigUint,
    p: BigUint,
    q: BigUint,
    dp: BigUint,
    dq: BigUint,
    qinv: BigUint,
}

impl RsaKeyPair {
    /// Assembles a keypair from its components without checking them.
    #[allow(clippy::too_many_arguments)]
    pub const fn from_components(
        n: BigUint,
        e: BigUint,
        d: BigUint,
        p: BigUint,
        q: BigUint,
        dp: BigUint,
        dq: BigUint,
        qinv: BigUint,
    ) -> Self {
        Self {
            n,
            e,
            d,
            p,
            q,
            dp,
            dq,
            qinv,
        }
    }

    /// Modulus.
    pub const fn n(&self) -> &BigUint {
        &self.n
    }

    /// Public exponent.
    pub const fn e(&self) -> &BigUint {
        &self.e
    }

    /// Private exponent.
    pub const fn d(&self) -> &BigUint {
        &self.d
    }

    /// First prime factor.
    pub const fn p(&self) -> &BigUint {
        &self.p
    }

    /// Second prime factor.
    pub const fn q(&self) -> &BigUint {
        &self.q
    }

    /// `d mod (p - 1)`.
    pub const fn dp(&self) -> &BigUint {
        &self.dp
    }

    /// `d mod (q - 1)`.
    pub const fn dq(&self) -> &BigUint {
        &self.dq
    }

    /// `q^-1 mod p`.
    pub const fn qinv(&self) -> &BigUint {
        &self.qinv
    }

    /// Bit length of the modulus.
    pub fn bits(&self) -> usize {
        self.n.bits() as usize
    }

    /// Length of the modulus in bytes.
    pub fn size(&self) -> usize {
        self.bits().div_ceil(8)
    }

    /// Minimal big-endian bytes of the modulus.
    pub fn modulus_bytes(&self) -> Vec<u8> {
        self.n.to_bytes_be()
    }

    /// Checks the algebraic relations between the components.
    ///
    /// Primality of `p` and `q` is not re-tested here; that is the generator's
    /// responsibility and too slow for every decode.
    pub fn validate(&self) -> Result<()> {
        if self.n.is_zero() {
            return Err(KeyError::malformed("n", "is zero"));
        }
        if self.e != BigUint::from(PUBLIC_EXPONENT) {
            return Err(KeyError::malformed("e", "is not 65537"));
        }
        for (field, value) in [
            ("d", &self.d),
            ("p", &self.p),
            ("q", &self.q),
            ("dp", &self.dp),
            ("dq", &self.dq),
            ("qi", &self.qinv),
        ] {
            if value.is_zero() {
                return Err(KeyError::malformed(field, "is zero"));
            }
            if value >= &self.n {
                return Err(KeyError::malformed(field, "is not below the modulus"));
            }
        }
        if self.p == self.q {
            return Err(KeyError::malformed("q", "equals p"));
        }
        if &self.p * &self.q != self.n {
            return Err(KeyError::malformed("n", "is not p * q"));
        }

        let one = BigUint::one();
        let p1 = &self.p - 1u32;
        let q1 = &self.q - 1u32;
        if (&self.d * &self.e) % p1.lcm(&q1) != one {
            return Err(KeyError::malformed("d", "is not the inverse of e"));
        }
        if self.dp != &self.d % &p1 {
            return Err(KeyError::malformed("dp", "is not d mod (p - 1)"));
        }
        if self.dq != &self.d % &q1 {
            return Err(KeyError::malformed("dq", "is not d mod (q - 1)"));
        }
        if (&self.qinv * &self.q) % &self.p != one {
            return Err(KeyError::malformed("qi", "is not q^-1 mod p"));
        }
        Ok(())
    }

    /// RSASP1 with the CRT components: `m^d mod n`.
    pub(crate) fn private_op(&self, m: &BigUint) -> Result<BigUint> {
        if m >= &self.n {
            return Err(KeyError::Signature("message representative out of range"));
        }
        let s1 = m.modpow(&self.dp, &self.p);
        let s2 = m.modpow(&self.dq, &self.q);
        let diff = (&s1 + &self.p - (&s2 % &self.p)) % &self.p;
        let h = (&self.qinv * diff) % &self.p;
        let s = s2 + &self.q * h;

        // A faulty CRT result would leak the factorization.
        if public_op(&self.n, &self.e, &s) != *m {
            return Err(KeyError::Signature("signature self-check failed"));
        }
        Ok(s)
    }
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("bits", &self.bits())
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

/// RSAVP1: `s^e mod n`.
pub(crate) fn public_op(n: &BigUint, e: &BigUint, s: &BigUint) -> BigUint {
    s.modpow(e, n)
}

/// Modular inverse of `a` modulo `m`, if it exists.
pub(crate) fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let a = BigInt::from(a.clone());
    let m = BigInt::from(m.clone());
    let ExtendedGcd { gcd, x, .. } = a.extended_gcd(&m);
    if !gcd.is_one() {
        return None;
    }
    x.mod_floor(&m).to_biguint()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Textbook example: p = 61, q = 53 is too small for the generator but
    /// exercises the arithmetic.
    fn toy_key() -> RsaKeyPair {
        let p = BigUint::from(61u32);
        let q = BigUint::from(53u32);
        let n = &p * &q;
        let e = BigUint::from(PUBLIC_EXPONENT);
        let lambda = (&p - 1u32).lcm(&(&q - 1u32));
        let d = mod_inverse(&e, &lambda).unwrap();
        let dp = &d % (&p - 1u32);
        let dq = &d % (&q - 1u32);
        let qinv = mod_inverse(&q, &p).unwrap();
        RsaKeyPair::from_components(n, e, d, p, q, dp, dq, qinv)
    }

    #[test]
    fn test_mod_inverse() {
        let inv = mod_inverse(&BigUint::from(3u32), &BigUint::from(11u32)).unwrap();
        assert_eq!(inv, BigUint::from(4u32));
        assert!(mod_inverse(&BigUint::from(6u32), &BigUint::from(9u32)).is_none());
    }

    #[test]
    fn test_private_op_inverts_public_op() {
        let key = toy_key();
        key.validate().unwrap();
        let m = BigUint::from(65u32);
        let s = key.private_op(&m).unwrap();
        assert_eq!(public_op(key.n(), key.e(), &s), m);
    }

    #[test]
    fn test_private_op_rejects_out_of_range() {
        let key = toy_key();
        assert!(key.private_op(key.n()).is_err());
    }

    #[test]
    fn test_validate_catches_broken_relations() {
        let key = toy_key();

        let mut broken = key.clone();
        broken.dp += 1u32;
        assert!(matches!(
            broken.validate(),
            Err(KeyError::MalformedKey { field: "dp", .. })
        ));

        let mut broken = key.clone();
        broken.e = BigUint::from(3u32);
        assert!(matches!(
            broken.validate(),
            Err(KeyError::MalformedKey { field: "e", .. })
        ));

        let mut broken = key;
        broken.n += 2u32;
        assert!(matches!(
            broken.validate(),
            Err(KeyError::MalformedKey { field: "n", .. })
        ));
    }

    #[test]
    fn test_debug_hides_private_components() {
        let rendered = format!("{:?}", toy_key());
        assert!(rendered.contains("bits"));
        assert!(!rendered.contains("dp"));
    }
}
