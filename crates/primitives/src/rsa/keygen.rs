//! Deterministic RSA key generation
//!
//! [`RsaKeyGenerator`] draws every byte it needs from an injected
//! [`ByteSource`]; given the same stream it returns the same keypair on every
//! run and every platform. No process-wide randomness is touched.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use num_bigint::BigUint;
use num_integer::Integer;

use crate::drbg::{ByteSource, HmacDrbg};
use crate::error::{KeyError, Result};
use crate::secret::Seed;

use super::keypair::{RsaKeyPair, mod_inverse};
use super::prime::search_prime;

/// Key size used for storage-network identities.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Smallest key size the generator accepts.
pub const MIN_KEY_BITS: usize = 256;

/// Fixed public exponent.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// `q` candidates tried against a fixed `p` before giving up (a `q` is
/// rejected when it equals `p` or the modulus misses the requested size).
pub const MAX_PAIR_ATTEMPTS: usize = 8;

/// Cooperative cancellation for long-running generation.
///
/// Clones share the same flag; raising it from any clone stops the search at
/// the next candidate.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once the flag was raised.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(KeyError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Generates RSA keypairs from a byte stream.
#[derive(Debug, Clone)]
pub struct RsaKeyGenerator {
    bits: usize,
    cancel: CancelFlag,
}

impl RsaKeyGenerator {
    /// Creates a generator for `bits`-bit moduli.
    pub fn new(bits: usize) -> Result<Self> {
        if bits < MIN_KEY_BITS {
            return Err(KeyError::UnsupportedKeySize(bits));
        }
        Ok(Self {
            bits,
            cancel: CancelFlag::new(),
        })
    }

    /// Attaches a cancellation flag checked between prime candidates.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the modulus size in bits.
    pub const fn bits(&self) -> usize {
        self.bits
    }

    /// Generates a keypair from the stream seeded by `seed`.
    pub fn generate_from_seed(&self, seed: &Seed) -> Result<RsaKeyPair> {
        let mut drbg = HmacDrbg::new(seed);
        self.generate(&mut drbg)
    }

    /// Generates a keypair, drawing all bytes from `source`.
    ///
    /// `p` is searched first with `ceil(bits / 2)` bits, then `q` with the
    /// remaining bits. A `q` equal to `p` is discarded and only `q` is searched
    /// again, continuing on the same stream. The larger prime becomes `p`.
    pub fn generate<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<RsaKeyPair> {
        let e = BigUint::from(PUBLIC_EXPONENT);
        let p_bits = self.bits.div_ceil(2);
        let q_bits = self.bits - p_bits;
        let mut draws = 0;

        let first = search_prime(p_bits, &e, source, &self.cancel, &mut draws)?;

        for _ in 0..MAX_PAIR_ATTEMPTS {
            let second = search_prime(q_bits, &e, source, &self.cancel, &mut draws)?;
            if second == first {
                continue;
            }
            let (p, q) = if first > second {
                (first.clone(), second)
            } else {
                (second, first.clone())
            };

            let n = &p * &q;
            if n.bits() != self.bits as u64 {
                continue;
            }

            let p1 = &p - 1u32;
            let q1 = &q - 1u32;
            let lambda = p1.lcm(&q1);
            let Some(d) = mod_inverse(&e, &lambda) else {
                continue;
            };
            let Some(qinv) = mod_inverse(&q, &p) else {
                continue;
            };
            let dp = &d % &p1;
            let dq = &d % &q1;

            return Ok(RsaKeyPair::from_components(
                n,
                e,
                d,
                p,
                q,
                dp,
                dq,
                qinv,
            ));
        }

        Err(KeyError::KeyGenerationExhausted { attempts: draws })
    }
}

/// Generates the `bits`-bit keypair for `seed`.
pub fn generate_keypair(seed: &Seed, bits: usize) -> Result<RsaKeyPair> {
    RsaKeyGenerator::new(bits)?.generate_from_seed(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::prime::{is_probable_prime, search_prime};
    use num_traits::One;

    /// A source that only ever yields one byte value.
    struct Constant(u8);

    impl ByteSource for Constant {
        fn fill(&mut self, dest: &mut [u8]) {
            dest.fill(self.0);
        }
    }

    /// Counts the bytes drawn through it.
    struct Counting<'a> {
        inner: &'a mut HmacDrbg,
        drawn: usize,
    }

    impl ByteSource for Counting<'_> {
        fn fill(&mut self, dest: &mut [u8]) {
            self.inner.fill(dest);
            self.drawn += dest.len();
        }
    }

    /// Serves a fixed script first, then falls through to a live stream.
    struct Scripted {
        script: Vec<u8>,
        pos: usize,
        tail: HmacDrbg,
    }

    impl ByteSource for Scripted {
        fn fill(&mut self, dest: &mut [u8]) {
            let from_script = (self.script.len() - self.pos).min(dest.len());
            dest[..from_script].copy_from_slice(&self.script[self.pos..self.pos + from_script]);
            self.pos += from_script;
            self.tail.fill(&mut dest[from_script..]);
        }
    }

    fn seed(byte: u8) -> Seed {
        Seed::new([byte; 32])
    }

    fn assert_valid(key: &RsaKeyPair, bits: usize) {
        let one = BigUint::one();
        assert_eq!(key.n(), &(key.p() * key.q()));
        assert_ne!(key.p(), key.q());
        assert_eq!(key.e(), &BigUint::from(PUBLIC_EXPONENT));
        assert_eq!(key.bits(), bits);

        let p1 = key.p() - 1u32;
        let q1 = key.q() - 1u32;
        assert_eq!((key.d() * key.e()) % p1.lcm(&q1), one);
        assert_eq!(key.dp(), &(key.d() % &p1));
        assert_eq!(key.dq(), &(key.d() % &q1));
        assert_eq!((key.qinv() * key.q()) % key.p(), one);

        let mut check = HmacDrbg::new(&seed(0xAA));
        assert!(is_probable_prime(key.p(), 40, &mut check));
        assert!(is_probable_prime(key.q(), 40, &mut check));
    }

    #[test]
    fn test_rejects_small_sizes() {
        assert_eq!(
            RsaKeyGenerator::new(128).unwrap_err(),
            KeyError::UnsupportedKeySize(128)
        );
    }

    #[test]
    fn test_generated_key_is_valid() {
        let key = generate_keypair(&seed(1), 512).unwrap();
        assert_valid(&key, 512);
    }

    #[test]
    fn test_odd_key_size() {
        let key = generate_keypair(&seed(2), 521).unwrap();
        assert_valid(&key, 521);
    }

    #[test]
    fn test_same_seed_same_key() {
        let a = generate_keypair(&seed(3), 768).unwrap();
        let b = generate_keypair(&seed(3), 768).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_key() {
        let a = generate_keypair(&seed(3), 512).unwrap();
        let b = generate_keypair(&seed(4), 512).unwrap();
        assert_ne!(a.n(), b.n());
    }

    #[test]
    fn test_constant_stream_is_exhausted_not_looping() {
        // Every draw starts from 0xFF..FF, which immediately outgrows the
        // requested size, so the search must report exhaustion.
        let generator = RsaKeyGenerator::new(256).unwrap();
        let err = generator.generate(&mut Constant(0xFF)).unwrap_err();
        assert!(matches!(err, KeyError::KeyGenerationExhausted { .. }));
    }

    #[test]
    fn test_repeated_prime_redraws_only_q() {
        let e = BigUint::from(PUBLIC_EXPONENT);
        let cancel = CancelFlag::new();

        // Measure how many bytes one 256-bit prime search consumes.
        let mut drbg = HmacDrbg::new(&seed(7));
        let mut counting = Counting {
            inner: &mut drbg,
            drawn: 0,
        };
        let prime = search_prime(256, &e, &mut counting, &cancel, &mut 0).unwrap();
        let used = counting.drawn;

        // Replay those bytes twice so the first q search lands on p again.
        let once = HmacDrbg::new(&seed(7)).next(used);
        let mut source = Scripted {
            script: [once.as_slice(), once.as_slice()].concat(),
            pos: 0,
            tail: HmacDrbg::new(&seed(8)),
        };

        let key = RsaKeyGenerator::new(512)
            .unwrap()
            .generate(&mut source)
            .unwrap();
        assert_valid(&key, 512);
        assert!(key.p() == &prime || key.q() == &prime);
    }

    #[test]
    fn test_cancelled_generation() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let generator = RsaKeyGenerator::new(512).unwrap().with_cancel(cancel);
        assert_eq!(
            generator.generate_from_seed(&seed(5)).unwrap_err(),
            KeyError::Cancelled
        );
    }
}
