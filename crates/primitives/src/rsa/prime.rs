//! Probable-prime search driven by a [`ByteSource`]
//!
//! The procedure is fixed so that the same byte stream yields the same primes
//! on every platform:
//!
//! 1. Draw `ceil(bits / 8)` bytes and read them as a big-endian integer.
//! 2. Clear everything above `bits`, then set bits `bits - 1` and `bits - 2`
//!    and the low bit.
//! 3. Walk upward over odd numbers from that start. A candidate is skipped when
//!    a small prime below [`TRIAL_DIVISION_LIMIT`] divides it or when
//!    `gcd(e, candidate - 1) != 1`; otherwise it is accepted iff it passes
//!    [`miller_rabin_rounds`] Miller–Rabin rounds whose witnesses are drawn
//!    from the same stream.
//! 4. If the walk grows past `bits` or covers [`search_window`] odd numbers
//!    without success, a fresh start is drawn.

use std::sync::LazyLock;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive};

use crate::drbg::ByteSource;
use crate::error::{KeyError, Result};

use super::keygen::CancelFlag;

/// Odd primes below this bound are used for trial division.
pub(crate) const TRIAL_DIVISION_LIMIT: u32 = 2000;

/// Fresh starting points drawn per prime before giving up.
pub const MAX_PRIME_DRAWS: usize = 64;

static SMALL_PRIMES: LazyLock<Vec<u32>> = LazyLock::new(|| odd_primes_below(TRIAL_DIVISION_LIMIT));

fn odd_primes_below(limit: u32) -> Vec<u32> {
    let limit = limit as usize;
    let mut composite = vec![false; limit];
    let mut primes = Vec::new();
    for i in 2..limit {
        if composite[i] {
            continue;
        }
        if i != 2 {
            primes.push(i as u32);
        }
        let mut j = i * i;
        while j < limit {
            composite[j] = true;
            j += i;
        }
    }
    primes
}

/// Number of Miller–Rabin rounds for a candidate of `bits` bits.
///
/// Handbook of Applied Cryptography, table 4.4: error probability below
/// 2^-80 for random candidates of the given size.
pub const fn miller_rabin_rounds(bits: usize) -> usize {
    match bits {
        0..=100 => 27,
        101..=150 => 18,
        151..=200 => 15,
        201..=250 => 12,
        251..=300 => 9,
        301..=350 => 8,
        351..=400 => 7,
        401..=500 => 6,
        501..=600 => 5,
        601..=800 => 4,
        801..=1250 => 3,
        _ => 2,
    }
}

/// Odd numbers examined from one starting point before a fresh draw.
pub const fn search_window(bits: usize) -> usize {
    8 * bits
}

/// Draws a starting candidate of exactly `bits` bits with the two top bits
/// and the low bit set.
pub(crate) fn random_candidate<S: ByteSource + ?Sized>(bits: usize, source: &mut S) -> BigUint {
    let len = bits.div_ceil(8);
    let mut bytes = source.next(len);
    let excess = len * 8 - bits;
    bytes[0] &= 0xffu8 >> excess;

    let mut candidate = BigUint::from_bytes_be(&bytes);
    candidate.set_bit(bits as u64 - 1, true);
    candidate.set_bit(bits as u64 - 2, true);
    candidate.set_bit(0, true);
    candidate
}

/// Searches the stream for a prime `p` of exactly `bits` bits with
/// `gcd(e, p - 1) == 1`.
///
/// `draws` is incremented for every fresh starting point so the caller can
/// report how much of the search budget was used.
pub(crate) fn search_prime<S: ByteSource + ?Sized>(
    bits: usize,
    e: &BigUint,
    source: &mut S,
    cancel: &CancelFlag,
    draws: &mut usize,
) -> Result<BigUint> {
    let rounds = miller_rabin_rounds(bits);

    for _ in 0..MAX_PRIME_DRAWS {
        *draws += 1;
        let start = random_candidate(bits, source);
        let residues: Vec<u64> = SMALL_PRIMES
            .iter()
            .map(|&p| (&start % p).to_u64().unwrap_or_default())
            .collect();

        for step in 0..search_window(bits) as u64 {
            cancel.check()?;

            let delta = 2 * step;
            let divisible = SMALL_PRIMES
                .iter()
                .zip(&residues)
                .any(|(&p, &r)| (r + delta) % u64::from(p) == 0);
            if divisible {
                continue;
            }

            let candidate = &start + delta;
            if candidate.bits() > bits as u64 {
                break;
            }

            let minus_one = &candidate - 1u32;
            if !e.gcd(&minus_one).is_one() {
                continue;
            }

            if is_probable_prime(&candidate, rounds, source) {
                return Ok(candidate);
            }
        }
    }

    Err(KeyError::KeyGenerationExhausted { attempts: *draws })
}

/// Miller–Rabin test with `rounds` witnesses drawn from `source`.
///
/// Each witness is `2 + (r mod (n - 3))` where `r` is read from as many bytes
/// as `n` occupies. `n` must be odd and greater than 3.
pub(crate) fn is_probable_prime<S: ByteSource + ?Sized>(
    n: &BigUint,
    rounds: usize,
    source: &mut S,
) -> bool {
    let one = BigUint::one();
    let n_minus_one = n - &one;
    let Some(s) = n_minus_one.trailing_zeros() else {
        return false;
    };
    let d = &n_minus_one >> s;
    let range = n - 3u32;
    let len = n.bits().div_ceil(8) as usize;

    'witness: for _ in 0..rounds {
        let r = BigUint::from_bytes_be(&source.next(len));
        let a = (r % &range) + 2u32;

        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
