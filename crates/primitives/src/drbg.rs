//! Deterministic byte stream
//!
//! [`HmacDrbg`] expands a 32-byte [`Seed`] into an unbounded, reproducible
//! byte stream. Block `c` of the stream is
//!
//! ```text
//! HMAC-SHA256(key = seed, message = seed || (c mod 256))
//! ```
//!
//! with the counter fed as a single byte, so the block sequence repeats every
//! 256 blocks (8 KiB). Blocks are concatenated in counter order. Successive
//! calls continue the same stream, so `next(a)` followed by `next(b)` yields
//! exactly the bytes of a single `next(a + b)`.
//!
//! This is a deterministic expansion function, not a certified DRBG: there is
//! no reseeding and no forward secrecy for the stream itself. Its only job is
//! reproducibility; the secrecy of the seed is what protects anything derived
//! from the stream.
//!
//! ## Example Usage
//!
//! ```
//! use permakey_primitives::{ByteSource, HmacDrbg, Seed};
//!
//! let mut whole = HmacDrbg::new(&Seed::new([7u8; 32]));
//! let mut split = HmacDrbg::new(&Seed::new([7u8; 32]));
//!
//! let all = whole.next(20);
//! let mut parts = split.next(10);
//! parts.extend(split.next(10));
//! assert_eq!(all, parts);
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::secret::{SEED_LENGTH, Seed};

type HmacSha256 = Hmac<Sha256>;

/// Size of one stream block in bytes.
pub const BLOCK_SIZE: usize = 32;

/// A source of bytes for key generation.
///
/// Key generation draws every byte it needs through this trait, so a
/// deterministic implementation makes the whole generation reproducible.
pub trait ByteSource {
    /// Fills `dest` with the next bytes of the stream.
    fn fill(&mut self, dest: &mut [u8]);

    /// Returns the next `len` bytes of the stream.
    fn next(&mut self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.fill(&mut out);
        out
    }
}

/// Counter-mode HMAC-SHA256 expansion of a seed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HmacDrbg {
    seed: [u8; SEED_LENGTH],
    counter: u64,
    /// Current block and how many of its bytes were already handed out.
    block: [u8; BLOCK_SIZE],
    consumed: usize,
}

impl HmacDrbg {
    /// Creates a generator positioned at the start of the stream for `seed`.
    pub fn new(seed: &Seed) -> Self {
        Self {
            seed: *seed.as_bytes(),
            counter: 0,
            block: [0u8; BLOCK_SIZE],
            consumed: BLOCK_SIZE,
        }
    }

    /// Number of whole blocks produced so far.
    pub const fn blocks_produced(&self) -> u64 {
        self.counter
    }

    fn refill(&mut self) {
        // HMAC accepts keys of any length, so construction cannot fail.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.seed)
            .unwrap_or_else(|_| unreachable!("hmac key length is unrestricted"));
        mac.update(&self.seed);
        // Single counter byte, wrapping.
        mac.update(&[self.counter as u8]);
        self.block.copy_from_slice(&mac.finalize().into_bytes());
        self.counter += 1;
        self.consumed = 0;
    }
}

impl ByteSource for HmacDrbg {
    fn fill(&mut self, dest: &mut [u8]) {
        let mut written = 0;
        while written < dest.len() {
            if self.consumed == BLOCK_SIZE {
                self.refill();
            }
            let take = (BLOCK_SIZE - self.consumed).min(dest.len() - written);
            dest[written..written + take]
                .copy_from_slice(&self.block[self.consumed..self.consumed + take]);
            self.consumed += take;
            written += take;
        }
    }
}

impl std::fmt::Debug for HmacDrbg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacDrbg")
            .field("counter", &self.counter)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seed(byte: u8) -> Seed {
        Seed::new([byte; SEED_LENGTH])
    }

    fn reference_block(seed: &Seed, counter: u8) -> Vec<u8> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(seed.as_bytes()).unwrap();
        mac.update(seed.as_bytes());
        mac.update(&[counter]);
        mac.finalize().into_bytes().to_vec()
    }

    #[test]
    fn test_first_blocks_match_construction() {
        let s = seed(3);
        let mut drbg = HmacDrbg::new(&s);
        let out = drbg.next(70);

        let mut expected = reference_block(&s, 0);
        expected.extend(reference_block(&s, 1));
        expected.extend(reference_block(&s, 2));
        expected.truncate(70);

        assert_eq!(out, expected);
        assert_eq!(drbg.blocks_produced(), 3);
    }

    #[test]
    fn test_zero_length_draw_does_not_advance() {
        let mut a = HmacDrbg::new(&seed(1));
        let mut b = HmacDrbg::new(&seed(1));
        assert!(a.next(0).is_empty());
        assert_eq!(a.blocks_produced(), 0);
        assert_eq!(a.next(5), b.next(5));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = HmacDrbg::new(&seed(1));
        let mut b = HmacDrbg::new(&seed(2));
        assert_ne!(a.next(32), b.next(32));
    }

    #[test]
    fn test_counter_wraps_at_one_byte() {
        let s = seed(9);
        let mut drbg = HmacDrbg::new(&s);
        let first = drbg.next(BLOCK_SIZE);
        let _ = drbg.next(BLOCK_SIZE * 254);
        let block_255 = drbg.next(BLOCK_SIZE);
        let block_256 = drbg.next(BLOCK_SIZE);
        let block_257 = drbg.next(BLOCK_SIZE);

        assert_eq!(block_255, reference_block(&s, 255));
        assert_eq!(block_256, first);
        assert_eq!(block_257, reference_block(&s, 1));
        assert_eq!(drbg.blocks_produced(), 258);
    }

    proptest! {
        #[test]
        fn prop_stream_continuity(seed_byte in any::<u8>(), a in 0usize..200, b in 0usize..200) {
            let s = seed(seed_byte);
            let mut whole = HmacDrbg::new(&s);
            let mut split = HmacDrbg::new(&s);

            let all = whole.next(a + b);
            let mut parts = split.next(a);
            parts.extend(split.next(b));

            prop_assert_eq!(all, parts);
        }

        #[test]
        fn prop_many_small_draws_equal_one_large(seed_byte in any::<u8>(), sizes in proptest::collection::vec(0usize..50, 1..20)) {
            let s = seed(seed_byte);
            let total: usize = sizes.iter().sum();
            let mut whole = HmacDrbg::new(&s);
            let mut split = HmacDrbg::new(&s);

            let all = whole.next(total);
            let mut parts = Vec::with_capacity(total);
            for size in sizes {
                parts.extend(split.next(size));
            }

            prop_assert_eq!(all, parts);
        }
    }
}
