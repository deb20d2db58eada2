//! Deterministic RSA
//!
//! Only what a storage-network identity needs: seeded key generation, the
//! keypair's integer components, and RSASSA-PSS signing.

mod keygen;
mod keypair;
mod prime;
mod pss;

pub use keygen::{
    CancelFlag, DEFAULT_KEY_BITS, MAX_PAIR_ATTEMPTS, MIN_KEY_BITS, PUBLIC_EXPONENT,
    RsaKeyGenerator, generate_keypair,
};
pub use keypair::RsaKeyPair;
pub use prime::{MAX_PRIME_DRAWS, miller_rabin_rounds, search_window};
pub use pss::{PSS_SALT_LENGTH, verify_pss, verify_pss_with_modulus};
