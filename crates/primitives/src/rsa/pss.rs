//! RSASSA-PSS with SHA-256
//!
//! The storage network signs transactions with RSASSA-PSS (RFC 8017 §8.1),
//! SHA-256 as both the message digest and the MGF1 hash, and a 32-byte salt.
//! The salt is random, so signing the same message twice produces two
//! different signatures.

use num_bigint::BigUint;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{KeyError, Result};

use super::keygen::PUBLIC_EXPONENT;
use super::keypair::{RsaKeyPair, public_op};

/// Digest output length in bytes.
const HASH_LENGTH: usize = 32;

/// Salt length required by the network.
pub const PSS_SALT_LENGTH: usize = 32;

/// MGF1 with SHA-256.
fn mgf1(seed: &[u8], len: usize) -> Vec<u8> {
    let mut mask = Vec::with_capacity(len + HASH_LENGTH);
    let mut counter: u32 = 0;
    while mask.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(counter.to_be_bytes());
        mask.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    mask.truncate(len);
    mask
}

fn salted_hash(m_hash: &[u8], salt: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update([0u8; 8]);
    hasher.update(m_hash);
    hasher.update(salt);
    hasher.finalize().into()
}

/// EMSA-PSS-ENCODE for an `em_bits`-bit encoded message.
fn encode(message: &[u8], salt: &[u8], em_bits: usize) -> Result<Vec<u8>> {
    let em_len = em_bits.div_ceil(8);
    if em_len < HASH_LENGTH + salt.len() + 2 {
        return Err(KeyError::Signature("modulus too small for PSS encoding"));
    }

    let m_hash = Sha256::digest(message);
    let h = salted_hash(&m_hash, salt);

    let db_len = em_len - HASH_LENGTH - 1;
    let mut db = vec![0u8; db_len];
    let separator = db_len - salt.len() - 1;
    db[separator] = 0x01;
    db[separator + 1..].copy_from_slice(salt);

    for (byte, mask) in db.iter_mut().zip(mgf1(&h, db_len)) {
        *byte ^= mask;
    }
    db[0] &= 0xffu8 >> (8 * em_len - em_bits);

    let mut em = db;
    em.extend_from_slice(&h);
    em.push(0xbc);
    Ok(em)
}

/// EMSA-PSS-VERIFY for an `em_bits`-bit encoded message.
fn verify_encoding(message: &[u8], em: &[u8], em_bits: usize, salt_len: usize) -> bool {
    let em_len = em_bits.div_ceil(8);
    if em.len() != em_len || em_len < HASH_LENGTH + salt_len + 2 {
        return false;
    }
    if em[em_len - 1] != 0xbc {
        return false;
    }

    let db_len = em_len - HASH_LENGTH - 1;
    let (masked_db, rest) = em.split_at(db_len);
    let h = &rest[..HASH_LENGTH];
    let top_mask = !(0xffu8 >> (8 * em_len - em_bits));
    if masked_db[0] & top_mask != 0 {
        return false;
    }

    let mut db: Vec<u8> = masked_db
        .iter()
        .zip(mgf1(h, db_len))
        .map(|(byte, mask)| byte ^ mask)
        .collect();
    db[0] &= !top_mask;

    let separator = db_len - salt_len - 1;
    if db[..separator].iter().any(|&b| b != 0) || db[separator] != 0x01 {
        return false;
    }

    let m_hash = Sha256::digest(message);
    salted_hash(&m_hash, &db[separator + 1..]) == h
}

fn i2osp(value: &BigUint, len: usize) -> Option<Vec<u8>> {
    let bytes = value.to_bytes_be();
    if bytes.len() > len {
        return None;
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    Some(out)
}

impl RsaKeyPair {
    /// Signs `message` with a fresh random salt.
    pub fn sign_pss(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut salt = [0u8; PSS_SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);
        self.sign_pss_with_salt(message, &salt)
    }

    /// Signs `message` with an explicit salt.
    ///
    /// The signature is `size()` bytes, left padded with zeros.
    pub fn sign_pss_with_salt(&self, message: &[u8], salt: &[u8]) -> Result<Vec<u8>> {
        let em = encode(message, salt, self.bits() - 1)?;
        let m = BigUint::from_bytes_be(&em);
        let s = self.private_op(&m)?;
        i2osp(&s, self.size()).ok_or(KeyError::Signature("signature longer than modulus"))
    }

    /// Verifies a signature made with [`PSS_SALT_LENGTH`] bytes of salt.
    pub fn verify_pss(&self, message: &[u8], signature: &[u8]) -> bool {
        verify_pss(self.n(), self.e(), message, signature)
    }
}

/// Verifies a PSS signature against a public key `(n, e)`.
pub fn verify_pss(n: &BigUint, e: &BigUint, message: &[u8], signature: &[u8]) -> bool {
    let mod_bits = n.bits() as usize;
    if mod_bits < 2 || signature.len() != mod_bits.div_ceil(8) {
        return false;
    }
    let s = BigUint::from_bytes_be(signature);
    if &s >= n {
        return false;
    }
    let m = public_op(n, e, &s);
    let em_bits = mod_bits - 1;
    match i2osp(&m, em_bits.div_ceil(8)) {
        Some(em) => verify_encoding(message, &em, em_bits, PSS_SALT_LENGTH),
        None => false,
    }
}

/// Verifies a PSS signature against raw modulus bytes and exponent 65537.
pub fn verify_pss_with_modulus(modulus: &[u8], message: &[u8], signature: &[u8]) -> bool {
    verify_pss(
        &BigUint::from_bytes_be(modulus),
        &BigUint::from(PUBLIC_EXPONENT),
        message,
        signature,
    )
}
