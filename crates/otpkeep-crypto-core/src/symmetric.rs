//! AES-256-GCM with empty associated data.
//!
//! Two layouts are in use. Native backup sections carry
//! `nonce || ciphertext || tag` as one buffer ([`seal`] / [`open_sealed`]).
//! Aegis stores the nonce and tag in separate fields, so callers rebuild
//! `ciphertext || tag` themselves and pass the nonce to [`open`].

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::kdf::KEY_LEN;
use crate::memory::SecretBuffer;

/// GCM nonce size.
pub const NONCE_LEN: usize = 12;

/// GCM tag size.
pub const TAG_LEN: usize = 16;

fn cipher(key: &[u8]) -> Result<LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidLength {
            what: "key",
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    UnboundKey::new(&aead::AES_256_GCM, key)
        .map(LessSafeKey::new)
        .map_err(|_| CryptoError::Encryption("AES-256-GCM key setup failed".into()))
}

/// Encrypt under a fresh random nonce. Returns `nonce || ciphertext || tag`.
///
/// # Errors
///
/// [`CryptoError::InvalidLength`] for a key that is not 32 bytes,
/// [`CryptoError::Encryption`] if the OS RNG or the cipher fails.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CryptoError::Encryption(format!("nonce generation failed: {e}")))?;

    let mut body = plaintext.to_vec();
    if cipher
        .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut body)
        .is_err()
    {
        body.zeroize();
        return Err(CryptoError::Encryption("AES-256-GCM seal failed".into()));
    }

    let mut out = Vec::with_capacity(NONCE_LEN.saturating_add(body.len()));
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypt `ciphertext || tag` under `nonce`.
///
/// # Errors
///
/// [`CryptoError::InvalidLength`] for a bad key or nonce size,
/// [`CryptoError::Decryption`] if authentication fails, including input
/// shorter than a tag.
pub fn open(
    key: &[u8],
    nonce: &[u8],
    ciphertext_and_tag: &[u8],
) -> Result<SecretBuffer, CryptoError> {
    let cipher = cipher(key)?;
    let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| CryptoError::InvalidLength {
        what: "nonce",
        expected: NONCE_LEN,
        actual: nonce.len(),
    })?;

    let mut buf = ciphertext_and_tag.to_vec();
    let opened = cipher
        .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut buf)
        .map(|plaintext| SecretBuffer::new(plaintext))
        .map_err(|_| CryptoError::Decryption);
    buf.zeroize();
    opened
}

/// Decrypt the output of [`seal`].
///
/// # Errors
///
/// As [`open`]; input shorter than a nonce is [`CryptoError::Decryption`].
pub fn open_sealed(key: &[u8], sealed: &[u8]) -> Result<SecretBuffer, CryptoError> {
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::Decryption);
    }
    let (nonce, rest) = sealed.split_at(NONCE_LEN);
    open(key, nonce, rest)
}
