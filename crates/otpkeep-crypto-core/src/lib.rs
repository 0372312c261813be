//! `otpkeep-crypto-core`: pure cryptographic primitives for otpkeep.
//!
//! Zero I/O, zero storage. Everything here is deterministic given its inputs,
//! except nonce generation in [`symmetric::seal`].

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod symmetric;

pub mod totp;

pub use error::CryptoError;
pub use kdf::{
    derive_backup_key, derive_scrypt, ScryptParams, KEY_LEN, MAX_SCRYPT_LOG_N, MAX_SCRYPT_MEMORY,
    MAX_SCRYPT_P, PBKDF2_ITERATIONS,
};
pub use memory::{SecretBuffer, SecretBytes};
pub use symmetric::{open, open_sealed, seal, NONCE_LEN, TAG_LEN};
pub use totp::{
    expires_in, format_token, generate_hotp, generate_hotp_with, generate_totp, generate_totp_with,
    OtpAlgorithm, MAX_DIGITS,
};
