//! Error type for `otpkeep-crypto-core`.

use thiserror::Error;

/// Errors produced by the primitives in this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// scrypt parameters were rejected or derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// A key or nonce had the wrong size.
    #[error("invalid {what} length: {actual} bytes (expected {expected})")]
    InvalidLength {
        /// `"key"` or `"nonce"`.
        what: &'static str,
        /// Required size.
        expected: usize,
        /// Size received.
        actual: usize,
    },

    /// Sealing failed (nonce generation or the cipher itself).
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication failed: wrong key, tampered or truncated data.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// HOTP/TOTP input out of range.
    #[error("OTP error: {0}")]
    Otp(String),
}
