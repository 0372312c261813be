//! Error types for `otpkeep-vault`.

use otpkeep_crypto_core::CryptoError;
use thiserror::Error;

use crate::import::ImportError;

/// Errors produced by key management, backup and restore.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Aegis vault import failed before any entry was processed.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A native backup section could not be decoded, authenticated or parsed.
    #[error("backup decryption failed: {0}")]
    Decrypt(String),

    /// Unknown restore format selector.
    #[error("unsupported restore format: {0}")]
    UnsupportedFormat(String),

    /// No key stored under this name.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A key with this name already exists.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// Key name rejected (empty).
    #[error("invalid key name: {0}")]
    InvalidName(String),

    /// Secret is empty or not valid Base32.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// Key parameters or a restored record are out of range.
    #[error("invalid key record: {0}")]
    InvalidRecord(String),

    /// OS keyring failure.
    #[error("secret store error: {0}")]
    SecretStore(String),

    /// `SQLite` error.
    #[error("database error: {0}")]
    Database(String),

    /// Migration error during schema upgrade.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON (de)serialization of a key record failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
