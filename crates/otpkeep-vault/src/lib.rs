//! `otpkeep-vault`: key management, backups and imports for otpkeep.
//!
//! Key records live in a [`MetadataStore`] (SQLite on disk), raw OTP
//! secrets in a [`SecretStore`] (the OS keyring). On top of those sit the
//! native encrypted backup codec, the Aegis vault importer and the
//! restore dispatcher that chooses between them.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod db;
pub mod error;
pub mod keyring_store;
pub mod store;

pub mod keys;

pub mod backup;
pub mod import;
pub mod restore;

pub use otpkeep_crypto_core::OtpAlgorithm;

pub use backup::{
    backup_all, decrypt_record, encrypt_record, restore_native, BackupRecord, SECTION_SEPARATOR,
};
pub use db::SqliteMetadataStore;
pub use error::VaultError;
pub use import::aegis::{VaultDb, VaultEnvelope};
pub use import::{
    entry_algorithm, import_entries, ImportError, ImportReport, OtpInfo, SkipReason, SkippedEntry,
};
pub use keyring_store::KeyringSecretStore;
pub use keys::{
    add_key, algorithm_name, decode_secret, dump_keys, encode_secret, generate_token, get_key,
    list_keys, remove_key, rename_key, AddKeyParams, KeyKind, KeyRecord, Token, DEFAULT_COUNTER,
    DEFAULT_DIGITS, DEFAULT_INTERVAL,
};
pub use restore::{restore, RestoreFormat, RestoreOutcome};
pub use store::{MemoryMetadataStore, MemorySecretStore, MetadataStore, SecretStore};
