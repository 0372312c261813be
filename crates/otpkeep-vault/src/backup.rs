//! Native encrypted backup codec.
//!
//! A backup is a `.`-joined list of sections, one per key. Each section is
//! `base64(nonce || AES-256-GCM(json) || tag)` where the JSON is a
//! [`BackupRecord`] and the key is [`derive_backup_key`] of the password.
//! Sections are independent, so any single section can be decrypted alone.

use std::fmt;

use data_encoding::BASE64;
use otpkeep_crypto_core::{
    derive_backup_key, open_sealed, seal, OtpAlgorithm, SecretBytes, KEY_LEN, NONCE_LEN,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::keys::{add_key, algorithm_name, encode_secret, get_key, AddKeyParams};
use crate::store::{MetadataStore, SecretStore};

/// Separator between backup sections.
pub const SECTION_SEPARATOR: char = '.';

// ---------------------------------------------------------------------------
// Wire record
// ---------------------------------------------------------------------------

/// Plaintext of one backup section.
///
/// `digits` and `interval` are decimal strings; an empty string means
/// "use the default" on restore. `algorithm` is only written for non-SHA1
/// keys and reads as SHA1 when absent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Key name.
    pub name: String,
    /// Token length as a decimal string.
    pub digits: String,
    /// TOTP step as a decimal string.
    pub interval: String,
    /// Base32-encoded secret.
    pub secret: String,
    /// HMAC hash.
    #[serde(
        default,
        skip_serializing_if = "OtpAlgorithm::is_sha1",
        with = "algorithm_name"
    )]
    pub algorithm: OtpAlgorithm,
}

impl fmt::Debug for BackupRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupRecord")
            .field("name", &self.name)
            .field("digits", &self.digits)
            .field("interval", &self.interval)
            .field("secret", &"***")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Section codec
// ---------------------------------------------------------------------------

fn seal_record(record: &BackupRecord, key: &SecretBytes<KEY_LEN>) -> Result<String, VaultError> {
    let mut json = serde_json::to_vec(record)?;
    let sealed = seal(key.expose(), &json);
    json.zeroize();
    Ok(BASE64.encode(&sealed?))
}

fn open_section(section: &str, key: &SecretBytes<KEY_LEN>) -> Result<BackupRecord, VaultError> {
    let decoded = BASE64
        .decode(section.as_bytes())
        .map_err(|e| VaultError::Decrypt(format!("invalid base64: {e}")))?;
    if decoded.len() < NONCE_LEN {
        return Err(VaultError::Decrypt(format!(
            "section too short: {} bytes (nonce is {NONCE_LEN})",
            decoded.len()
        )));
    }

    let plaintext = open_sealed(key.expose(), &decoded)
        .map_err(|_| VaultError::Decrypt("authentication failed: wrong password or corrupted data".into()))?;
    serde_json::from_slice(plaintext.expose())
        .map_err(|e| VaultError::Decrypt(format!("malformed backup record: {e}")))
}

/// Encrypt one record into a Base64 section.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if encryption fails.
pub fn encrypt_record(record: &BackupRecord, password: &[u8]) -> Result<String, VaultError> {
    seal_record(record, &derive_backup_key(password))
}

/// Decrypt one Base64 section.
///
/// # Errors
///
/// Returns [`VaultError::Decrypt`] if the section is not Base64, is
/// shorter than a nonce, fails authentication, or does not hold a record.
pub fn decrypt_record(section: &str, password: &[u8]) -> Result<BackupRecord, VaultError> {
    open_section(section, &derive_backup_key(password))
}

// ---------------------------------------------------------------------------
// Whole-store backup and restore
// ---------------------------------------------------------------------------

/// Back up every stored key, in name order.
///
/// Aborts on the first key that cannot be read or encrypted. Returns an
/// empty string when there are no keys.
///
/// # Errors
///
/// Propagates store and crypto errors.
pub fn backup_all(
    meta: &dyn MetadataStore,
    secrets: &dyn SecretStore,
    password: &[u8],
) -> Result<String, VaultError> {
    let key = derive_backup_key(password);
    let names = meta.list()?;
    let mut sections = Vec::with_capacity(names.len());

    for name in &names {
        let record = get_key(meta, name)?;
        let secret = secrets.get(name)?;
        let mut wire = BackupRecord {
            name: record.name,
            digits: record.digits.to_string(),
            interval: record.interval.to_string(),
            secret: encode_secret(secret.expose()),
            algorithm: record.algorithm,
        };
        let section = seal_record(&wire, &key);
        wire.secret.zeroize();
        sections.push(section?);
        debug!(name, "backed up key");
    }

    info!(count = sections.len(), "backup complete");
    Ok(sections.join(&SECTION_SEPARATOR.to_string()))
}

fn parse_decimal(name: &str, field: &str, value: &str) -> Result<Option<u32>, VaultError> {
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| {
        VaultError::InvalidRecord(format!("{name}: {field} is not a number: {value:?}"))
    })
}

/// Restore every section of a native backup, in order.
///
/// Stops at the first section that fails; keys restored from earlier
/// sections stay in place. Returns the restored names.
///
/// # Errors
///
/// - [`VaultError::Decrypt`] for a section that does not decrypt.
/// - [`VaultError::InvalidRecord`] for non-numeric digits or interval.
/// - Any error from [`add_key`].
pub fn restore_native(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    blob: &str,
    password: &[u8],
) -> Result<Vec<String>, VaultError> {
    let key = derive_backup_key(password);
    let mut restored = Vec::new();

    for section in blob.split(SECTION_SEPARATOR) {
        let record = open_section(section, &key)?;
        let digits = parse_decimal(&record.name, "digits", &record.digits)?;
        let interval = parse_decimal(&record.name, "interval", &record.interval)?;

        let added = add_key(
            meta,
            secrets,
            AddKeyParams {
                name: record.name,
                secret: record.secret,
                digits,
                interval,
                algorithm: Some(record.algorithm),
                ..AddKeyParams::default()
            },
        )?;
        debug!(name = %added.name, "restored key");
        restored.push(added.name);
    }

    info!(count = restored.len(), "native restore complete");
    Ok(restored)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
