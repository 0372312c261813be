//! Key records and key-management operations.
//!
//! A key is a [`KeyRecord`] in the [`MetadataStore`] plus the raw secret
//! bytes in the [`SecretStore`], both addressed by the key name. Secrets
//! enter and leave the system as Base32 text; the secret store only ever
//! holds decoded bytes.

use std::fmt;
use std::sync::OnceLock;
use std::time::SystemTime;

use data_encoding::{Encoding, BASE32, BASE32_NOPAD};
use otpkeep_crypto_core::{
    expires_in, format_token, generate_hotp_with, generate_totp_with, OtpAlgorithm,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::store::{MetadataStore, SecretStore};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Token length used when none is given.
pub const DEFAULT_DIGITS: u32 = 6;

/// TOTP step in seconds used when none is given.
pub const DEFAULT_INTERVAL: u32 = 30;

/// Initial HOTP counter.
pub const DEFAULT_COUNTER: u64 = 1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// OTP algorithm family, stored as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum KeyKind {
    /// Counter-based (RFC 4226). Code 0.
    Hotp,
    /// Time-based (RFC 6238). Code 1.
    #[default]
    Totp,
}

impl From<KeyKind> for u8 {
    fn from(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Hotp => 0,
            KeyKind::Totp => 1,
        }
    }
}

impl TryFrom<u8> for KeyKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Hotp),
            1 => Ok(Self::Totp),
            other => Err(format!("unknown key type code: {other}")),
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hotp => f.write_str("hotp"),
            Self::Totp => f.write_str("totp"),
        }
    }
}

/// Serde form of [`OtpAlgorithm`]: its upper-case name.
pub mod algorithm_name {
    use otpkeep_crypto_core::OtpAlgorithm;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    /// Write the algorithm name.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(algorithm: &OtpAlgorithm, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(algorithm.as_str())
    }

    /// Read an algorithm name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Fails for names other than SHA1, SHA256 and SHA512.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OtpAlgorithm, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(D::Error::custom)
    }
}

/// Persisted key parameters. Never contains the secret.
///
/// `algorithm` is omitted from the JSON when it is SHA1, so records
/// written before it existed read back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Unique key name.
    pub name: String,
    /// HOTP or TOTP.
    #[serde(rename = "type")]
    pub kind: KeyKind,
    /// Token length.
    pub digits: u32,
    /// TOTP step in seconds.
    pub interval: u32,
    /// Next HOTP counter value.
    pub counter: u64,
    /// HMAC hash.
    #[serde(
        default,
        skip_serializing_if = "OtpAlgorithm::is_sha1",
        with = "algorithm_name"
    )]
    pub algorithm: OtpAlgorithm,
}

impl KeyRecord {
    /// One-line description for verbose listings.
    #[must_use]
    pub fn verbose_line(&self) -> String {
        let line = match self.kind {
            KeyKind::Totp => format!(
                "{} \t {} digits every {} seconds",
                self.name, self.digits, self.interval
            ),
            KeyKind::Hotp => format!(
                "{} \t {} digits, counter {}",
                self.name, self.digits, self.counter
            ),
        };
        if self.algorithm.is_sha1() {
            line
        } else {
            format!("{line}, {}", self.algorithm)
        }
    }
}

/// Parameters for [`add_key`].
#[derive(Debug, Clone, Default)]
pub struct AddKeyParams {
    /// Key name.
    pub name: String,
    /// Base32-encoded secret.
    pub secret: String,
    /// Token length, default [`DEFAULT_DIGITS`].
    pub digits: Option<u32>,
    /// TOTP step, default [`DEFAULT_INTERVAL`].
    pub interval: Option<u32>,
    /// Key kind, default TOTP.
    pub kind: Option<KeyKind>,
    /// Initial HOTP counter, default [`DEFAULT_COUNTER`].
    pub counter: Option<u64>,
    /// HMAC hash, default SHA1.
    pub algorithm: Option<OtpAlgorithm>,
}

/// A generated token and its remaining lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Zero-padded token text.
    pub value: String,
    /// Seconds until the TOTP step ends; 0 for HOTP.
    pub expires_in: u64,
}

// ---------------------------------------------------------------------------
// Base32 secrets
// ---------------------------------------------------------------------------

/// RFC 4648 Base32 that tolerates non-canonical trailing bits.
///
/// Built once on first use.
fn lenient_base32() -> &'static Encoding {
    static LENIENT: OnceLock<Encoding> = OnceLock::new();
    LENIENT.get_or_init(|| {
        let mut lenient = BASE32_NOPAD.specification();
        lenient.check_trailing_bits = false;
        // Only a flag of a valid encoding changes, so this never falls back.
        lenient.encoding().unwrap_or_else(|_| BASE32_NOPAD.clone())
    })
}

/// Decode a Base32 secret.
///
/// Case-insensitive; whitespace is ignored and `=` padding is optional.
///
/// # Errors
///
/// Returns [`VaultError::InvalidSecret`] if the secret is empty or not
/// valid Base32.
pub fn decode_secret(text: &str) -> Result<Vec<u8>, VaultError> {
    let mut normalized: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let trimmed_len = normalized.trim_end_matches('=').len();
    normalized.truncate(trimmed_len);

    if normalized.is_empty() {
        return Err(VaultError::InvalidSecret("empty secret".into()));
    }

    let result = lenient_base32()
        .decode(normalized.as_bytes())
        .map_err(|e| VaultError::InvalidSecret(format!("invalid Base32: {e}")));
    normalized.zeroize();
    result
}

/// Encode raw secret bytes as padded upper-case Base32.
#[must_use]
pub fn encode_secret(secret: &[u8]) -> String {
    BASE32.encode(secret)
}

// ---------------------------------------------------------------------------
// Record I/O
// ---------------------------------------------------------------------------

fn load_record(meta: &dyn MetadataStore, name: &str) -> Result<KeyRecord, VaultError> {
    let bytes = meta
        .get(name)?
        .ok_or_else(|| VaultError::KeyNotFound(name.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn store_record(meta: &mut dyn MetadataStore, record: &KeyRecord) -> Result<(), VaultError> {
    let bytes = serde_json::to_vec(record)?;
    meta.put(&record.name, &bytes)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Add a key, overwriting any existing key with the same name.
///
/// The secret is written before the record, so a failure between the two
/// leaves no record pointing at a missing secret.
///
/// # Errors
///
/// - [`VaultError::InvalidName`] if the name is empty.
/// - [`VaultError::InvalidSecret`] if the secret is empty or not Base32.
/// - [`VaultError::InvalidRecord`] if the interval is 0.
/// - Store errors from either backend.
pub fn add_key(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    params: AddKeyParams,
) -> Result<KeyRecord, VaultError> {
    let AddKeyParams {
        name,
        secret,
        digits,
        interval,
        kind,
        counter,
        algorithm,
    } = params;

    if name.trim().is_empty() {
        return Err(VaultError::InvalidName("name cannot be empty".into()));
    }
    let interval = interval.unwrap_or(DEFAULT_INTERVAL);
    if interval == 0 {
        return Err(VaultError::InvalidRecord(format!(
            "{name}: interval must be greater than 0"
        )));
    }

    let mut raw = decode_secret(&secret)?;
    let record = KeyRecord {
        name,
        kind: kind.unwrap_or_default(),
        digits: digits.unwrap_or(DEFAULT_DIGITS),
        interval,
        counter: counter.unwrap_or(DEFAULT_COUNTER),
        algorithm: algorithm.unwrap_or_default(),
    };

    let written = secrets.set(&record.name, &raw);
    raw.zeroize();
    written?;
    store_record(meta, &record)?;

    debug!(
        name = %record.name,
        kind = %record.kind,
        digits = record.digits,
        interval = record.interval,
        algorithm = %record.algorithm,
        "added key"
    );
    Ok(record)
}

/// Fetch one key record.
///
/// # Errors
///
/// Returns [`VaultError::KeyNotFound`] for an unknown name.
pub fn get_key(meta: &dyn MetadataStore, name: &str) -> Result<KeyRecord, VaultError> {
    load_record(meta, name)
}

/// All key names in ascending order.
///
/// # Errors
///
/// Propagates metadata store errors.
pub fn list_keys(meta: &dyn MetadataStore) -> Result<Vec<String>, VaultError> {
    meta.list()
}

/// All key records in name order.
///
/// # Errors
///
/// Propagates metadata store errors and malformed records.
pub fn dump_keys(meta: &dyn MetadataStore) -> Result<Vec<KeyRecord>, VaultError> {
    meta.list()?
        .iter()
        .map(|name| load_record(meta, name))
        .collect()
}

/// Generate the current token for `name`.
///
/// HOTP keys use the stored counter, then persist `counter + 1` before the
/// token is returned.
///
/// # Errors
///
/// - [`VaultError::KeyNotFound`] for an unknown name or missing secret.
/// - [`VaultError::Crypto`] if TOTP generation fails (zero interval).
pub fn generate_token(
    meta: &mut dyn MetadataStore,
    secrets: &dyn SecretStore,
    name: &str,
    now: SystemTime,
) -> Result<Token, VaultError> {
    let mut record = load_record(meta, name)?;
    let secret = secrets.get(name)?;

    let token = match record.kind {
        KeyKind::Totp => {
            let value = generate_totp_with(
                record.algorithm,
                secret.expose(),
                now,
                record.digits,
                record.interval,
            )?;
            Token {
                value: format_token(record.digits, value),
                expires_in: expires_in(now, record.interval),
            }
        }
        KeyKind::Hotp => {
            let value = generate_hotp_with(
                record.algorithm,
                secret.expose(),
                record.digits,
                record.counter,
            );
            record.counter = record.counter.wrapping_add(1);
            store_record(meta, &record)?;
            Token {
                value: format_token(record.digits, value),
                expires_in: 0,
            }
        }
    };

    debug!(name, kind = %record.kind, "generated token");
    Ok(token)
}

/// Remove a key.
///
/// A secret that is already gone is tolerated so that a half-removed key
/// can still be cleaned up.
///
/// # Errors
///
/// Returns [`VaultError::KeyNotFound`] if no record exists.
pub fn remove_key(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    name: &str,
) -> Result<(), VaultError> {
    load_record(meta, name)?;

    match secrets.delete(name) {
        Ok(()) => {}
        Err(VaultError::KeyNotFound(_)) => {
            warn!(name, "secret not present in secret store, skipping deletion");
        }
        Err(e) => return Err(e),
    }

    if !meta.delete(name)? {
        return Err(VaultError::KeyNotFound(name.to_string()));
    }
    info!(name, "removed key");
    Ok(())
}

/// Rename a key and its secret.
///
/// # Errors
///
/// - [`VaultError::KeyNotFound`] if `old` does not exist.
/// - [`VaultError::KeyExists`] if `new` is already taken.
/// - [`VaultError::InvalidName`] if `new` is empty.
pub fn rename_key(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    old: &str,
    new: &str,
) -> Result<KeyRecord, VaultError> {
    if new.trim().is_empty() {
        return Err(VaultError::InvalidName("name cannot be empty".into()));
    }
    let mut record = load_record(meta, old)?;
    if meta.get(new)?.is_some() {
        return Err(VaultError::KeyExists(new.to_string()));
    }

    secrets.rename(old, new)?;
    record.name = new.to_string();
    store_record(meta, &record)?;
    meta.delete(old)?;

    info!(old, new, "renamed key");
    Ok(record)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
