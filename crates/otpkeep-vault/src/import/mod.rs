//! Foreign vault import.
//!
//! [`aegis`] turns an export into a list of [`Entry`] values; this module
//! normalizes each entry into an [`add_key`] call. Import is strict up to
//! the point where entries exist and best-effort afterwards: a bad entry
//! becomes a [`SkippedEntry`] and the batch carries on.

pub mod aegis;

use std::fmt;

use otpkeep_crypto_core::OtpAlgorithm;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::keys::{add_key, decode_secret, AddKeyParams, KeyKind};
use crate::store::{MetadataStore, SecretStore};
use aegis::Entry;

// ---------------------------------------------------------------------------
// Import error types
// ---------------------------------------------------------------------------

/// Envelope-level import failure. Nothing has been imported when one of
/// these is returned.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Malformed JSON or unexpected structure.
    #[error("invalid vault: {0}")]
    Parse(String),

    /// `decrypt` was called on a plain export.
    #[error("vault is not encrypted")]
    NotEncrypted,

    /// `parse_plain` was called on an encrypted export.
    #[error("vault is encrypted")]
    Encrypted,

    /// No slot of type 1 (password) in the header.
    #[error("no password slot found in vault")]
    NoPasswordSlot,

    /// Bad salt encoding or rejected scrypt parameters.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The slot did not authenticate: wrong password or tampered slot.
    #[error("failed to unwrap master key: wrong password or corrupted slot")]
    MasterKeyUnwrap,

    /// The db payload did not authenticate under the master key.
    #[error("failed to decrypt vault database")]
    DatabaseDecrypt,

    /// Malformed hex or Base64 field.
    #[error("encoding error: {0}")]
    Encoding(String),
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Why an entry was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `info.secret` is absent.
    MissingSecret,
    /// `info.secret` is not a string.
    SecretNotString,
    /// `info.secret` is not valid Base32.
    InvalidSecret(String),
    /// Entry type other than `totp`, `hotp` or `steam`.
    UnsupportedType(String),
    /// `info.algo` names a hash other than SHA1, SHA256 or SHA512.
    UnsupportedAlgorithm(String),
    /// The key store rejected the entry.
    Rejected(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecret => f.write_str("no secret found"),
            Self::SecretNotString => f.write_str("secret is not a string"),
            Self::InvalidSecret(e) => write!(f, "invalid base32 secret: {e}"),
            Self::UnsupportedType(t) => write!(f, "unsupported entry type: {t}"),
            Self::UnsupportedAlgorithm(a) => write!(f, "unsupported algorithm: {a}"),
            Self::Rejected(e) => write!(f, "could not add key: {e}"),
        }
    }
}

/// An entry left out of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Position in the vault's entry list.
    pub index: usize,
    /// Display name the entry would have had.
    pub name: String,
    /// What went wrong.
    pub reason: SkipReason,
}

/// Result of a best-effort import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Names of imported keys, in vault order.
    pub imported: Vec<String>,
    /// Entries that were skipped, in vault order.
    pub skipped: Vec<SkippedEntry>,
}

// ---------------------------------------------------------------------------
// Typed entry info
// ---------------------------------------------------------------------------

/// OTP parameters of one entry, by entry type.
#[derive(Clone, PartialEq, Eq)]
pub enum OtpInfo {
    /// `type == "totp"`.
    Totp {
        /// Base32 secret.
        secret: String,
        /// Token length.
        digits: Option<u32>,
        /// Step in seconds.
        period: Option<u32>,
    },
    /// `type == "hotp"`.
    Hotp {
        /// Base32 secret.
        secret: String,
        /// Token length.
        digits: Option<u32>,
        /// Next counter value.
        counter: Option<u64>,
    },
    /// `type == "steam"`. Imported as a plain TOTP key.
    Steam {
        /// Base32 secret.
        secret: String,
        /// Token length.
        digits: Option<u32>,
    },
}

impl fmt::Debug for OtpInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Totp { digits, period, .. } => f
                .debug_struct("Totp")
                .field("digits", digits)
                .field("period", period)
                .finish_non_exhaustive(),
            Self::Hotp {
                digits, counter, ..
            } => f
                .debug_struct("Hotp")
                .field("digits", digits)
                .field("counter", counter)
                .finish_non_exhaustive(),
            Self::Steam { digits, .. } => f
                .debug_struct("Steam")
                .field("digits", digits)
                .finish_non_exhaustive(),
        }
    }
}

/// Non-negative integer from a JSON number; fractions are truncated.
/// Anything else (missing, negative, non-numeric, too large) is `None`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn json_uint(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    // u64::MAX as f64 rounds up to 2^64, so the bound is exclusive.
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && *f < u64::MAX as f64)
        .map(|f| f.trunc() as u64)
}

fn json_u32(value: Option<&Value>) -> Option<u32> {
    json_uint(value).and_then(|n| u32::try_from(n).ok())
}

impl OtpInfo {
    /// Interpret an entry's `info` map according to its type.
    ///
    /// `period` is only read for `totp` entries and `counter` only for
    /// `hotp` entries.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] for a missing or non-string secret, or an
    /// unsupported entry type.
    pub fn from_entry(entry_type: &str, info: &Map<String, Value>) -> Result<Self, SkipReason> {
        let secret = match info.get("secret") {
            None => return Err(SkipReason::MissingSecret),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(SkipReason::SecretNotString),
        };
        let digits = json_u32(info.get("digits"));

        match entry_type {
            "totp" => Ok(Self::Totp {
                secret,
                digits,
                period: json_u32(info.get("period")),
            }),
            "hotp" => Ok(Self::Hotp {
                secret,
                digits,
                counter: json_uint(info.get("counter")),
            }),
            "steam" => Ok(Self::Steam { secret, digits }),
            other => Err(SkipReason::UnsupportedType(other.to_string())),
        }
    }

    /// Base32 secret text.
    #[must_use]
    pub fn secret(&self) -> &str {
        match self {
            Self::Totp { secret, .. } | Self::Hotp { secret, .. } | Self::Steam { secret, .. } => {
                secret
            }
        }
    }

    /// Key parameters for [`add_key`], without name or secret.
    fn key_params(&self) -> AddKeyParams {
        match self {
            Self::Totp { digits, period, .. } => AddKeyParams {
                digits: *digits,
                interval: *period,
                kind: Some(KeyKind::Totp),
                ..AddKeyParams::default()
            },
            Self::Hotp {
                digits, counter, ..
            } => AddKeyParams {
                digits: *digits,
                kind: Some(KeyKind::Hotp),
                counter: *counter,
                ..AddKeyParams::default()
            },
            Self::Steam { digits, .. } => AddKeyParams {
                digits: *digits,
                kind: Some(KeyKind::Totp),
                ..AddKeyParams::default()
            },
        }
    }
}

/// HMAC hash named by an entry's `info.algo`.
///
/// A missing or `null` field means SHA1.
///
/// # Errors
///
/// Returns [`SkipReason::UnsupportedAlgorithm`] for any other name or a
/// non-string value.
pub fn entry_algorithm(info: &Map<String, Value>) -> Result<OtpAlgorithm, SkipReason> {
    match info.get("algo") {
        None | Some(Value::Null) => Ok(OtpAlgorithm::Sha1),
        Some(Value::String(name)) => name
            .parse()
            .map_err(|_| SkipReason::UnsupportedAlgorithm(name.clone())),
        Some(other) => Err(SkipReason::UnsupportedAlgorithm(other.to_string())),
    }
}

/// `issuer - name`, or just `name` when the issuer is empty.
#[must_use]
pub fn display_name(entry: &Entry) -> String {
    if entry.issuer.is_empty() {
        entry.name.clone()
    } else {
        format!("{} - {}", entry.issuer, entry.name)
    }
}

// ---------------------------------------------------------------------------
// Best-effort import
// ---------------------------------------------------------------------------

fn import_entry(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    entry: &Entry,
    name: &str,
) -> Result<(), SkipReason> {
    let info = OtpInfo::from_entry(&entry.entry_type, &entry.info)?;
    let algorithm = entry_algorithm(&entry.info)?;
    decode_secret(info.secret()).map_err(|e| SkipReason::InvalidSecret(e.to_string()))?;

    let params = AddKeyParams {
        name: name.to_string(),
        secret: info.secret().to_string(),
        algorithm: Some(algorithm),
        ..info.key_params()
    };
    add_key(meta, secrets, params).map_err(|e| SkipReason::Rejected(e.to_string()))?;
    Ok(())
}

/// Import every entry that can be imported.
///
/// Never fails as a whole: each rejected entry is logged and recorded in
/// [`ImportReport::skipped`].
pub fn import_entries(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    entries: &[Entry],
) -> ImportReport {
    let mut report = ImportReport::default();

    for (index, entry) in entries.iter().enumerate() {
        let name = display_name(entry);
        match import_entry(meta, secrets, entry, &name) {
            Ok(()) => report.imported.push(name),
            Err(reason) => {
                warn!(index, name = %name, %reason, "skipping vault entry");
                report.skipped.push(SkippedEntry {
                    index,
                    name,
                    reason,
                });
            }
        }
    }

    info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        "vault import complete"
    );
    report
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
