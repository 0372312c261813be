//! Restore dispatcher.
//!
//! `native` restores are all-or-nothing per section; `vault` restores parse
//! and decrypt strictly, then import entries best-effort.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::backup::restore_native;
use crate::error::VaultError;
use crate::import::{aegis, import_entries, ImportReport};
use crate::store::{MetadataStore, SecretStore};

/// Input format accepted by [`restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreFormat {
    /// Native `.`-separated encrypted backup.
    #[default]
    Native,
    /// Aegis vault export, plain or encrypted.
    Vault,
}

impl FromStr for RestoreFormat {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "vault" | "aegis" => Ok(Self::Vault),
            other => Err(VaultError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for RestoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Vault => f.write_str("vault"),
        }
    }
}

/// What a restore did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Names restored from a native backup.
    Native {
        /// Restored key names, in backup order.
        restored: Vec<String>,
    },
    /// Import report for a vault export.
    Vault(ImportReport),
}

/// Restore keys from `input` in the given format.
///
/// Surrounding whitespace of `input` is ignored.
///
/// # Errors
///
/// - Native: any error from [`restore_native`].
/// - Vault: [`VaultError::Import`] if the export cannot be parsed or
///   decrypted. Per-entry problems are reported, not returned.
pub fn restore(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    input: &str,
    password: &[u8],
    format: RestoreFormat,
) -> Result<RestoreOutcome, VaultError> {
    let input = input.trim();
    info!(%format, "restoring keys");

    match format {
        RestoreFormat::Native => {
            let restored = restore_native(meta, secrets, input, password)?;
            Ok(RestoreOutcome::Native { restored })
        }
        RestoreFormat::Vault => {
            let envelope = aegis::parse(input.as_bytes())?;
            let db = envelope.read_db(password)?;
            Ok(RestoreOutcome::Vault(import_entries(
                meta,
                secrets,
                &db.entries,
            )))
        }
    }
}
