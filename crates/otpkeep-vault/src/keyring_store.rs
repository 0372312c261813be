//! OS keyring secret store.
//!
//! Secrets are stored as raw bytes in the platform credential store
//! (Secret Service on Linux, Keychain on macOS, Credential Manager on
//! Windows) under `(service, key name)`.

use otpkeep_crypto_core::SecretBuffer;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::store::SecretStore;

/// Default keyring service name.
pub const DEFAULT_SERVICE: &str = "otpkeep";

/// [`SecretStore`] backed by the `keyring` crate.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    /// Create a store scoped to `service`.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// The keyring service this store reads and writes.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry, VaultError> {
        keyring::Entry::new(&self.service, name)
            .map_err(|e| VaultError::SecretStore(format!("failed to create keyring entry: {e}")))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, name: &str) -> Result<SecretBuffer, VaultError> {
        let mut raw = self.entry(name)?.get_secret().map_err(|e| match e {
            keyring::Error::NoEntry => VaultError::KeyNotFound(name.to_string()),
            other => VaultError::SecretStore(format!("keyring error: {other}")),
        })?;
        let secret = SecretBuffer::new(&raw);
        raw.zeroize();
        Ok(secret)
    }

    fn set(&mut self, name: &str, secret: &[u8]) -> Result<(), VaultError> {
        debug!(service = %self.service, name, "writing secret to keyring");
        self.entry(name)?
            .set_secret(secret)
            .map_err(|e| VaultError::SecretStore(format!("failed to set secret: {e}")))
    }

    fn delete(&mut self, name: &str) -> Result<(), VaultError> {
        debug!(service = %self.service, name, "deleting secret from keyring");
        self.entry(name)?.delete_credential().map_err(|e| match e {
            keyring::Error::NoEntry => VaultError::KeyNotFound(name.to_string()),
            other => VaultError::SecretStore(format!("failed to delete secret: {other}")),
        })
    }
}
