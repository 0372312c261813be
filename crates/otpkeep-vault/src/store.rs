//! Store capabilities used by key management.
//!
//! Two stores back every key:
//! - [`SecretStore`] owns the raw OTP secret bytes, addressed by key name
//! - [`MetadataStore`] owns the serialized [`KeyRecord`](crate::keys::KeyRecord)
//!
//! Neither store is transactional with the other; callers order their
//! writes so a half-finished operation leaves at worst an orphaned secret.

use std::collections::BTreeMap;
use std::fmt;

use otpkeep_crypto_core::SecretBuffer;

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Backend holding raw OTP secrets.
pub trait SecretStore: fmt::Debug {
    /// Fetch the secret stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyNotFound`] if nothing is stored under `name`,
    /// or [`VaultError::SecretStore`] if the backend fails.
    fn get(&self, name: &str) -> Result<SecretBuffer, VaultError>;

    /// Store or replace the secret under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SecretStore`] if the backend fails.
    fn set(&mut self, name: &str, secret: &[u8]) -> Result<(), VaultError>;

    /// Remove the secret under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyNotFound`] if nothing is stored under `name`,
    /// or [`VaultError::SecretStore`] if the backend fails.
    fn delete(&mut self, name: &str) -> Result<(), VaultError>;

    /// Move the secret from `old` to `new`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`get`](Self::get), [`set`](Self::set) and
    /// [`delete`](Self::delete).
    fn rename(&mut self, old: &str, new: &str) -> Result<(), VaultError> {
        let secret = self.get(old)?;
        self.set(new, secret.expose())?;
        self.delete(old)
    }
}

/// Backend holding serialized key records.
pub trait MetadataStore: fmt::Debug {
    /// Fetch the record bytes stored under `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the backend fails.
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, VaultError>;

    /// Insert or overwrite the record under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the backend fails.
    fn put(&mut self, name: &str, value: &[u8]) -> Result<(), VaultError>;

    /// Remove the record under `name`. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the backend fails.
    fn delete(&mut self, name: &str) -> Result<bool, VaultError>;

    /// All stored names in ascending byte order.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the backend fails.
    fn list(&self) -> Result<Vec<String>, VaultError>;
}

// ---------------------------------------------------------------------------
// In-memory backends
// ---------------------------------------------------------------------------

/// Secret store kept entirely in process memory.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: BTreeMap<String, SecretBuffer>,
}

impl MemorySecretStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored secrets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Returns `true` if no secrets are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl fmt::Debug for MemorySecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySecretStore")
            .field("names", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> Result<SecretBuffer, VaultError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| VaultError::KeyNotFound(name.to_string()))
    }

    fn set(&mut self, name: &str, secret: &[u8]) -> Result<(), VaultError> {
        self.secrets
            .insert(name.to_string(), SecretBuffer::new(secret));
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), VaultError> {
        self.secrets
            .remove(name)
            .map(drop)
            .ok_or_else(|| VaultError::KeyNotFound(name.to_string()))
    }
}

/// Metadata store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: BTreeMap<String, Vec<u8>>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, VaultError> {
        Ok(self.records.get(name).cloned())
    }

    fn put(&mut self, name: &str, value: &[u8]) -> Result<(), VaultError> {
        self.records.insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<bool, VaultError> {
        Ok(self.records.remove(name).is_some())
    }

    fn list(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.records.keys().cloned().collect())
    }
}
