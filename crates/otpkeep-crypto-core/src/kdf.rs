//! Password-based key derivation.
//!
//! This module provides:
//! - [`derive_backup_key`]: PBKDF2-HMAC-SHA256 key for the native backup codec
//! - [`derive_scrypt`]: scrypt key-encryption key for Aegis password slots
//! - [`ScryptParams`]: scrypt cost parameters as stored by Aegis (`N`, not `log2(N)`)
//!
//! # Native backup KDF
//!
//! The native backup key is PBKDF2-HMAC-SHA256 with an **empty salt** and
//! 1000 iterations. Identical passwords therefore yield identical keys across
//! every backup. Existing backups depend on this exact derivation, so it must
//! not change without a new wire format.

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use zeroize::Zeroize;

/// Output length of both KDFs in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count for the native backup key.
pub const PBKDF2_ITERATIONS: u32 = 1000;

/// Salt used for the native backup key (none).
const BACKUP_SALT: &[u8] = &[];

/// Largest accepted scrypt `log2(N)`.
pub const MAX_SCRYPT_LOG_N: u8 = 20;

/// Largest accepted scrypt parallelism `p`.
pub const MAX_SCRYPT_P: u32 = 16;

/// Upper bound on scrypt working memory, `128 * r * (N + p)` bytes.
pub const MAX_SCRYPT_MEMORY: u64 = 256 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// scrypt cost parameters, in the form Aegis stores them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScryptParams {
    /// CPU/memory cost `N` (must be a power of two greater than 1).
    pub n: u64,
    /// Block size `r`.
    pub r: u32,
    /// Parallelism `p`.
    pub p: u32,
}

impl ScryptParams {
    /// `log2(N)` as expected by the `scrypt` crate.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if `N` is not a power of two
    /// greater than 1, or exceeds `2^MAX_SCRYPT_LOG_N`.
    pub fn log_n(self) -> Result<u8, CryptoError> {
        if self.n < 2 || !self.n.is_power_of_two() {
            return Err(CryptoError::KeyDerivation(format!(
                "scrypt N must be a power of 2 greater than 1, got {}",
                self.n
            )));
        }
        let log_n = u8::try_from(self.n.trailing_zeros())
            .map_err(|_| CryptoError::KeyDerivation("scrypt N out of range".into()))?;
        if log_n > MAX_SCRYPT_LOG_N {
            return Err(CryptoError::KeyDerivation(format!(
                "scrypt N = 2^{log_n} exceeds 2^{MAX_SCRYPT_LOG_N}"
            )));
        }
        Ok(log_n)
    }

    /// Bytes of memory scrypt needs for these parameters.
    ///
    /// `None` if the product overflows `u64`.
    #[must_use]
    pub fn memory_cost(self) -> Option<u64> {
        self.n
            .checked_add(u64::from(self.p))?
            .checked_mul(u64::from(self.r))?
            .checked_mul(128)
    }

    /// Reject parameters that would exhaust memory or CPU.
    ///
    /// Returns `log2(N)` on success.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if `N` is invalid or too large,
    /// `p` exceeds [`MAX_SCRYPT_P`], or the memory cost exceeds
    /// [`MAX_SCRYPT_MEMORY`].
    pub fn check_cost(self) -> Result<u8, CryptoError> {
        let log_n = self.log_n()?;
        if self.p > MAX_SCRYPT_P {
            return Err(CryptoError::KeyDerivation(format!(
                "scrypt p = {} exceeds {MAX_SCRYPT_P}",
                self.p
            )));
        }
        match self.memory_cost() {
            Some(bytes) if bytes <= MAX_SCRYPT_MEMORY => Ok(log_n),
            _ => Err(CryptoError::KeyDerivation(format!(
                "scrypt parameters N={} r={} p={} exceed the {MAX_SCRYPT_MEMORY} byte memory limit",
                self.n, self.r, self.p
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the 256-bit native backup key from a password.
///
/// PBKDF2-HMAC-SHA256, empty salt, [`PBKDF2_ITERATIONS`] rounds.
#[must_use]
pub fn derive_backup_key(password: &[u8]) -> SecretBytes<KEY_LEN> {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, BACKUP_SALT, PBKDF2_ITERATIONS, &mut out);
    let key = SecretBytes::new(out);
    out.zeroize();
    key
}

/// Derive a 256-bit key with scrypt.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the parameters are rejected
/// (non power-of-two `N`, zero `r`/`p`, or a cost above
/// [`ScryptParams::check_cost`]'s limits).
pub fn derive_scrypt(
    password: &[u8],
    salt: &[u8],
    params: ScryptParams,
) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    let scrypt_params = scrypt::Params::new(params.check_cost()?, params.r, params.p, KEY_LEN)
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid scrypt params: {e}")))?;

    let mut out = [0u8; KEY_LEN];
    let result = scrypt::scrypt(password, salt, &scrypt_params, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(format!("scrypt failed: {e}")));
    let key = SecretBytes::new(out);
    out.zeroize();
    result.map(|()| key)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: ScryptParams = ScryptParams { n: 1024, r: 8, p: 1 };

    #[test]
    fn backup_key_matches_known_vector() {
        // PBKDF2-HMAC-SHA256("password", "", 1000, 32)
        let key = derive_backup_key(b"password");
        let hex: String = key.expose().iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "26939681d19995a2cefb7b90d13e1343f09b30f0abbd07416a23b9bc3c5b3536"
        );
    }

    #[test]
    fn backup_key_is_deterministic() {
        let a = derive_backup_key(b"hunter2");
        let b = derive_backup_key(b"hunter2");
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn backup_key_differs_per_password() {
        let a = derive_backup_key(b"alpha");
        let b = derive_backup_key(b"beta");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn scrypt_produces_32_bytes_and_is_salted() {
        let a = derive_scrypt(b"test", &[0xAA; 32], FAST).expect("derive");
        let b = derive_scrypt(b"test", &[0xBB; 32], FAST).expect("derive");
        assert_eq!(a.expose().len(), KEY_LEN);
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn scrypt_rejects_non_power_of_two() {
        let params = ScryptParams { n: 1000, r: 8, p: 1 };
        assert!(matches!(
            derive_scrypt(b"test", b"salt", params),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn scrypt_rejects_zero_cost() {
        for n in [0, 1] {
            let params = ScryptParams { n, r: 8, p: 1 };
            assert!(params.log_n().is_err(), "N={n} should be rejected");
        }
    }

    #[test]
    fn scrypt_rejects_zero_parallelism() {
        let params = ScryptParams { n: 1024, r: 8, p: 0 };
        assert!(matches!(
            derive_scrypt(b"test", b"salt", params),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn scrypt_rejects_oversized_cost_before_allocating() {
        let huge = [
            ScryptParams { n: 1 << 40, r: 8, p: 1 },
            ScryptParams { n: 1 << 21, r: 1, p: 1 },
            ScryptParams { n: 1 << 20, r: 8, p: 1 },
            ScryptParams { n: 1024, r: u32::MAX, p: 1 },
            ScryptParams { n: 1024, r: 8, p: MAX_SCRYPT_P + 1 },
        ];
        for params in huge {
            assert!(
                matches!(
                    derive_scrypt(b"test", b"salt", params),
                    Err(CryptoError::KeyDerivation(_))
                ),
                "{params:?} should be rejected"
            );
        }
    }

    #[test]
    fn aegis_default_cost_is_within_limits() {
        let params = ScryptParams { n: 32768, r: 8, p: 1 };
        assert_eq!(params.check_cost().unwrap(), 15);
        assert!(params.memory_cost().unwrap() <= MAX_SCRYPT_MEMORY);
    }

    #[test]
    fn memory_cost_overflow_is_none() {
        let params = ScryptParams { n: u64::MAX / 2, r: u32::MAX, p: 1 };
        assert_eq!(params.memory_cost(), None);
    }

    #[test]
    fn log_n_of_aegis_default() {
        let params = ScryptParams { n: 32768, r: 8, p: 1 };
        assert_eq!(params.log_n().unwrap(), 15);
    }
}
