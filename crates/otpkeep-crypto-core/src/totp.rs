//! RFC 4226 HOTP and RFC 6238 TOTP generation.
//!
//! Tokens are returned as integers; [`format_token`] renders them for display.
//! HMAC-SHA1 is the default; [`OtpAlgorithm`] selects SHA-256 or SHA-512
//! for the `_with` variants. All three come from `ring::hmac`.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use ring::hmac;

use crate::CryptoError;

// ── Constants ───────────────────────────────────────────────────────

/// Largest digit count honoured by truncation. `10^8` is the biggest power
/// of ten below the 31-bit dynamic-truncation range.
pub const MAX_DIGITS: u32 = 8;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

// ── Algorithm ──────────────────────────────────────────────────────

/// HMAC hash behind an OTP key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OtpAlgorithm {
    /// HMAC-SHA1, the RFC 4226 default.
    #[default]
    Sha1,
    /// HMAC-SHA256 (RFC 6238).
    Sha256,
    /// HMAC-SHA512 (RFC 6238).
    Sha512,
}

impl OtpAlgorithm {
    /// Upper-case name as used in `otpauth://` URIs and vault exports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// `true` for the default algorithm.
    #[must_use]
    #[allow(clippy::trivially_copy_pass_by_ref)] // serde `skip_serializing_if` passes a reference
    pub fn is_sha1(&self) -> bool {
        *self == Self::Sha1
    }

    fn hmac(self) -> hmac::Algorithm {
        match self {
            Self::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => hmac::HMAC_SHA256,
            Self::Sha512 => hmac::HMAC_SHA512,
        }
    }
}

impl fmt::Display for OtpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpAlgorithm {
    type Err = CryptoError;

    /// Case-insensitive; a dash after `SHA` is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(CryptoError::Otp(format!("unsupported OTP algorithm: {s}"))),
        }
    }
}

// ── HOTP (RFC 4226) ────────────────────────────────────────────────

/// Generate an HMAC-SHA1 HOTP token per RFC 4226.
///
/// Digit counts above [`MAX_DIGITS`] truncate as if they were 8. A digit
/// count of 0 gives a modulus of 1, so the token is always 0.
#[must_use = "OTP token should be used or stored"]
pub fn generate_hotp(secret: &[u8], digits: u32, counter: u64) -> u32 {
    generate_hotp_with(OtpAlgorithm::Sha1, secret, digits, counter)
}

/// [`generate_hotp`] with a chosen HMAC hash.
#[must_use = "OTP token should be used or stored"]
pub fn generate_hotp_with(algorithm: OtpAlgorithm, secret: &[u8], digits: u32, counter: u64) -> u32 {
    // HMAC(K, C) where C is the counter as 8-byte big-endian (RFC 4226 §5.2).
    let key = hmac::Key::new(algorithm.hmac(), secret);
    let tag = hmac::sign(&key, &counter.to_be_bytes());
    let mac = tag.as_ref();

    // Dynamic truncation (RFC 4226 §5.3). The shortest MAC is 20 bytes and
    // the offset is at most 15, so offset + 3 stays in bounds.
    let offset = usize::from(mac[mac.len().wrapping_sub(1)] & 0x0F);
    let binary_code = u32::from_be_bytes([
        mac[offset] & 0x7F,
        mac[offset.wrapping_add(1)],
        mac[offset.wrapping_add(2)],
        mac[offset.wrapping_add(3)],
    ]);

    // modulus is at least 1, so the remainder always exists.
    let modulus = 10u32.pow(digits.min(MAX_DIGITS));
    binary_code.checked_rem(modulus).unwrap_or(0)
}

// ── TOTP (RFC 6238) ────────────────────────────────────────────────

/// Nanoseconds elapsed since the Unix epoch.
fn nanos_since_epoch(now: SystemTime) -> Result<u128, CryptoError> {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .map_err(|_| CryptoError::Otp("time is before the Unix epoch".to_owned()))
}

/// Generate an HMAC-SHA1 TOTP token per RFC 6238.
///
/// The time step is computed in whole nanoseconds, so an instant a few
/// nanoseconds before a boundary still maps to the earlier step.
///
/// # Errors
///
/// Returns `CryptoError::Otp` if `interval` is 0 or `now` precedes the epoch.
pub fn generate_totp(
    secret: &[u8],
    now: SystemTime,
    digits: u32,
    interval: u32,
) -> Result<u32, CryptoError> {
    generate_totp_with(OtpAlgorithm::Sha1, secret, now, digits, interval)
}

/// [`generate_totp`] with a chosen HMAC hash.
///
/// # Errors
///
/// Returns `CryptoError::Otp` if `interval` is 0 or `now` precedes the epoch.
pub fn generate_totp_with(
    algorithm: OtpAlgorithm,
    secret: &[u8],
    now: SystemTime,
    digits: u32,
    interval: u32,
) -> Result<u32, CryptoError> {
    if interval == 0 {
        return Err(CryptoError::Otp("interval must be > 0".to_owned()));
    }

    let nanos = nanos_since_epoch(now)?;
    // Non-zero: interval is validated above.
    let step_nanos = u128::from(interval).saturating_mul(NANOS_PER_SECOND);
    #[allow(clippy::arithmetic_side_effects)]
    let step = nanos / step_nanos;
    let counter = u64::try_from(step)
        .map_err(|_| CryptoError::Otp("time step out of range".to_owned()))?;

    Ok(generate_hotp_with(algorithm, secret, digits, counter))
}

/// Seconds until the current TOTP step ends: `interval - (secs % interval)`.
///
/// Returns 0 for a zero interval or a pre-epoch instant.
#[must_use]
pub fn expires_in(now: SystemTime, interval: u32) -> u64 {
    let Ok(elapsed) = now.duration_since(UNIX_EPOCH) else {
        return 0;
    };
    let interval = u64::from(interval);
    elapsed
        .as_secs()
        .checked_rem(interval)
        .and_then(|into_step| interval.checked_sub(into_step))
        .unwrap_or(0)
}

// ── Formatting ─────────────────────────────────────────────────────

/// Render `token` in decimal, left-padded with zeros to `digits` characters.
///
/// Never truncates: a token already `digits` characters or longer is
/// returned unchanged.
#[must_use]
pub fn format_token(digits: u32, token: u32) -> String {
    let width = usize::try_from(digits).unwrap_or(0);
    format!("{token:0>width$}")
}

// ── Unit tests ─────────────────────────────────────────────────────
