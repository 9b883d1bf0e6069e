//! Time-based one-time codes and WAMP-CRA secret utilities.
//!
//! TOTP follows the RFC 6238 construction: HMAC-SHA1 over a big-endian
//! 30-second time-step counter, truncated to a 6-digit decimal code.
//! `check_totp` tolerates one step of clock skew in either direction.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use data_encoding::BASE32;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AuthError;
use crate::kdf::hmac_sha256;

/// TOTP time step, in seconds.
pub const TOTP_PERIOD: u64 = 30;

/// Generate a new random Base32-encoded TOTP secret.
///
/// `length` is the number of entropy octets; the encoded secret is
/// `length * 8 / 5` characters (letters `A-Z` and digits `2-7`).
///
/// # Errors
///
/// Returns [`AuthError::RandomFailed`] if the OS CSPRNG fails.
pub fn generate_totp_secret(length: usize) -> Result<String, AuthError> {
    let mut entropy = vec![0u8; length];
    getrandom::getrandom(&mut entropy).map_err(|_| AuthError::RandomFailed)?;
    Ok(BASE32.encode(&entropy))
}

/// Compute the TOTP code for an explicit time-step counter.
///
/// # Errors
///
/// Returns [`AuthError::InvalidField`] if the secret is not valid Base32.
pub fn compute_totp_counter(secret: &str, counter: u64) -> Result<String, AuthError> {
    let key = BASE32
        .decode(secret.as_bytes())
        .map_err(|e| AuthError::InvalidField {
            field: "secret",
            reason: format!("invalid Base32 secret: {e}"),
        })?;

    let mut mac = Hmac::<Sha1>::new_from_slice(&key)
        .map_err(|e| AuthError::Crypto(format!("failed to key HMAC-SHA1: {e}")))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();
    let digest = digest.as_slice();

    // dynamic truncation (RFC 4226 §5.3)
    let offset = (digest[19] & 0x0F) as usize;
    let slice: [u8; 4] = digest[offset..offset + 4]
        .try_into()
        .map_err(|_| AuthError::Crypto("digest truncation out of range".to_string()))?;
    let code = (u32::from_be_bytes(slice) & 0x7FFF_FFFF) % 1_000_000;
    Ok(format!("{code:06}"))
}

/// Compute the TOTP code for the current time, shifted by `offset` steps.
///
/// # Errors
///
/// Returns [`AuthError::InvalidField`] if the secret is not valid Base32.
pub fn compute_totp(secret: &str, offset: i64) -> Result<String, AuthError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AuthError::Crypto("system clock before the epoch".to_string()))?
        .as_secs();
    let counter = (now / TOTP_PERIOD) as i64 + offset;
    compute_totp_counter(secret, u64::try_from(counter).unwrap_or(0))
}

/// Check a TOTP code against the shared secret, allowing ±30 s clock skew.
///
/// # Errors
///
/// Returns [`AuthError::InvalidField`] if the secret is not valid Base32.
pub fn check_totp(secret: &str, candidate: &str) -> Result<bool, AuthError> {
    for offset in [0, 1, -1] {
        if compute_totp(secret, offset)? == candidate {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Generate a new random secret for use with WAMP-CRA.
///
/// The secret is drawn from upper/lower case latin letters and digits.
#[must_use]
pub fn generate_wcs(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| rng.sample(Alphanumeric) as char).collect()
}

/// Compute a WAMP-CRA authentication signature from a challenge and a
/// (possibly derived) key, returned in Base64 encoding.
///
/// # Errors
///
/// Returns [`AuthError::Crypto`] if the HMAC cannot be keyed.
pub fn compute_wcs(key: &[u8], challenge: &[u8]) -> Result<String, AuthError> {
    Ok(STANDARD.encode(hmac_sha256(key, challenge)?))
}
