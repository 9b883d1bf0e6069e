//! Key derivation primitives.
//!
//! PBKDF2 wrappers used by WAMP-CRA salted secrets, and the Argon2id-13
//! profile used by WAMP-SCRAM. The SCRAM profile hard-codes parallelism 1
//! and a 32-byte hash as required by the WAMP-SCRAM draft.

use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use crate::error::AuthError;

/// Default PBKDF2 iteration count for WAMP-CRA salted secrets.
pub const CRA_DEFAULT_ITERATIONS: u32 = 1000;

/// Default derived key length for WAMP-CRA salted secrets, in bytes.
pub const CRA_DEFAULT_KEYLEN: usize = 32;

/// HMAC-SHA256 of `data` under `key`.
pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], AuthError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| AuthError::Crypto(format!("failed to key HMAC-SHA256: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Derive `keylen` bytes from `secret` and `salt` with PBKDF2-HMAC-SHA256.
///
/// # Errors
///
/// Returns [`AuthError::KeyDerivation`] if the parameters are rejected.
pub fn pbkdf2_sha256(
    secret: &[u8],
    salt: &[u8],
    iterations: u32,
    keylen: usize,
) -> Result<Vec<u8>, AuthError> {
    let mut out = vec![0u8; keylen];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(secret, salt, iterations, &mut out)
        .map_err(|e| AuthError::KeyDerivation(format!("PBKDF2-SHA256: {e}")))?;
    Ok(out)
}

/// Derive `keylen` bytes from `secret` and `salt` with PBKDF2-HMAC-SHA1.
///
/// Only used by legacy tooling; new derivations use SHA-256.
///
/// # Errors
///
/// Returns [`AuthError::KeyDerivation`] if the parameters are rejected.
pub fn pbkdf2_sha1(
    secret: &[u8],
    salt: &[u8],
    iterations: u32,
    keylen: usize,
) -> Result<Vec<u8>, AuthError> {
    let mut out = vec![0u8; keylen];
    pbkdf2::pbkdf2::<Hmac<Sha1>>(secret, salt, iterations, &mut out)
        .map_err(|e| AuthError::KeyDerivation(format!("PBKDF2-SHA1: {e}")))?;
    Ok(out)
}

/// Compute a WAMP-CRA derived key from a secret and salt, returned in
/// Base64 encoding as used on the wire.
///
/// Defaults when unspecified: 1000 iterations, 32-byte key.
///
/// # Errors
///
/// Returns [`AuthError::KeyDerivation`] if the parameters are rejected.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    iterations: Option<u32>,
    keylen: Option<usize>,
) -> Result<String, AuthError> {
    let key = pbkdf2_sha256(
        secret,
        salt,
        iterations.unwrap_or(CRA_DEFAULT_ITERATIONS),
        keylen.unwrap_or(CRA_DEFAULT_KEYLEN),
    )?;
    Ok(STANDARD.encode(key))
}

/// Raw Argon2id v19 hash with the WAMP-SCRAM profile (parallelism 1,
/// 32-byte output).
///
/// # Errors
///
/// Returns [`AuthError::KeyDerivation`] if the cost parameters or salt are
/// rejected by the Argon2 implementation.
pub fn argon2id_13(
    password: &[u8],
    salt: &[u8],
    time_cost: u32,
    memory_cost: u32,
) -> Result<[u8; 32], AuthError> {
    let params = ParamsBuilder::new()
        .t_cost(time_cost)
        .m_cost(memory_cost)
        .p_cost(1)
        .output_len(32)
        .build()
        .map_err(|e| AuthError::KeyDerivation(format!("Argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| AuthError::KeyDerivation(format!("Argon2id: {e}")))?;
    Ok(out)
}

/// Argon2id-13 salted password in the textual form WAMP-SCRAM feeds to
/// HMAC: the unpadded Base64 encoding of the raw hash.
///
/// # Errors
///
/// Returns [`AuthError::KeyDerivation`] if the underlying hash fails.
pub fn argon2id_13_text(
    password: &[u8],
    salt: &[u8],
    time_cost: u32,
    memory_cost: u32,
) -> Result<String, AuthError> {
    Ok(STANDARD_NO_PAD.encode(argon2id_13(password, salt, time_cost, memory_cost)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    // HMAC-SHA1 test vectors from RFC 6070 and Crypt-PBKDF2
    const PBKDF2_SHA1_VECTORS: &[(&[u8], &[u8], u32, usize, &str)] = &[
        (b"password", b"salt", 1, 20, "0c60c80f961f0e71f3a9b524af6012062fe037a6"),
        (b"password", b"salt", 2, 20, "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957"),
        (b"password", b"salt", 4096, 20, "4b007901b765489abead49d926f721d065a429c1"),
        (
            b"password",
            b"ATHENA.MIT.EDUraeburn",
            1,
            16,
            "cdedb5281bb2f801565a1122b2563515",
        ),
        (
            b"password",
            b"ATHENA.MIT.EDUraeburn",
            1200,
            32,
            "5c08eb61fdf71e4e4ec3cf6ba1f5512ba7e52ddbc5e5142f708a31e2e62b1e13",
        ),
        (
            b"passwordPASSWORDpassword",
            b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
            4096,
            25,
            "3d2eec4fe41c849b80c8d83662c0e44a8b291a964cf2f07038",
        ),
        (b"pass\x00word", b"sa\x00lt", 4096, 16, "56fa6aa75548099dcc37d7f03425e0c3"),
    ];

    #[test]
    fn test_pbkdf2_sha1_vectors() {
        for (secret, salt, iterations, keylen, expected) in PBKDF2_SHA1_VECTORS {
            let key = pbkdf2_sha1(secret, salt, *iterations, *keylen).unwrap();
            assert_eq!(hex::encode(key), *expected);
        }
    }

    #[test]
    fn test_pbkdf2_sha256_vector() {
        let key = pbkdf2_sha256(b"p4ssw0rd", b"1234567890abcdef", 8, 32).unwrap();
        assert_eq!(
            hex::encode(key),
            "f6991a28c75f43751e0d75499fd7b8649f659118ddc1d61cee5883af547d15f5"
        );
    }

    #[test]
    fn test_derive_key_vector() {
        let key = derive_key(b"L3L1YUE8Txlw", b"salt123", None, None).unwrap();
        assert_eq!(key, "qzcdsr9uu/L5hnss3kjNTRe490ETgA70ZBaB5rvnJ5Y=");
    }

    #[test]
    fn test_derive_key_explicit_params_match_defaults() {
        let explicit = derive_key(b"L3L1YUE8Txlw", b"salt123", Some(1000), Some(32)).unwrap();
        let defaulted = derive_key(b"L3L1YUE8Txlw", b"salt123", None, None).unwrap();
        assert_eq!(explicit, defaulted);
    }

    #[test]
    fn test_argon2id_13_vector() {
        // generated with the reference argon2 CLI:
        // echo -n "p4ssw0rd" | argon2 '1234567890abcdef' -id -t 32 -m 9 -p 1 -l 32
        let hash = argon2id_13(b"p4ssw0rd", b"1234567890abcdef", 32, 512).unwrap();
        assert_eq!(
            hex::encode(hash),
            "ee4a8acf9d5958354fb79a95ae20692d05e42591ba49fae85eb6700e8b0ed293"
        );
    }

    #[test]
    fn test_argon2id_13_text_is_unpadded_base64() {
        let text = argon2id_13_text(b"p4ssw0rd", b"1234567890abcdef", 32, 512).unwrap();
        assert!(!text.ends_with('='));
        assert_eq!(text.len(), 43); // 32 bytes -> 43 base64 chars without padding
    }

    #[test]
    fn test_argon2id_13_rejects_bad_params() {
        // memory below the Argon2 minimum of 8 KiB
        assert!(argon2id_13(b"pw", b"0123456789abcdef", 4, 4).is_err());
    }

    #[test]
    fn test_hmac_sha256_known_answer() {
        // RFC 4231 test case 2
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
