//! WAMP-CryptoSign public-key authentication.
//!
//! The router challenge is a 32-byte random value in hex encoding. The
//! client signs it with its Ed25519 key and replies with the hex
//! concatenation of the 64-byte signature and the 32-byte signed data
//! (192 hex characters). With `tls-unique` channel binding the signed data
//! is the XOR of the challenge and the TLS channel ID, tying the signature
//! to this very transport.

use ed25519_dalek::{Signer, SigningKey};
use serde_json::Value;

use crate::challenge::{AuthExtra, Challenge, SessionBinding};
use crate::error::AuthError;
use crate::{CRYPTOSIGN_CHALLENGE_SIZE, CRYPTOSIGN_PRIVKEY_SIZE};

/// Method name of this authenticator.
pub const METHOD: &str = "cryptosign";

/// Supported channel binding scheme.
pub const CHANNEL_BINDING_TLS_UNIQUE: &str = "tls-unique";

/// WAMP-CryptoSign authenticator state for one connection attempt.
pub struct CryptoSignAuth {
    method: &'static str,
    pub(crate) authid: String,
    pub(crate) authrole: Option<String>,
    privkey: SigningKey,
    channel_binding: Option<String>,
    authextra: AuthExtra,
}

impl CryptoSignAuth {
    /// Create a CryptoSign authenticator from a hex-encoded Ed25519
    /// private key.
    ///
    /// The public key is derived from the private key and injected into
    /// `authextra` under `"pubkey"`. If the caller already supplied a
    /// `pubkey` it must match the derived one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] for a malformed private key, a
    /// mismatching configured public key or an unsupported channel binding
    /// scheme.
    pub(crate) fn new(
        method: &'static str,
        authid: String,
        authrole: Option<String>,
        privkey_hex: &str,
        channel_binding: Option<String>,
        mut authextra: AuthExtra,
    ) -> Result<Self, AuthError> {
        let privkey_bytes: [u8; CRYPTOSIGN_PRIVKEY_SIZE] = hex::decode(privkey_hex)
            .map_err(|e| AuthError::InvalidConfig(format!("invalid privkey hex: {e}")))?
            .try_into()
            .map_err(|_| {
                AuthError::InvalidConfig(format!(
                    "privkey must be {CRYPTOSIGN_PRIVKEY_SIZE} bytes"
                ))
            })?;
        let privkey = SigningKey::from_bytes(&privkey_bytes);
        let pubkey_hex = hex::encode(privkey.verifying_key().to_bytes());

        match authextra.get("pubkey") {
            Some(Value::String(configured)) if *configured == pubkey_hex => {}
            Some(Value::String(_)) => {
                return Err(AuthError::InvalidConfig(
                    "public key does not correspond to private key".to_string(),
                ));
            }
            Some(_) => {
                return Err(AuthError::InvalidConfig(
                    "authextra 'pubkey' must be a hex string".to_string(),
                ));
            }
            None => {
                authextra.insert("pubkey".to_string(), Value::String(pubkey_hex));
            }
        }

        if let Some(scheme) = &channel_binding {
            if scheme != CHANNEL_BINDING_TLS_UNIQUE {
                return Err(AuthError::InvalidConfig(format!(
                    "unsupported channel binding '{scheme}'"
                )));
            }
        }

        Ok(Self {
            method,
            authid,
            authrole,
            privkey,
            channel_binding,
            authextra,
        })
    }

    /// The method name tag this authenticator was registered under.
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Hex encoding of the public key used for authentication.
    #[must_use]
    pub fn public_key(&self) -> String {
        hex::encode(self.privkey.verifying_key().to_bytes())
    }

    /// Data to attach to the session HELLO (always carries `"pubkey"`).
    #[must_use]
    pub fn authextra(&self) -> AuthExtra {
        self.authextra.clone()
    }

    /// Sign the router challenge.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MethodMismatch`] for a foreign challenge,
    /// [`AuthError::InvalidField`] for a malformed challenge value and
    /// [`AuthError::MissingField`] when channel binding is configured but
    /// the transport supplied no channel ID.
    pub fn on_challenge(
        &mut self,
        binding: &SessionBinding,
        challenge: &Challenge,
    ) -> Result<String, AuthError> {
        if challenge.method != self.method {
            return Err(AuthError::MethodMismatch {
                expected: self.method.to_string(),
                actual: challenge.method.clone(),
            });
        }
        let challenge_hex = challenge.str_field("challenge")?;
        let challenge_raw: [u8; CRYPTOSIGN_CHALLENGE_SIZE] = hex::decode(challenge_hex)
            .map_err(|e| AuthError::InvalidField {
                field: "challenge",
                reason: format!("invalid hex: {e}"),
            })?
            .try_into()
            .map_err(|_| AuthError::InvalidField {
                field: "challenge",
                reason: format!("expected {CRYPTOSIGN_CHALLENGE_SIZE} bytes"),
            })?;

        let data = match &self.channel_binding {
            // with tls-unique the signed message is challenge XOR channel ID
            Some(_) => {
                let channel_id = binding
                    .channel_id
                    .ok_or(AuthError::MissingField("channel_id"))?;
                let mut bound = [0u8; CRYPTOSIGN_CHALLENGE_SIZE];
                for (i, byte) in bound.iter_mut().enumerate() {
                    *byte = challenge_raw[i] ^ channel_id[i];
                }
                bound
            }
            None => challenge_raw,
        };

        let signature = self.privkey.sign(&data);
        Ok(format!(
            "{}{}",
            hex::encode(signature.to_bytes()),
            hex::encode(data)
        ))
    }
}
