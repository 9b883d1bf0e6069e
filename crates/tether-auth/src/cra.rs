//! WAMP-CRA challenge-response authentication.
//!
//! The router challenge carries a JSON challenge string to sign with
//! HMAC-SHA256. When the router supplies a salt, the signing key is first
//! derived from the shared secret with PBKDF2-HMAC-SHA256 and transmitted
//! in its Base64 form, as produced by [`crate::kdf::derive_key`].

use crate::challenge::{AuthExtra, Challenge, SessionBinding};
use crate::error::AuthError;
use crate::kdf::derive_key;
use crate::totp::compute_wcs;

/// Method name of this authenticator.
pub const METHOD: &str = "wampcra";

/// WAMP-CRA authenticator state for one connection attempt.
#[derive(Debug, Clone)]
pub struct WampCraAuth {
    pub(crate) authid: String,
    pub(crate) authrole: Option<String>,
    secret: String,
    authextra: AuthExtra,
}

impl WampCraAuth {
    /// Create a WAMP-CRA authenticator from a shared secret.
    pub(crate) fn new(
        authid: String,
        authrole: Option<String>,
        secret: String,
        authextra: AuthExtra,
    ) -> Self {
        Self {
            authid,
            authrole,
            secret,
            authextra,
        }
    }

    /// Data to attach to the session HELLO.
    #[must_use]
    pub fn authextra(&self) -> AuthExtra {
        self.authextra.clone()
    }

    /// Sign the router challenge.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MethodMismatch`] for a foreign challenge and
    /// [`AuthError::MissingField`] / [`AuthError::InvalidField`] when the
    /// challenge string or salt parameters are malformed.
    pub fn on_challenge(
        &mut self,
        _binding: &SessionBinding,
        challenge: &Challenge,
    ) -> Result<String, AuthError> {
        if challenge.method != METHOD {
            return Err(AuthError::MethodMismatch {
                expected: METHOD.to_string(),
                actual: challenge.method.clone(),
            });
        }
        let challenge_str = challenge.str_field("challenge")?;

        // salted secrets sign with the Base64 text of the derived key
        let key = match challenge.extra.get("salt") {
            Some(_) => {
                let salt = challenge.str_field("salt")?;
                let iterations = challenge.opt_u32_field("iterations")?;
                let keylen = challenge.opt_u32_field("keylen")?;
                derive_key(
                    self.secret.as_bytes(),
                    salt.as_bytes(),
                    iterations,
                    keylen.map(|k| k as usize),
                )?
                .into_bytes()
            }
            None => self.secret.clone().into_bytes(),
        };

        compute_wcs(&key, challenge_str.as_bytes())
    }
}
