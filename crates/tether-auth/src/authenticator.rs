//! The closed authenticator set and its dispatch.
//!
//! Every WAMP authentication method TETHER speaks is a variant of
//! [`Authenticator`]; dispatch is a `match`, not a name-keyed class map.
//! Each variant owns its configuration for the lifetime of one connection
//! attempt and is consulted exactly once during the CHALLENGE step and once
//! during WELCOME verification.

use crate::challenge::{AuthExtra, Challenge, SessionBinding};
use crate::cra::WampCraAuth;
use crate::cryptosign::CryptoSignAuth;
use crate::error::AuthError;
use crate::scram::ScramAuth;

/// An authenticator that never expects a challenge.
///
/// Also used for the `anonymous-proxy` name tag, which is behaviorally
/// identical but announced under its own method name.
pub struct AnonymousAuth {
    method: &'static str,
    pub(crate) authrole: Option<String>,
    authextra: AuthExtra,
}

impl AnonymousAuth {
    pub(crate) fn new(
        method: &'static str,
        authrole: Option<String>,
        authextra: AuthExtra,
    ) -> Self {
        Self {
            method,
            authrole,
            authextra,
        }
    }
}

/// Bearer-ticket authenticator: the response is the pre-shared ticket
/// string verbatim.
pub struct TicketAuth {
    pub(crate) authid: String,
    pub(crate) authrole: Option<String>,
    ticket: String,
    authextra: AuthExtra,
}

impl TicketAuth {
    pub(crate) fn new(
        authid: String,
        authrole: Option<String>,
        ticket: String,
        authextra: AuthExtra,
    ) -> Self {
        Self {
            authid,
            authrole,
            ticket,
            authextra,
        }
    }
}

/// The closed set of authentication strategies.
///
/// Variants carry their own configuration payloads; see the per-method
/// modules for the algorithms.
pub enum Authenticator {
    /// No authentication; a challenge is a protocol error.
    Anonymous(AnonymousAuth),
    /// Pre-shared bearer ticket.
    Ticket(TicketAuth),
    /// HMAC-SHA256 challenge-response with optional PBKDF2 salting.
    WampCra(WampCraAuth),
    /// Ed25519 public-key signature.
    CryptoSign(CryptoSignAuth),
    /// Salted-password mutual authentication.
    Scram(ScramAuth),
}

impl Authenticator {
    /// The wire name of this authentication method.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Authenticator::Anonymous(a) => a.method,
            Authenticator::Ticket(_) => "ticket",
            Authenticator::WampCra(_) => "wampcra",
            Authenticator::CryptoSign(c) => c.method(),
            Authenticator::Scram(_) => "scram",
        }
    }

    /// The authid this authenticator announces, if any.
    #[must_use]
    pub fn authid(&self) -> Option<&str> {
        match self {
            Authenticator::Anonymous(_) => None,
            Authenticator::Ticket(t) => Some(&t.authid),
            Authenticator::WampCra(c) => Some(&c.authid),
            Authenticator::CryptoSign(c) => Some(&c.authid),
            Authenticator::Scram(s) => Some(&s.authid),
        }
    }

    /// The authrole this authenticator requests, if any.
    #[must_use]
    pub fn authrole(&self) -> Option<&str> {
        match self {
            Authenticator::Anonymous(a) => a.authrole.as_deref(),
            Authenticator::Ticket(t) => t.authrole.as_deref(),
            Authenticator::WampCra(c) => c.authrole.as_deref(),
            Authenticator::CryptoSign(c) => c.authrole.as_deref(),
            Authenticator::Scram(s) => s.authrole.as_deref(),
        }
    }

    /// Data to attach to the session HELLO for this method.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RandomFailed`] if nonce generation fails
    /// (SCRAM only).
    pub fn authextra(&mut self) -> Result<AuthExtra, AuthError> {
        match self {
            Authenticator::Anonymous(a) => Ok(a.authextra.clone()),
            Authenticator::Ticket(t) => Ok(t.authextra.clone()),
            Authenticator::WampCra(c) => Ok(c.authextra()),
            Authenticator::CryptoSign(c) => Ok(c.authextra()),
            Authenticator::Scram(s) => s.authextra(),
        }
    }

    /// Compute the signature for a router challenge.
    ///
    /// # Errors
    ///
    /// Fails when the challenge method does not match this authenticator,
    /// when required challenge fields are absent or malformed, or when the
    /// method never expects a challenge at all.
    pub fn on_challenge(
        &mut self,
        binding: &SessionBinding,
        challenge: &Challenge,
    ) -> Result<String, AuthError> {
        match self {
            Authenticator::Anonymous(a) => {
                Err(AuthError::UnexpectedChallenge(a.method.to_string()))
            }
            Authenticator::Ticket(t) => {
                if challenge.method != "ticket" {
                    return Err(AuthError::MethodMismatch {
                        expected: "ticket".to_string(),
                        actual: challenge.method.clone(),
                    });
                }
                Ok(t.ticket.clone())
            }
            Authenticator::WampCra(c) => c.on_challenge(binding, challenge),
            Authenticator::CryptoSign(c) => c.on_challenge(binding, challenge),
            Authenticator::Scram(s) => s.on_challenge(binding, challenge),
        }
    }

    /// Post-hoc verification against the WELCOME's authextra.
    ///
    /// Only SCRAM verifies anything here (the server signature); every
    /// other method accepts unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ServerSignatureMismatch`] when SCRAM server
    /// authentication fails; the session must then be torn down.
    pub fn on_welcome(&mut self, authextra: &AuthExtra) -> Result<(), AuthError> {
        match self {
            Authenticator::Scram(s) => s.on_welcome(authextra),
            _ => Ok(()),
        }
    }

    /// Drop any per-attempt state (e.g. the SCRAM client nonce) so a
    /// reconnect starts fresh.
    pub fn reset_attempt(&mut self) {
        if let Authenticator::Scram(s) = self {
            s.reset_attempt();
        }
    }
}
