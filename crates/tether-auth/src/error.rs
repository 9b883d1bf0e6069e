//! Authentication error types.

use thiserror::Error;

/// Errors raised by authenticators and the supporting key derivation
/// primitives.
///
/// Challenge-phase errors abort the session with a descriptive reason; a
/// [`AuthError::ServerSignatureMismatch`] from `on_welcome` is a hard
/// failure and the session must be torn down.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authenticator is registered under the requested method name.
    #[error("unknown authentication method '{0}'")]
    UnknownMethod(String),

    /// The authenticator configuration is malformed or incomplete.
    #[error("invalid authenticator configuration: {0}")]
    InvalidConfig(String),

    /// The challenge names a different method than this authenticator.
    #[error("challenge method mismatch: expected '{expected}', got '{actual}'")]
    MethodMismatch {
        /// The authenticator's own method name
        expected: String,
        /// The method named by the challenge
        actual: String,
    },

    /// This method never expects a challenge at all.
    #[error("unexpected challenge for method '{0}'")]
    UnexpectedChallenge(String),

    /// A required challenge/welcome field is absent.
    #[error("challenge is missing required field '{0}'")]
    MissingField(&'static str),

    /// A challenge/welcome field is present but malformed.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The server-supplied SCRAM signature did not verify.
    #[error("verification of server SCRAM signature failed")]
    ServerSignatureMismatch,

    /// A key derivation function rejected its inputs.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// An underlying cryptographic primitive failed.
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    /// Random number generation failed.
    #[error("random number generation failed")]
    RandomFailed,
}
