//! Challenge and session-binding types shared by all authenticators.

use serde_json::Value;

use crate::error::AuthError;

/// Open key/value map attached to HELLO/CHALLENGE/WELCOME messages.
pub type AuthExtra = serde_json::Map<String, Value>;

/// A CHALLENGE received from the router during the handshake.
#[derive(Debug, Clone)]
pub struct Challenge {
    /// Authentication method the router selected (e.g. `"wampcra"`).
    pub method: String,
    /// Method-specific challenge attributes.
    pub extra: AuthExtra,
}

impl Challenge {
    /// Create a challenge from a method name and its extra attributes.
    #[must_use]
    pub fn new(method: impl Into<String>, extra: AuthExtra) -> Self {
        Self {
            method: method.into(),
            extra,
        }
    }

    /// Fetch a required string attribute.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingField`] if absent and
    /// [`AuthError::InvalidField`] if not a string.
    pub fn str_field(&self, field: &'static str) -> Result<&str, AuthError> {
        match self.extra.get(field) {
            None => Err(AuthError::MissingField(field)),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(AuthError::InvalidField {
                field,
                reason: format!("expected a string, got {other}"),
            }),
        }
    }

    /// Fetch a required integer attribute.
    ///
    /// Routers encode counters either as JSON numbers or decimal strings;
    /// both forms are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingField`] if absent and
    /// [`AuthError::InvalidField`] if not an unsigned integer.
    pub fn u32_field(&self, field: &'static str) -> Result<u32, AuthError> {
        self.opt_u32_field(field)?
            .ok_or(AuthError::MissingField(field))
    }

    /// Fetch an optional integer attribute (number or decimal string).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidField`] if present but not an unsigned
    /// integer.
    pub fn opt_u32_field(&self, field: &'static str) -> Result<Option<u32>, AuthError> {
        let invalid = |v: &Value| AuthError::InvalidField {
            field,
            reason: format!("expected an unsigned integer, got {v}"),
        };
        match self.extra.get(field) {
            None => Ok(None),
            Some(v @ Value::Number(n)) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| invalid(v)),
            Some(v @ Value::String(s)) => {
                s.parse::<u32>().map(Some).map_err(|_| invalid(v))
            }
            Some(other) => Err(invalid(other)),
        }
    }
}

/// Transport-level facts an authenticator may bind a signature to.
///
/// Populated by the connection layer from the negotiated transport before
/// the handshake starts; scoped to one connection attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionBinding {
    /// The TLS channel ID when `tls-unique` channel binding is available.
    pub channel_id: Option<[u8; 32]>,
}
