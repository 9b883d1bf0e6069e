//! Authenticator registry and per-method configuration.
//!
//! The registry is a constructed object passed into the component that
//! needs it, with a deterministic registration order; there is no
//! module-level global. Unknown method names fail loudly.

use serde::{Deserialize, Serialize};

use crate::authenticator::{AnonymousAuth, Authenticator, TicketAuth};
use crate::challenge::AuthExtra;
use crate::cra::WampCraAuth;
use crate::cryptosign::CryptoSignAuth;
use crate::error::AuthError;
use crate::scram::ScramAuth;

/// Per-method authentication options from the configuration surface.
///
/// Which fields are required (and which must be absent) depends on the
/// method; [`AuthRegistry::create`] enforces this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Authentication ID to announce (e.g. a username).
    #[serde(default)]
    pub authid: Option<String>,
    /// Authentication role to request.
    #[serde(default)]
    pub authrole: Option<String>,
    /// Method-specific extra data to attach to the HELLO.
    #[serde(default)]
    pub authextra: Option<AuthExtra>,
    /// Shared secret (WAMP-CRA).
    #[serde(default)]
    pub secret: Option<String>,
    /// Bearer ticket (Ticket).
    #[serde(default)]
    pub ticket: Option<String>,
    /// Password (WAMP-SCRAM).
    #[serde(default)]
    pub password: Option<String>,
    /// Hex-encoded Ed25519 private key (CryptoSign).
    #[serde(default)]
    pub privkey: Option<String>,
    /// Channel binding scheme (CryptoSign, e.g. `"tls-unique"`).
    #[serde(default)]
    pub channel_binding: Option<String>,
}

impl AuthConfig {
    fn require(&self, method: &str, field: &'static str) -> Result<String, AuthError> {
        let value = match field {
            "authid" => &self.authid,
            "secret" => &self.secret,
            "ticket" => &self.ticket,
            "password" => &self.password,
            "privkey" => &self.privkey,
            _ => &None,
        };
        value.clone().ok_or_else(|| {
            AuthError::InvalidConfig(format!("'{method}' requires the '{field}' option"))
        })
    }

    /// Reject credential options that do not belong to `method`.
    fn forbid_foreign_credentials(
        &self,
        method: &str,
        allowed: &[&str],
    ) -> Result<(), AuthError> {
        for (field, value) in [
            ("secret", &self.secret),
            ("ticket", &self.ticket),
            ("password", &self.password),
            ("privkey", &self.privkey),
        ] {
            if value.is_some() && !allowed.contains(&field) {
                return Err(AuthError::InvalidConfig(format!(
                    "unexpected option '{field}' for method '{method}'"
                )));
            }
        }
        Ok(())
    }

    fn authextra(&self) -> AuthExtra {
        self.authextra.clone().unwrap_or_default()
    }
}

/// Registry of authentication method constructors.
///
/// Registration order is fixed and deterministic; `methods()` reflects it.
#[derive(Debug, Clone)]
pub struct AuthRegistry {
    methods: Vec<&'static str>,
}

impl AuthRegistry {
    /// All method names the default registry understands, in registration
    /// order. Proxy tags name the same behavior under a distinct method
    /// name.
    pub const DEFAULT_METHODS: [&'static str; 7] = [
        "anonymous",
        "anonymous-proxy",
        "ticket",
        "wampcra",
        "cryptosign",
        "cryptosign-proxy",
        "scram",
    ];

    /// Build a registry with every built-in method registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            methods: Self::DEFAULT_METHODS.to_vec(),
        }
    }

    /// Registered method names in registration order.
    #[must_use]
    pub fn methods(&self) -> &[&'static str] {
        &self.methods
    }

    /// Whether `name` is a registered method.
    #[must_use]
    pub fn supports(&self, name: &str) -> bool {
        self.methods.contains(&name)
    }

    /// Construct an authenticator for `name` from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownMethod`] for unregistered names and
    /// [`AuthError::InvalidConfig`] when required options are missing,
    /// foreign credentials are present, or a key is malformed.
    pub fn create(&self, name: &str, config: &AuthConfig) -> Result<Authenticator, AuthError> {
        if !self.supports(name) {
            return Err(AuthError::UnknownMethod(name.to_string()));
        }
        match name {
            "anonymous" | "anonymous-proxy" => {
                config.forbid_foreign_credentials(name, &[])?;
                let method = if name == "anonymous" {
                    "anonymous"
                } else {
                    "anonymous-proxy"
                };
                Ok(Authenticator::Anonymous(AnonymousAuth::new(
                    method,
                    config.authrole.clone(),
                    config.authextra(),
                )))
            }
            "ticket" => {
                config.forbid_foreign_credentials(name, &["ticket"])?;
                Ok(Authenticator::Ticket(TicketAuth::new(
                    config.require(name, "authid")?,
                    config.authrole.clone(),
                    config.require(name, "ticket")?,
                    config.authextra(),
                )))
            }
            "wampcra" => {
                config.forbid_foreign_credentials(name, &["secret"])?;
                Ok(Authenticator::WampCra(WampCraAuth::new(
                    config.require(name, "authid")?,
                    config.authrole.clone(),
                    config.require(name, "secret")?,
                    config.authextra(),
                )))
            }
            "cryptosign" | "cryptosign-proxy" => {
                config.forbid_foreign_credentials(name, &["privkey"])?;
                let method = if name == "cryptosign" {
                    "cryptosign"
                } else {
                    "cryptosign-proxy"
                };
                Ok(Authenticator::CryptoSign(CryptoSignAuth::new(
                    method,
                    config.require(name, "authid")?,
                    config.authrole.clone(),
                    &config.require(name, "privkey")?,
                    config.channel_binding.clone(),
                    config.authextra(),
                )?))
            }
            "scram" => {
                config.forbid_foreign_credentials(name, &["password"])?;
                Ok(Authenticator::Scram(ScramAuth::new(
                    config.require(name, "authid")?,
                    config.authrole.clone(),
                    config.require(name, "password")?,
                )))
            }
            other => Err(AuthError::UnknownMethod(other.to_string())),
        }
    }
}

impl Default for AuthRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
