//! Connection configuration surface.
//!
//! Everything is validated up front, before the first connect attempt:
//! a configuration error is fatal and never retried.

use serde::{Deserialize, Serialize};
use tether_auth::{AuthConfig, AuthRegistry, Authenticator};

use crate::error::ConfigError;

/// Transport kind of a configured endpoint candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket transport (`ws://` / `wss://`).
    WebSocket,
    /// Raw socket transport (`rs://` / `rss://` / `tcp://`).
    RawSocket,
}

/// TLS options for a transport endpoint, consumed by the external
/// transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Verify the peer certificate chain (disable only for testing).
    #[serde(default = "default_true")]
    pub verify_peer: bool,
    /// Path to an additional CA certificate bundle.
    #[serde(default)]
    pub ca_file: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One configured endpoint candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport kind.
    #[serde(rename = "type")]
    pub kind: TransportKind,
    /// Endpoint URL.
    pub url: String,
    /// Serializer IDs offered on this transport, in preference order.
    /// Empty means "all supported" for WebSocket transports.
    #[serde(default)]
    pub serializers: Vec<String>,
    /// TLS options, when the endpoint is secure.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl TransportConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            TransportKind::WebSocket => {
                if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
                    return Err(ConfigError::InvalidUrl {
                        url: self.url.clone(),
                        kind: "websocket",
                    });
                }
            }
            TransportKind::RawSocket => {
                if !(self.url.starts_with("rs://")
                    || self.url.starts_with("rss://")
                    || self.url.starts_with("tcp://"))
                {
                    return Err(ConfigError::InvalidUrl {
                        url: self.url.clone(),
                        kind: "rawsocket",
                    });
                }
                if self.serializers.len() != 1 {
                    return Err(ConfigError::RawSocketSerializers);
                }
            }
        }
        Ok(())
    }
}

/// Retry tuning for the connection supervisor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempt budget per transport; `None` retries forever.
    pub max_retries: Option<u32>,
    /// Upper bound on a single retry delay, in seconds.
    pub max_retry_delay: f64,
    /// Delay seed for the first retry, in seconds.
    pub initial_retry_delay: f64,
    /// Multiplicative growth applied to the delay each attempt.
    pub retry_delay_growth: f64,
    /// Gaussian jitter fraction applied to the grown delay.
    pub retry_delay_jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Some(15),
            max_retry_delay: 300.0,
            initial_retry_delay: 1.5,
            retry_delay_growth: 1.5,
            retry_delay_jitter: 0.1,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&'static str, f64); 3] = [
            ("max_retry_delay", self.max_retry_delay),
            ("initial_retry_delay", self.initial_retry_delay),
            ("retry_delay_growth", self.retry_delay_growth),
        ];
        for (setting, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidRetry {
                    setting,
                    reason: format!("must be a positive number, got {value}"),
                });
            }
        }
        if !self.retry_delay_jitter.is_finite() || self.retry_delay_jitter < 0.0 {
            return Err(ConfigError::InvalidRetry {
                setting: "retry_delay_jitter",
                reason: format!("must be non-negative, got {}", self.retry_delay_jitter),
            });
        }
        Ok(())
    }
}

/// One entry of the authentication map: a method name plus its options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthMethodConfig {
    /// Authentication method name (e.g. `"wampcra"`).
    pub method: String,
    /// Per-method options.
    #[serde(flatten)]
    pub options: AuthConfig,
}

/// Complete configuration of one logical connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Realm to join.
    pub realm: String,
    /// Ordered endpoint candidates the supervisor cycles through.
    pub transports: Vec<TransportConfig>,
    /// Authentication methods to offer, in announcement order.
    #[serde(default)]
    pub auth: Vec<AuthMethodConfig>,
    /// Retry tuning.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ConnectionConfig {
    /// Validate the whole configuration against `registry`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; nothing is retried after a
    /// configuration error.
    pub fn validate(&self, registry: &AuthRegistry) -> Result<(), ConfigError> {
        if self.realm.is_empty() {
            return Err(ConfigError::EmptyRealm);
        }
        if self.transports.is_empty() {
            return Err(ConfigError::NoTransports);
        }
        for transport in &self.transports {
            transport.validate()?;
        }
        self.retry.validate()?;
        // constructing the authenticators exercises every per-method check
        self.build_authenticators(registry).map(drop)
    }

    /// Construct one authenticator per configured method, in announcement
    /// order. Called once per connection attempt so per-attempt state
    /// (e.g. the SCRAM nonce) is always fresh.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Auth`] for unknown methods or invalid
    /// per-method options.
    pub fn build_authenticators(
        &self,
        registry: &AuthRegistry,
    ) -> Result<Vec<Authenticator>, ConfigError> {
        self.auth
            .iter()
            .map(|entry| {
                registry
                    .create(&entry.method, &entry.options)
                    .map_err(ConfigError::from)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn websocket(url: &str) -> TransportConfig {
        TransportConfig {
            kind: TransportKind::WebSocket,
            url: url.to_string(),
            serializers: vec![],
            tls: None,
        }
    }

    fn base_config() -> ConnectionConfig {
        ConnectionConfig {
            realm: "realm1".to_string(),
            transports: vec![websocket("wss://router.example.com/ws")],
            auth: vec![],
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = base_config();
        assert!(config.validate(&AuthRegistry::with_defaults()).is_ok());
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, Some(15));
        assert_eq!(retry.max_retry_delay, 300.0);
        assert_eq!(retry.initial_retry_delay, 1.5);
        assert_eq!(retry.retry_delay_growth, 1.5);
        assert_eq!(retry.retry_delay_jitter, 0.1);
    }

    #[test]
    fn test_empty_realm_rejected() {
        let mut config = base_config();
        config.realm = String::new();
        assert!(matches!(
            config.validate(&AuthRegistry::with_defaults()),
            Err(ConfigError::EmptyRealm)
        ));
    }

    #[test]
    fn test_no_transports_rejected() {
        let mut config = base_config();
        config.transports.clear();
        assert!(matches!(
            config.validate(&AuthRegistry::with_defaults()),
            Err(ConfigError::NoTransports)
        ));
    }

    #[test]
    fn test_url_kind_mismatch_rejected() {
        let mut config = base_config();
        config.transports[0].url = "https://router.example.com".to_string();
        assert!(matches!(
            config.validate(&AuthRegistry::with_defaults()),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_rawsocket_requires_exactly_one_serializer() {
        let mut config = base_config();
        config.transports[0] = TransportConfig {
            kind: TransportKind::RawSocket,
            url: "tcp://10.0.0.1:8080".to_string(),
            serializers: vec!["json".to_string(), "msgpack".to_string()],
            tls: None,
        };
        assert!(matches!(
            config.validate(&AuthRegistry::with_defaults()),
            Err(ConfigError::RawSocketSerializers)
        ));

        config.transports[0].serializers = vec!["msgpack".to_string()];
        assert!(config.validate(&AuthRegistry::with_defaults()).is_ok());
    }

    #[test]
    fn test_invalid_retry_settings_rejected() {
        let mut config = base_config();
        config.retry.retry_delay_growth = 0.0;
        assert!(matches!(
            config.validate(&AuthRegistry::with_defaults()),
            Err(ConfigError::InvalidRetry { .. })
        ));

        let mut config = base_config();
        config.retry.retry_delay_jitter = -0.5;
        assert!(config.validate(&AuthRegistry::with_defaults()).is_err());
    }

    #[test]
    fn test_auth_config_validated() {
        let mut config = base_config();
        config.auth.push(AuthMethodConfig {
            method: "wampcra".to_string(),
            options: AuthConfig::default(), // missing authid/secret
        });
        assert!(matches!(
            config.validate(&AuthRegistry::with_defaults()),
            Err(ConfigError::Auth(_))
        ));

        config.auth[0].options.authid = Some("joe".to_string());
        config.auth[0].options.secret = Some("s3cret".to_string());
        assert!(config.validate(&AuthRegistry::with_defaults()).is_ok());
    }

    #[test]
    fn test_unknown_auth_method_rejected() {
        let mut config = base_config();
        config.auth.push(AuthMethodConfig {
            method: "kerberos".to_string(),
            options: AuthConfig::default(),
        });
        assert!(config.validate(&AuthRegistry::with_defaults()).is_err());
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let json = r#"{
            "realm": "realm1",
            "transports": [
                {"type": "websocket", "url": "wss://example.com/ws", "serializers": ["json"]},
                {"type": "rawsocket", "url": "tcp://example.com:8080", "serializers": ["msgpack"]}
            ],
            "auth": [
                {"method": "wampcra", "authid": "joe", "secret": "s3cret"}
            ],
            "retry": {
                "max_retries": 3,
                "max_retry_delay": 60.0,
                "initial_retry_delay": 1.0,
                "retry_delay_growth": 2.0,
                "retry_delay_jitter": 0.25
            }
        }"#;
        let config: ConnectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.transports.len(), 2);
        assert_eq!(config.auth[0].method, "wampcra");
        assert_eq!(config.retry.max_retries, Some(3));
        assert!(config.validate(&AuthRegistry::with_defaults()).is_ok());
    }
}
