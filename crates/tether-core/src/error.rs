//! Core error types.
//!
//! The taxonomy follows retryability: configuration errors are fatal and
//! never retried, negotiation/authentication/transport errors fail one
//! attempt and remain eligible for retry per policy, and protocol errors
//! close the connection. The supervisor never inspects failure internals,
//! only whether a transport can still be retried.

use thiserror::Error;

/// A session state machine violation.
///
/// Always fatal to the connection: the transport must be closed. It is
/// never retried on the same transport within the same attempt, but does
/// not by itself exhaust the supervisor.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A state transition outside the session state machine was attempted.
    #[error("invalid session state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the session was in
        from: String,
        /// State that was requested
        to: String,
    },

    /// A message arrived that is illegal in the current state
    /// (e.g. CHALLENGE while ESTABLISHED).
    #[error("unexpected {message} message in session state {state}")]
    UnexpectedMessage {
        /// Message tag
        message: &'static str,
        /// State the session was in
        state: String,
    },
}

/// Malformed transport or authentication configuration.
///
/// Raised before any connect attempt and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The transport list is empty.
    #[error("at least one transport must be configured")]
    NoTransports,

    /// The realm is empty.
    #[error("realm must not be empty")]
    EmptyRealm,

    /// A transport URL does not match its transport kind.
    #[error("invalid url '{url}' for {kind} transport")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Transport kind it was configured for
        kind: &'static str,
    },

    /// Rawsocket transports frame exactly one serializer.
    #[error("'rawsocket' transport requires exactly one serializer")]
    RawSocketSerializers,

    /// A retry tuning value is out of range.
    #[error("invalid retry setting '{setting}': {reason}")]
    InvalidRetry {
        /// Setting name
        setting: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// An authentication method is unknown or misconfigured.
    #[error("authentication configuration: {0}")]
    Auth(#[from] tether_auth::AuthError),
}

/// Supervisor-facing sum of everything that can fail a connection attempt.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Fatal configuration error (never retried).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport-level failure: connect refused, TLS failure, socket reset.
    #[error("transport error: {0}")]
    Transport(String),

    /// Compression extension negotiation failed for this attempt.
    #[error("negotiation error: {0}")]
    Negotiation(#[from] tether_compress::CompressError),

    /// Challenge/response authentication failed.
    #[error("authentication error: {0}")]
    Authentication(#[from] tether_auth::AuthError),

    /// The session state machine was violated.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The router aborted the handshake.
    #[error("connection aborted by peer: {reason}")]
    Aborted {
        /// Router-supplied reason URI
        reason: String,
        /// Optional human-readable message
        message: Option<String>,
    },

    /// A transport ran out of its retry budget mid-delay computation.
    #[error("maximum reconnects reached")]
    RetriesExhausted,

    /// No configured transport can be reconnected; cycling has stopped.
    #[error("all transports exhausted")]
    Exhausted {
        /// The last per-attempt error observed before giving up.
        #[source]
        last: Option<Box<ConnectError>>,
    },
}
