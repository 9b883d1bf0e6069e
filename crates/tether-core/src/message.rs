//! WAMP message records at the level the session state machine consumes.
//!
//! An external serializer decodes wire bytes into these records and encodes
//! them back; the session only sequences them. Post-WELCOME RPC/PubSub
//! traffic is carried opaquely: the session preserves per-session ordering
//! but does not interpret payloads.

use serde::{Deserialize, Serialize};
use tether_auth::AuthExtra;

/// WAMP session identifier assigned by the router.
pub type SessionId = u64;

/// Normal session close requested by the application.
pub const CLOSE_NORMAL: &str = "wamp.close.normal";

/// Reply reason acknowledging a peer-initiated GOODBYE.
pub const CLOSE_GOODBYE_AND_OUT: &str = "wamp.close.goodbye_and_out";

/// The underlying transport dropped without a GOODBYE exchange.
pub const CLOSE_TRANSPORT_LOST: &str = "wamp.close.transport_lost";

/// The router denied authorization for the session or an action.
pub const ERROR_NOT_AUTHORIZED: &str = "wamp.error.not_authorized";

/// Client-side authentication failure reason.
pub const ERROR_CANNOT_AUTHENTICATE: &str = "wamp.error.cannot_authenticate";

/// No authentication method offered by the client is acceptable.
pub const ERROR_NO_AUTH_METHOD: &str = "wamp.error.no_auth_method";

/// Tags for post-establishment RPC and PubSub records.
///
/// The payloads behind these tags (ids, options, arguments, progressive
/// result chunks, retained events) belong to the external serializer and
/// router; the session dispatches them in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficKind {
    /// RPC endpoint registration request.
    Register,
    /// Registration acknowledgement.
    Registered,
    /// RPC endpoint unregistration request.
    Unregister,
    /// Unregistration acknowledgement.
    Unregistered,
    /// Outgoing RPC call.
    Call,
    /// Incoming invocation of a registered endpoint.
    Invocation,
    /// Result produced by an invocation.
    Yield,
    /// Call result (possibly one chunk of a progressive result).
    Result,
    /// RPC or protocol error reply.
    Error,
    /// Topic subscription request.
    Subscribe,
    /// Subscription acknowledgement.
    Subscribed,
    /// Topic unsubscription request.
    Unsubscribe,
    /// Unsubscription acknowledgement.
    Unsubscribed,
    /// Event publication (optionally acknowledged).
    Publish,
    /// Publication acknowledgement.
    Published,
    /// Event delivery (possibly a retained event replay).
    Event,
}

/// A decoded WAMP message as handed over by the external serializer.
#[derive(Debug, Clone)]
pub enum Message {
    /// Session opening, client → router.
    Hello {
        /// Realm to join.
        realm: String,
        /// Authentication methods offered, in announcement order.
        authmethods: Vec<String>,
        /// Authentication ID, when any method announces one.
        authid: Option<String>,
        /// Authentication role, when requested.
        authrole: Option<String>,
        /// Merged method-specific extra data.
        authextra: AuthExtra,
    },
    /// Authentication challenge, router → client.
    Challenge {
        /// Selected authentication method.
        method: String,
        /// Method-specific challenge attributes.
        extra: AuthExtra,
    },
    /// Challenge response, client → router.
    Authenticate {
        /// Computed signature.
        signature: String,
        /// Method-specific extra data.
        extra: AuthExtra,
    },
    /// Session established, router → client.
    Welcome {
        /// Assigned session ID.
        session_id: SessionId,
        /// Authenticated ID granted by the router.
        authid: Option<String>,
        /// Role granted by the router.
        authrole: Option<String>,
        /// Authentication method that succeeded.
        authmethod: Option<String>,
        /// Router-supplied extra data (e.g. the SCRAM server signature).
        authextra: AuthExtra,
    },
    /// Handshake rejection, router → client.
    Abort {
        /// Reason URI.
        reason: String,
        /// Optional human-readable message.
        message: Option<String>,
    },
    /// Session close, either direction.
    Goodbye {
        /// Reason URI.
        reason: String,
        /// Optional human-readable message.
        message: Option<String>,
    },
    /// Post-establishment RPC/PubSub record, carried opaquely.
    Traffic {
        /// Record tag.
        kind: TrafficKind,
        /// Serializer-owned payload.
        payload: serde_json::Value,
    },
}

impl Message {
    /// Short tag for logging and protocol errors.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "HELLO",
            Message::Challenge { .. } => "CHALLENGE",
            Message::Authenticate { .. } => "AUTHENTICATE",
            Message::Welcome { .. } => "WELCOME",
            Message::Abort { .. } => "ABORT",
            Message::Goodbye { .. } => "GOODBYE",
            Message::Traffic { .. } => "TRAFFIC",
        }
    }
}

/// Details of an established session, surfaced to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetails {
    /// Router-assigned session ID.
    pub session_id: SessionId,
    /// Realm the session joined.
    pub realm: String,
    /// Authenticated ID granted by the router.
    pub authid: Option<String>,
    /// Role granted by the router.
    pub authrole: Option<String>,
    /// Authentication method that was used.
    pub authmethod: Option<String>,
}
