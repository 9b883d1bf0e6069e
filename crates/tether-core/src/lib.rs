//! # TETHER Core
//!
//! Core protocol implementation for the TETHER WAMP client stack.
//!
//! This crate provides:
//! - The session protocol state machine (HELLO → CHALLENGE → AUTHENTICATE →
//!   WELCOME/ABORT, then ordered RPC/PubSub traffic dispatch)
//! - The connection supervisor: multi-transport round-robin retry with
//!   jittered exponential backoff and permanent-failure latching
//! - The configuration surface (transports, realm, authentication map,
//!   retry tuning) with up-front validation
//!
//! The actual socket/TLS transport, the HTTP upgrade handshake and the WAMP
//! wire serializer are external collaborators: the supervisor reaches them
//! through the [`supervisor::Connector`] seam and the session consumes
//! already-decoded [`message::Message`] records.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use config::{ConnectionConfig, RetryConfig, TransportConfig, TransportKind};
pub use error::{ConfigError, ConnectError, ProtocolError};
pub use message::{Message, SessionDetails};
pub use session::{Session, SessionEvent, SessionState};
pub use supervisor::{AttemptOutcome, Completion, ConnectionSupervisor, Connector};
pub use transport::Transport;
