//! # TETHER Compress
//!
//! WebSocket per-message compression extensions for the TETHER protocol.
//!
//! This crate provides:
//! - `permessage-deflate` offer/response negotiation and a stateful
//!   compress/decompress runtime (RFC 7692 style, sync-flush with tail strip)
//! - `permessage-bzip2` negotiation and runtime (one stream per message)
//! - Strict extension parameter grammar validation
//!
//! ## Negotiation Model
//!
//! Each extension goes through four stages:
//!
//! | Stage | Produced by | From |
//! |-------|-------------|------|
//! | Offer | client | local configuration |
//! | OfferAccept | server | a parsed client offer |
//! | Response | client | parsed server header parameters |
//! | ResponseAccept | client | a parsed server response |
//!
//! A runtime ([`deflate::PerMessageDeflate`] or [`bzip::PerMessageBzip2`]) is
//! created once per connection from the terminal accept stage and owns the
//! per-direction compression engines for the lifetime of that connection.
//!
//! Parameter parsing is strict: duplicated parameters, unknown parameters and
//! values outside the closed permissible sets are negotiation failures, never
//! silently defaulted.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod bzip;
pub mod deflate;
pub mod error;
pub mod params;

pub use error::CompressError;

/// Per-direction compression engine state.
///
/// Engines are created on first use and re-created at message boundaries
/// exactly when "no context takeover" is negotiated for that direction
/// (deflate) or unconditionally (bzip2, which has no sync-flush primitive).
/// There is no other path that replaces an engine.
#[derive(Debug, Default)]
pub enum EngineState<T> {
    /// No engine exists yet for this direction.
    #[default]
    Uninitialized,
    /// An engine is live and may carry dictionary state across messages.
    Active(T),
}

impl<T> EngineState<T> {
    /// Discard the current engine, returning the state to [`EngineState::Uninitialized`].
    pub fn discard(&mut self) {
        *self = EngineState::Uninitialized;
    }

    /// Whether an engine is currently live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, EngineState::Active(_))
    }
}
