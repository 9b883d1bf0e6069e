//! # TETHER Auth
//!
//! Challenge-response authentication for the TETHER protocol.
//!
//! This crate provides:
//! - The closed [`Authenticator`] set: Anonymous, Ticket, WAMP-CRA,
//!   CryptoSign (Ed25519) and WAMP-SCRAM, each implementing the two-step
//!   `authextra` / `on_challenge` / `on_welcome` contract
//! - An explicit [`AuthRegistry`] mapping method names (including proxy
//!   name tags) to authenticator constructors
//! - Key derivation: PBKDF2 (SHA-1/SHA-256) and Argon2id-13 with the fixed
//!   WAMP-SCRAM parameter profile
//! - Legacy tooling primitives: TOTP (RFC 6238 style) and WAMP-CRA secret
//!   generation/signing with byte-exact reference vectors
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm |
//! |----------|-----------|
//! | Challenge signing (CRA) | HMAC-SHA256 |
//! | Salted secrets (CRA) | PBKDF2-HMAC-SHA256 |
//! | Salted passwords (SCRAM) | Argon2id v19 or PBKDF2-HMAC-SHA256 |
//! | Public-key auth | Ed25519 |
//! | One-time codes | HMAC-SHA1 / 30 s step |
//!
//! All authenticator calls are synchronous pure functions over their
//! inputs; the SCRAM Argon2id derivation is CPU-bound and callers on a
//! single-threaded runtime should treat `on_challenge` as blocking.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod authenticator;
pub mod challenge;
pub mod cra;
pub mod cryptosign;
pub mod error;
pub mod kdf;
pub mod registry;
pub mod scram;
pub mod totp;

pub use authenticator::Authenticator;
pub use challenge::{AuthExtra, Challenge, SessionBinding};
pub use error::AuthError;
pub use registry::{AuthConfig, AuthRegistry};

/// Size of the random client nonce attached to SCRAM HELLOs, in bytes.
pub const SCRAM_NONCE_SIZE: usize = 16;

/// Ed25519 private key size accepted by CryptoSign configuration.
pub const CRYPTOSIGN_PRIVKEY_SIZE: usize = 32;

/// Size of the raw CryptoSign challenge value.
pub const CRYPTOSIGN_CHALLENGE_SIZE: usize = 32;
