//! Compression negotiation and runtime error types.

use thiserror::Error;

/// Errors raised while negotiating or running a per-message compression
/// extension.
///
/// Every variant is a transport-establishment failure: a connection that
/// hits one of these during the WebSocket handshake must not proceed to the
/// WAMP handshake, and a mid-stream runtime failure is fatal to the
/// connection (there is no resync).
#[derive(Debug, Error)]
pub enum CompressError {
    /// An extension parameter occurred more than once.
    #[error("multiple occurrence of extension parameter '{param}' for extension '{extension}'")]
    DuplicateParameter {
        /// Extension name
        extension: &'static str,
        /// Offending parameter name
        param: String,
    },

    /// An extension parameter name is not part of the extension's grammar.
    #[error("illegal extension parameter '{param}' for extension '{extension}'")]
    UnknownParameter {
        /// Extension name
        extension: &'static str,
        /// Offending parameter name
        param: String,
    },

    /// An extension parameter carried a value outside its closed permissible set.
    #[error("illegal value '{value}' for parameter '{param}' of extension '{extension}'")]
    IllegalParameterValue {
        /// Extension name
        extension: &'static str,
        /// Parameter name
        param: String,
        /// Offending raw value ("<flag>" when a bare flag was given where a value is required)
        value: String,
    },

    /// An accept stage requested something the corresponding offer/response
    /// does not permit.
    #[error("incompatible accept: {0}")]
    IncompatibleAccept(String),

    /// An extension string could not be tokenized.
    #[error("malformed extension string: {0}")]
    MalformedExtension(String),

    /// The underlying compression backend reported an error.
    #[error("compression backend error: {0}")]
    Backend(String),
}

impl From<flate2::CompressError> for CompressError {
    fn from(e: flate2::CompressError) -> Self {
        CompressError::Backend(e.to_string())
    }
}

impl From<flate2::DecompressError> for CompressError {
    fn from(e: flate2::DecompressError) -> Self {
        CompressError::Backend(e.to_string())
    }
}

impl From<bzip2::Error> for CompressError {
    fn from(e: bzip2::Error) -> Self {
        CompressError::Backend(e.to_string())
    }
}
