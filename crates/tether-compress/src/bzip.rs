//! `permessage-bzip2` WebSocket extension.
//!
//! Negotiation covers two parameters: `client_max_compress_level` and
//! `server_max_compress_level`, with the compress level restricted to the
//! closed set 1..=9 (0 encodes "unspecified" and substitutes to 9).
//!
//! bzip2 has no sync-flush primitive, so one compression stream is valid for
//! exactly one message: `end_compress_message` finishes the stream and
//! discards the engine, and the decompressor is likewise discarded at every
//! message boundary. Context never carries over between messages.

use bzip2::{Action, Compression, Status};

use crate::error::CompressError;
use crate::params::{
    ExtensionParams, format_extension, parse_enumerated, require_flag, unique,
};
use crate::EngineState;

/// Name of this WebSocket extension.
pub const EXTENSION_NAME: &str = "permessage-bzip2";

/// Lower bound of the permissible compression level set.
pub const COMPRESS_LEVEL_MIN: u8 = 1;

/// Upper bound of the permissible compression level set, also the default
/// when the level is left unspecified.
pub const COMPRESS_LEVEL_MAX: u8 = 9;

/// Output buffer growth granularity for the streaming engines.
const OUT_CHUNK: usize = 4096;

fn check_compress_level(value: u8) -> Result<(), CompressError> {
    if value == 0 || (COMPRESS_LEVEL_MIN..=COMPRESS_LEVEL_MAX).contains(&value) {
        Ok(())
    } else {
        Err(CompressError::IllegalParameterValue {
            extension: EXTENSION_NAME,
            param: "compress_level".to_string(),
            value: value.to_string(),
        })
    }
}

/// Extension parameters for `permessage-bzip2` offered by a client to a
/// server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bzip2Offer {
    /// Client accepts a server-imposed "maximum compression level" for its
    /// own (client-to-server) direction.
    pub accept_max_compress_level: bool,
    /// Client requests the given server-to-client "maximum compression
    /// level" (0 = no request).
    pub request_max_compress_level: u8,
}

impl Bzip2Offer {
    /// Create an offer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::IllegalParameterValue`] if
    /// `request_max_compress_level` is neither 0 nor within 1..=9.
    pub fn new(
        accept_max_compress_level: bool,
        request_max_compress_level: u8,
    ) -> Result<Self, CompressError> {
        check_compress_level(request_max_compress_level)?;
        Ok(Self {
            accept_max_compress_level,
            request_max_compress_level,
        })
    }

    /// Parse a client offer from the extension parameter multimap.
    ///
    /// # Errors
    ///
    /// Fails on duplicated parameters, unknown parameter names, a valued
    /// `client_max_compress_level` and levels outside 1..=9.
    pub fn parse(params: &ExtensionParams) -> Result<Self, CompressError> {
        let mut accept_max_compress_level = false;
        let mut request_max_compress_level = 0;

        for (param, values) in params {
            let value = unique(EXTENSION_NAME, param, values)?;
            match param.as_str() {
                "client_max_compress_level" => {
                    require_flag(EXTENSION_NAME, param, value)?;
                    accept_max_compress_level = true;
                }
                "server_max_compress_level" => {
                    request_max_compress_level = parse_enumerated(
                        EXTENSION_NAME,
                        param,
                        value,
                        COMPRESS_LEVEL_MIN..=COMPRESS_LEVEL_MAX,
                    )?;
                }
                other => {
                    return Err(CompressError::UnknownParameter {
                        extension: EXTENSION_NAME,
                        param: other.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            accept_max_compress_level,
            request_max_compress_level,
        })
    }

    /// Render the offer as sent in the client's `Sec-WebSocket-Extensions`
    /// header.
    #[must_use]
    pub fn extension_string(&self) -> String {
        let mut params: Vec<(&str, Option<String>)> = Vec::new();
        if self.accept_max_compress_level {
            params.push(("client_max_compress_level", None));
        }
        if self.request_max_compress_level != 0 {
            params.push((
                "server_max_compress_level",
                Some(self.request_max_compress_level.to_string()),
            ));
        }
        format_extension(EXTENSION_NAME, &params)
    }
}

impl Default for Bzip2Offer {
    fn default() -> Self {
        Self {
            accept_max_compress_level: true,
            request_max_compress_level: 0,
        }
    }
}

/// Parameters with which a server accepts a client's `permessage-bzip2`
/// offer.
#[derive(Debug, Clone)]
pub struct Bzip2OfferAccept {
    /// The client offer being accepted.
    pub offer: Bzip2Offer,
    /// Server requests the given client-to-server "maximum compression
    /// level" (0 = no request).
    pub request_max_compress_level: u8,
    /// Override for the server-to-client compress level (must be compatible
    /// with the offer).
    pub compress_level: Option<u8>,
}

impl Bzip2OfferAccept {
    /// Build an accept for `offer`, validating every requested parameter
    /// against what the offer permits.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::IncompatibleAccept`] when the server asks
    /// for a feature the client did not advertise or exceeds a
    /// client-requested maximum.
    pub fn new(
        offer: Bzip2Offer,
        request_max_compress_level: u8,
        compress_level: Option<u8>,
    ) -> Result<Self, CompressError> {
        check_compress_level(request_max_compress_level)?;
        if request_max_compress_level != 0 && !offer.accept_max_compress_level {
            return Err(CompressError::IncompatibleAccept(
                "client does not accept 'max compress level'".to_string(),
            ));
        }
        if let Some(level) = compress_level {
            if !(COMPRESS_LEVEL_MIN..=COMPRESS_LEVEL_MAX).contains(&level) {
                return Err(CompressError::IllegalParameterValue {
                    extension: EXTENSION_NAME,
                    param: "compress_level".to_string(),
                    value: level.to_string(),
                });
            }
            if offer.request_max_compress_level != 0 && level > offer.request_max_compress_level {
                return Err(CompressError::IncompatibleAccept(format!(
                    "client requested a lower maximum compression level ({})",
                    offer.request_max_compress_level
                )));
            }
        }
        Ok(Self {
            offer,
            request_max_compress_level,
            compress_level,
        })
    }

    /// Render the accept as sent in the server's `Sec-WebSocket-Extensions`
    /// response header.
    #[must_use]
    pub fn extension_string(&self) -> String {
        let mut params: Vec<(&str, Option<String>)> = Vec::new();
        if self.offer.request_max_compress_level != 0 {
            params.push((
                "server_max_compress_level",
                Some(self.offer.request_max_compress_level.to_string()),
            ));
        }
        if self.request_max_compress_level != 0 {
            params.push((
                "client_max_compress_level",
                Some(self.request_max_compress_level.to_string()),
            ));
        }
        format_extension(EXTENSION_NAME, &params)
    }
}

/// Accept a client offer with router defaults: no extra requests, no
/// overrides.
#[must_use]
pub fn accept_offer(offer: Bzip2Offer) -> Bzip2OfferAccept {
    Bzip2OfferAccept {
        offer,
        request_max_compress_level: 0,
        compress_level: None,
    }
}

/// Extension parameters responded by a server to a client's offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bzip2Response {
    /// Client-to-server maximum compression level granted by the server
    /// (0 = unspecified).
    pub client_max_compress_level: u8,
    /// Server-to-client maximum compression level the server will use
    /// (0 = unspecified).
    pub server_max_compress_level: u8,
}

impl Bzip2Response {
    /// Parse a server response from the extension parameter multimap.
    ///
    /// # Errors
    ///
    /// Fails on duplicated parameters, unknown parameter names and levels
    /// outside 1..=9.
    pub fn parse(params: &ExtensionParams) -> Result<Self, CompressError> {
        let mut client_max_compress_level = 0;
        let mut server_max_compress_level = 0;

        for (param, values) in params {
            let value = unique(EXTENSION_NAME, param, values)?;
            match param.as_str() {
                "client_max_compress_level" => {
                    client_max_compress_level = parse_enumerated(
                        EXTENSION_NAME,
                        param,
                        value,
                        COMPRESS_LEVEL_MIN..=COMPRESS_LEVEL_MAX,
                    )?;
                }
                "server_max_compress_level" => {
                    server_max_compress_level = parse_enumerated(
                        EXTENSION_NAME,
                        param,
                        value,
                        COMPRESS_LEVEL_MIN..=COMPRESS_LEVEL_MAX,
                    )?;
                }
                other => {
                    return Err(CompressError::UnknownParameter {
                        extension: EXTENSION_NAME,
                        param: other.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            client_max_compress_level,
            server_max_compress_level,
        })
    }
}

/// Parameters with which a client accepts a server's `permessage-bzip2`
/// response.
#[derive(Debug, Clone)]
pub struct Bzip2ResponseAccept {
    /// The server response being accepted.
    pub response: Bzip2Response,
    /// Override for the client-to-server compress level (must be compatible
    /// with the response).
    pub compress_level: Option<u8>,
}

impl Bzip2ResponseAccept {
    /// Build an accept for `response`, validating the override against what
    /// the server granted.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::IncompatibleAccept`] when the override
    /// exceeds a server-granted maximum.
    pub fn new(
        response: Bzip2Response,
        compress_level: Option<u8>,
    ) -> Result<Self, CompressError> {
        if let Some(level) = compress_level {
            if !(COMPRESS_LEVEL_MIN..=COMPRESS_LEVEL_MAX).contains(&level) {
                return Err(CompressError::IllegalParameterValue {
                    extension: EXTENSION_NAME,
                    param: "compress_level".to_string(),
                    value: level.to_string(),
                });
            }
            if response.client_max_compress_level != 0
                && level > response.client_max_compress_level
            {
                return Err(CompressError::IncompatibleAccept(format!(
                    "server granted a lower maximum compression level ({})",
                    response.client_max_compress_level
                )));
            }
        }
        Ok(Self {
            response,
            compress_level,
        })
    }
}

/// `permessage-bzip2` extension processor for one connection.
///
/// One engine is valid for exactly one message: bzip2 cannot flush without
/// closing the stream, so both compressor and decompressor are discarded at
/// every message boundary and rebuilt on the next `start_*` call.
pub struct PerMessageBzip2 {
    is_server: bool,
    /// Server-to-client compression level (unspecified already substituted).
    pub server_max_compress_level: u8,
    /// Client-to-server compression level (unspecified already substituted).
    pub client_max_compress_level: u8,
    compressor: EngineState<bzip2::Compress>,
    decompressor: EngineState<bzip2::Decompress>,
}

impl PerMessageBzip2 {
    /// Build the runtime on the server side from an accepted client offer.
    #[must_use]
    pub fn from_offer_accept(is_server: bool, accept: &Bzip2OfferAccept) -> Self {
        Self::new(
            is_server,
            accept
                .compress_level
                .unwrap_or(accept.offer.request_max_compress_level),
            accept.request_max_compress_level,
        )
    }

    /// Build the runtime on the client side from an accepted server
    /// response.
    #[must_use]
    pub fn from_response_accept(is_server: bool, accept: &Bzip2ResponseAccept) -> Self {
        Self::new(
            is_server,
            accept.response.server_max_compress_level,
            accept
                .compress_level
                .unwrap_or(accept.response.client_max_compress_level),
        )
    }

    fn new(
        is_server: bool,
        server_max_compress_level: u8,
        client_max_compress_level: u8,
    ) -> Self {
        let pmce = Self {
            is_server,
            server_max_compress_level: if server_max_compress_level != 0 {
                server_max_compress_level
            } else {
                COMPRESS_LEVEL_MAX
            },
            client_max_compress_level: if client_max_compress_level != 0 {
                client_max_compress_level
            } else {
                COMPRESS_LEVEL_MAX
            },
            compressor: EngineState::Uninitialized,
            decompressor: EngineState::Uninitialized,
        };
        tracing::debug!(
            extension = EXTENSION_NAME,
            is_server,
            server_max_compress_level = pmce.server_max_compress_level,
            client_max_compress_level = pmce.client_max_compress_level,
            "negotiated per-message compression"
        );
        pmce
    }

    /// Whether this runtime sits on the server side of the connection.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Canonical description of the negotiated configuration, as used in
    /// the HTTP `Sec-WebSocket-Extensions` header.
    #[must_use]
    pub fn extension_string(&self) -> String {
        format_extension(
            EXTENSION_NAME,
            &[
                (
                    "server_max_compress_level",
                    Some(self.server_max_compress_level.to_string()),
                ),
                (
                    "client_max_compress_level",
                    Some(self.client_max_compress_level.to_string()),
                ),
            ],
        )
    }

    fn send_compress_level(&self) -> u8 {
        if self.is_server {
            self.server_max_compress_level
        } else {
            self.client_max_compress_level
        }
    }

    /// Begin an outgoing message, creating a fresh compression stream.
    pub fn start_compress_message(&mut self) {
        if !self.compressor.is_active() {
            self.compressor = EngineState::Active(bzip2::Compress::new(
                Compression::new(u32::from(self.send_compress_level())),
                30,
            ));
        }
    }

    /// Feed a chunk of outgoing payload, returning whatever compressed
    /// bytes the engine produces immediately (may be empty).
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::Backend`] if the bzip2 engine fails, or if
    /// [`Self::start_compress_message`] was not called.
    pub fn compress_message_data(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        let EngineState::Active(engine) = &mut self.compressor else {
            return Err(CompressError::Backend(
                "compress called before start_compress_message".to_string(),
            ));
        };
        drive_compress(engine, data, Action::Run)
    }

    /// Finish an outgoing message: close the stream and discard the engine
    /// (bzip2 has no flush-without-close).
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::Backend`] if the bzip2 engine fails, or if
    /// [`Self::start_compress_message`] was not called.
    pub fn end_compress_message(&mut self) -> Result<Vec<u8>, CompressError> {
        let EngineState::Active(engine) = &mut self.compressor else {
            return Err(CompressError::Backend(
                "end called before start_compress_message".to_string(),
            ));
        };
        let data = drive_compress(engine, &[], Action::Finish);
        self.compressor.discard();
        data
    }

    /// Begin an incoming message, creating a fresh decompression stream.
    pub fn start_decompress_message(&mut self) {
        if !self.decompressor.is_active() {
            self.decompressor = EngineState::Active(bzip2::Decompress::new(false));
        }
    }

    /// Feed a chunk of incoming payload, returning the decompressed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::Backend`] on malformed input (fatal to the
    /// connection) or if [`Self::start_decompress_message`] was not called.
    pub fn decompress_message_data(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        let EngineState::Active(engine) = &mut self.decompressor else {
            return Err(CompressError::Backend(
                "decompress called before start_decompress_message".to_string(),
            ));
        };
        drive_decompress(engine, data)
    }

    /// Finish an incoming message by discarding the decompression stream.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::Backend`] if
    /// [`Self::start_decompress_message`] was not called.
    pub fn end_decompress_message(&mut self) -> Result<(), CompressError> {
        if !self.decompressor.is_active() {
            return Err(CompressError::Backend(
                "end called before start_decompress_message".to_string(),
            ));
        }
        self.decompressor.discard();
        Ok(())
    }
}

fn drive_compress(
    engine: &mut bzip2::Compress,
    input: &[u8],
    action: Action,
) -> Result<Vec<u8>, CompressError> {
    let mut output = Vec::with_capacity(OUT_CHUNK);
    let mut consumed = 0usize;
    loop {
        output.reserve(OUT_CHUNK);
        let before = engine.total_in();
        let status = engine.compress_vec(&input[consumed..], &mut output, action)?;
        consumed += (engine.total_in() - before) as usize;
        match status {
            Status::StreamEnd => break,
            _ => {
                if matches!(action, Action::Run)
                    && consumed >= input.len()
                    && output.len() < output.capacity()
                {
                    break;
                }
            }
        }
    }
    Ok(output)
}

fn drive_decompress(
    engine: &mut bzip2::Decompress,
    input: &[u8],
) -> Result<Vec<u8>, CompressError> {
    let mut output = Vec::with_capacity(OUT_CHUNK);
    let mut consumed = 0usize;
    loop {
        output.reserve(OUT_CHUNK);
        let before = engine.total_in();
        let status = engine.decompress_vec(&input[consumed..], &mut output)?;
        consumed += (engine.total_in() - before) as usize;
        match status {
            Status::StreamEnd => break,
            _ => {
                if consumed >= input.len() && output.len() < output.capacity() {
                    break;
                }
            }
        }
    }
    Ok(output)
}
