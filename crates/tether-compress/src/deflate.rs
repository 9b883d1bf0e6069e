//! `permessage-deflate` WebSocket extension.
//!
//! Negotiation covers four parameters (RFC 7692 grammar):
//! `client_no_context_takeover`, `server_no_context_takeover`,
//! `client_max_window_bits`, `server_max_window_bits`. Window bits are
//! restricted to the closed set 8..=15; 0 encodes "unspecified" and is
//! substituted with the maximum window size when the runtime is built.
//!
//! The runtime compresses with raw deflate and a sync flush per message,
//! stripping the trailing `00 00 FF FF` empty-block marker before
//! transmission; the receiving side re-injects the marker to complete the
//! virtual block.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::CompressError;
use crate::params::{
    ExtensionParams, ParamValue, format_extension, parse_enumerated, require_flag, unique,
};
use crate::EngineState;

/// Name of this WebSocket extension.
pub const EXTENSION_NAME: &str = "permessage-deflate";

/// Permissible window size parameter values (base-2 logarithm of the LZ77
/// sliding window). Higher values use more memory but compress better.
pub const WINDOW_BITS_MIN: u8 = 8;

/// Upper bound of the permissible window size set, also the default when a
/// window size is left unspecified.
pub const WINDOW_BITS_MAX: u8 = 15;

/// Trailing bytes of a deflate sync flush (the empty stored block marker).
const SYNC_TAIL: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Output buffer growth granularity for the streaming engines.
const OUT_CHUNK: usize = 4096;

fn check_window_bits(value: u8) -> Result<(), CompressError> {
    if value == 0 || (WINDOW_BITS_MIN..=WINDOW_BITS_MAX).contains(&value) {
        Ok(())
    } else {
        Err(CompressError::IllegalParameterValue {
            extension: EXTENSION_NAME,
            param: "window_bits".to_string(),
            value: value.to_string(),
        })
    }
}

/// Extension parameters for `permessage-deflate` offered by a client to a
/// server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeflateOffer {
    /// Client accepts the "no context takeover" feature for its own
    /// (client-to-server) direction.
    pub accept_no_context_takeover: bool,
    /// Client accepts a server-imposed "max window size" for its own
    /// direction.
    pub accept_max_window_bits: bool,
    /// Client requests the "no context takeover" feature for the
    /// server-to-client direction.
    pub request_no_context_takeover: bool,
    /// Client requests the given server-to-client "max window size"
    /// (0 = no request).
    pub request_max_window_bits: u8,
}

impl DeflateOffer {
    /// Create an offer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::IllegalParameterValue`] if
    /// `request_max_window_bits` is neither 0 nor within 8..=15.
    pub fn new(
        accept_no_context_takeover: bool,
        accept_max_window_bits: bool,
        request_no_context_takeover: bool,
        request_max_window_bits: u8,
    ) -> Result<Self, CompressError> {
        check_window_bits(request_max_window_bits)?;
        Ok(Self {
            accept_no_context_takeover,
            accept_max_window_bits,
            request_no_context_takeover,
            request_max_window_bits,
        })
    }

    /// Parse a client offer from the extension parameter multimap.
    ///
    /// # Errors
    ///
    /// Fails on duplicated parameters, unknown parameter names, non-flag
    /// values for flag parameters and window bits outside 8..=15.
    pub fn parse(params: &ExtensionParams) -> Result<Self, CompressError> {
        let mut accept_max_window_bits = false;
        let mut accept_no_context_takeover = true;
        let mut request_max_window_bits = 0;
        let mut request_no_context_takeover = false;

        for (param, values) in params {
            let value = unique(EXTENSION_NAME, param, values)?;
            match param.as_str() {
                "client_max_window_bits" => {
                    // the client may attach a hint value; only its presence
                    // is recorded for the offer
                    if let ParamValue::Value(_) = value {
                        parse_enumerated(
                            EXTENSION_NAME,
                            param,
                            value,
                            WINDOW_BITS_MIN..=WINDOW_BITS_MAX,
                        )?;
                    }
                    accept_max_window_bits = true;
                }
                "client_no_context_takeover" => {
                    require_flag(EXTENSION_NAME, param, value)?;
                    accept_no_context_takeover = true;
                }
                "server_max_window_bits" => {
                    request_max_window_bits = parse_enumerated(
                        EXTENSION_NAME,
                        param,
                        value,
                        WINDOW_BITS_MIN..=WINDOW_BITS_MAX,
                    )?;
                }
                "server_no_context_takeover" => {
                    require_flag(EXTENSION_NAME, param, value)?;
                    request_no_context_takeover = true;
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
            accept_no_context_takeover,
            accept_max_window_bits,
            request_no_context_takeover,
            request_max_window_bits,
        })
    }

    /// Render the offer as sent in the client's `Sec-WebSocket-Extensions`
    /// header.
    #[must_use]
    pub fn extension_string(&self) -> String {
        let mut params: Vec<(&str, Option<String>)> = Vec::new();
        if self.accept_no_context_takeover {
            params.push(("client_no_context_takeover", None));
        }
        if self.accept_max_window_bits {
            params.push(("client_max_window_bits", None));
        }
        if self.request_no_context_takeover {
            params.push(("server_no_context_takeover", None));
        }
        if self.request_max_window_bits != 0 {
            params.push((
                "server_max_window_bits",
                Some(self.request_max_window_bits.to_string()),
            ));
        }
        format_extension(EXTENSION_NAME, &params)
    }
}

impl Default for DeflateOffer {
    fn default() -> Self {
        Self {
            accept_no_context_takeover: true,
            accept_max_window_bits: true,
            request_no_context_takeover: false,
            request_max_window_bits: 0,
        }
    }
}

/// Parameters with which a server accepts a client's `permessage-deflate`
/// offer.
#[derive(Debug, Clone)]
pub struct DeflateOfferAccept {
    /// The client offer being accepted.
    pub offer: DeflateOffer,
    /// Server requests "no context takeover" for the client-to-server
    /// direction.
    pub request_no_context_takeover: bool,
    /// Server requests the given client-to-server "max window size"
    /// (0 = no request).
    pub request_max_window_bits: u8,
    /// Override for the server-to-client "no context takeover"
    /// (must be compatible with the offer).
    pub no_context_takeover: Option<bool>,
    /// Override for the server-to-client window size (must be compatible
    /// with the offer).
    pub window_bits: Option<u8>,
}

impl DeflateOfferAccept {
    /// Build an accept for `offer`, validating every requested parameter
    /// against what the offer permits.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::IncompatibleAccept`] when the server asks
    /// for a feature the client did not advertise, or picks values the
    /// client constrained more tightly.
    pub fn new(
        offer: DeflateOffer,
        request_no_context_takeover: bool,
        request_max_window_bits: u8,
        no_context_takeover: Option<bool>,
        window_bits: Option<u8>,
    ) -> Result<Self, CompressError> {
        if request_no_context_takeover && !offer.accept_no_context_takeover {
            return Err(CompressError::IncompatibleAccept(
                "client does not accept 'no context takeover'".to_string(),
            ));
        }
        check_window_bits(request_max_window_bits)?;
        if request_max_window_bits != 0 && !offer.accept_max_window_bits {
            return Err(CompressError::IncompatibleAccept(
                "client does not accept 'max window bits'".to_string(),
            ));
        }
        if let Some(takeover) = no_context_takeover {
            if offer.request_no_context_takeover && !takeover {
                return Err(CompressError::IncompatibleAccept(
                    "client requested 'no context takeover'".to_string(),
                ));
            }
        }
        if let Some(bits) = window_bits {
            if !(WINDOW_BITS_MIN..=WINDOW_BITS_MAX).contains(&bits) {
                return Err(CompressError::IllegalParameterValue {
                    extension: EXTENSION_NAME,
                    param: "window_bits".to_string(),
                    value: bits.to_string(),
                });
            }
            if offer.request_max_window_bits != 0 && bits > offer.request_max_window_bits {
                return Err(CompressError::IncompatibleAccept(format!(
                    "client requested a lower maximum window size ({})",
                    offer.request_max_window_bits
                )));
            }
        }
        Ok(Self {
            offer,
            request_no_context_takeover,
            request_max_window_bits,
            no_context_takeover,
            window_bits,
        })
    }

    /// Render the accept as sent in the server's `Sec-WebSocket-Extensions`
    /// response header.
    #[must_use]
    pub fn extension_string(&self) -> String {
        let mut params: Vec<(&str, Option<String>)> = Vec::new();
        if self.offer.request_no_context_takeover {
            params.push(("server_no_context_takeover", None));
        }
        if self.offer.request_max_window_bits != 0 {
            params.push((
                "server_max_window_bits",
                Some(self.offer.request_max_window_bits.to_string()),
            ));
        }
        if self.request_no_context_takeover {
            params.push(("client_no_context_takeover", None));
        }
        if self.request_max_window_bits != 0 {
            params.push((
                "client_max_window_bits",
                Some(self.request_max_window_bits.to_string()),
            ));
        }
        format_extension(EXTENSION_NAME, &params)
    }
}

/// Accept a client offer with router defaults: no extra requests, no
/// overrides.
#[must_use]
pub fn accept_offer(offer: DeflateOffer) -> DeflateOfferAccept {
    DeflateOfferAccept {
        offer,
        request_no_context_takeover: false,
        request_max_window_bits: 0,
        no_context_takeover: None,
        window_bits: None,
    }
}

/// Extension parameters responded by a server to a client's offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeflateResponse {
    /// Client-to-server maximum window size granted by the server
    /// (0 = unspecified).
    pub client_max_window_bits: u8,
    /// Client-to-server "no context takeover" requested by the server.
    pub client_no_context_takeover: bool,
    /// Server-to-client maximum window size the server will use
    /// (0 = unspecified).
    pub server_max_window_bits: u8,
    /// Server-to-client "no context takeover" the server will apply.
    pub server_no_context_takeover: bool,
}

impl DeflateResponse {
    /// Parse a server response from the extension parameter multimap.
    ///
    /// # Errors
    ///
    /// Fails on duplicated parameters, unknown parameter names, non-flag
    /// values for flag parameters and window bits outside 8..=15.
    pub fn parse(params: &ExtensionParams) -> Result<Self, CompressError> {
        let mut client_max_window_bits = 0;
        let mut client_no_context_takeover = false;
        let mut server_max_window_bits = 0;
        let mut server_no_context_takeover = false;

        for (param, values) in params {
            let value = unique(EXTENSION_NAME, param, values)?;
            match param.as_str() {
                "client_max_window_bits" => {
                    client_max_window_bits = parse_enumerated(
                        EXTENSION_NAME,
                        param,
                        value,
                        WINDOW_BITS_MIN..=WINDOW_BITS_MAX,
                    )?;
                }
                "client_no_context_takeover" => {
                    require_flag(EXTENSION_NAME, param, value)?;
                    client_no_context_takeover = true;
                }
                "server_max_window_bits" => {
                    server_max_window_bits = parse_enumerated(
                        EXTENSION_NAME,
                        param,
                        value,
                        WINDOW_BITS_MIN..=WINDOW_BITS_MAX,
                    )?;
                }
                "server_no_context_takeover" => {
                    require_flag(EXTENSION_NAME, param, value)?;
                    server_no_context_takeover = true;
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
            client_max_window_bits,
            client_no_context_takeover,
            server_max_window_bits,
            server_no_context_takeover,
        })
    }
}

/// Parameters with which a client accepts a server's `permessage-deflate`
/// response.
#[derive(Debug, Clone)]
pub struct DeflateResponseAccept {
    /// The server response being accepted.
    pub response: DeflateResponse,
    /// Override for the client-to-server "no context takeover" (must be
    /// compatible with the response).
    pub no_context_takeover: Option<bool>,
    /// Override for the client-to-server window size (must be compatible
    /// with the response).
    pub window_bits: Option<u8>,
}

impl DeflateResponseAccept {
    /// Build an accept for `response`, validating overrides against what
    /// the server granted.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::IncompatibleAccept`] when an override
    /// contradicts a server-requested feature or exceeds a server-granted
    /// maximum.
    pub fn new(
        response: DeflateResponse,
        no_context_takeover: Option<bool>,
        window_bits: Option<u8>,
    ) -> Result<Self, CompressError> {
        if let Some(takeover) = no_context_takeover {
            if response.client_no_context_takeover && !takeover {
                return Err(CompressError::IncompatibleAccept(
                    "server requested 'no context takeover'".to_string(),
                ));
            }
        }
        if let Some(bits) = window_bits {
            if !(WINDOW_BITS_MIN..=WINDOW_BITS_MAX).contains(&bits) {
                return Err(CompressError::IllegalParameterValue {
                    extension: EXTENSION_NAME,
                    param: "window_bits".to_string(),
                    value: bits.to_string(),
                });
            }
            if response.client_max_window_bits != 0 && bits > response.client_max_window_bits {
                return Err(CompressError::IncompatibleAccept(format!(
                    "server granted a lower maximum window size ({})",
                    response.client_max_window_bits
                )));
            }
        }
        Ok(Self {
            response,
            no_context_takeover,
            window_bits,
        })
    }
}

/// `permessage-deflate` extension processor for one connection.
///
/// Owns the per-direction compression engines. Engines are created lazily on
/// the first message and re-created at message boundaries exactly when
/// "no context takeover" is negotiated for that direction; otherwise the
/// LZ77 window carries over between messages, which the peer relies on.
pub struct PerMessageDeflate {
    is_server: bool,
    /// Server-to-client "no context takeover".
    pub server_no_context_takeover: bool,
    /// Client-to-server "no context takeover".
    pub client_no_context_takeover: bool,
    /// Server-to-client window bits (unspecified already substituted).
    pub server_max_window_bits: u8,
    /// Client-to-server window bits (unspecified already substituted).
    pub client_max_window_bits: u8,
    compressor: EngineState<Compress>,
    decompressor: EngineState<Decompress>,
}

impl PerMessageDeflate {
    /// Build the runtime on the server side from an accepted client offer.
    #[must_use]
    pub fn from_offer_accept(is_server: bool, accept: &DeflateOfferAccept) -> Self {
        Self::new(
            is_server,
            accept
                .no_context_takeover
                .unwrap_or(accept.offer.request_no_context_takeover),
            accept.request_no_context_takeover,
            accept.window_bits.unwrap_or(accept.offer.request_max_window_bits),
            accept.request_max_window_bits,
        )
    }

    /// Build the runtime on the client side from an accepted server
    /// response.
    #[must_use]
    pub fn from_response_accept(is_server: bool, accept: &DeflateResponseAccept) -> Self {
        Self::new(
            is_server,
            accept.response.server_no_context_takeover,
            accept
                .no_context_takeover
                .unwrap_or(accept.response.client_no_context_takeover),
            accept.response.server_max_window_bits,
            accept.window_bits.unwrap_or(accept.response.client_max_window_bits),
        )
    }

    fn new(
        is_server: bool,
        server_no_context_takeover: bool,
        client_no_context_takeover: bool,
        server_max_window_bits: u8,
        client_max_window_bits: u8,
    ) -> Self {
        let pmce = Self {
            is_server,
            server_no_context_takeover,
            client_no_context_takeover,
            server_max_window_bits: if server_max_window_bits != 0 {
                server_max_window_bits
            } else {
                WINDOW_BITS_MAX
            },
            client_max_window_bits: if client_max_window_bits != 0 {
                client_max_window_bits
            } else {
                WINDOW_BITS_MAX
            },
            compressor: EngineState::Uninitialized,
            decompressor: EngineState::Uninitialized,
        };
        tracing::debug!(
            extension = EXTENSION_NAME,
            is_server,
            server_no_context_takeover,
            client_no_context_takeover,
            server_max_window_bits = pmce.server_max_window_bits,
            client_max_window_bits = pmce.client_max_window_bits,
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
        let mut params: Vec<(&str, Option<String>)> = Vec::new();
        if self.server_no_context_takeover {
            params.push(("server_no_context_takeover", None));
        }
        if self.client_no_context_takeover {
            params.push(("client_no_context_takeover", None));
        }
        params.push((
            "server_max_window_bits",
            Some(self.server_max_window_bits.to_string()),
        ));
        params.push((
            "client_max_window_bits",
            Some(self.client_max_window_bits.to_string()),
        ));
        format_extension(EXTENSION_NAME, &params)
    }

    fn send_no_context_takeover(&self) -> bool {
        if self.is_server {
            self.server_no_context_takeover
        } else {
            self.client_no_context_takeover
        }
    }

    fn send_window_bits(&self) -> u8 {
        if self.is_server {
            self.server_max_window_bits
        } else {
            self.client_max_window_bits
        }
    }

    fn recv_no_context_takeover(&self) -> bool {
        if self.is_server {
            self.client_no_context_takeover
        } else {
            self.server_no_context_takeover
        }
    }

    fn recv_window_bits(&self) -> u8 {
        if self.is_server {
            self.client_max_window_bits
        } else {
            self.server_max_window_bits
        }
    }

    /// Begin an outgoing message. Must be called once per message, before
    /// any payload data is fed.
    pub fn start_compress_message(&mut self) {
        if !self.compressor.is_active() || self.send_no_context_takeover() {
            // zlib cannot emit raw streams with an 8-bit window and promotes
            // 8 to 9 internally; mirror that here to satisfy the engine API
            let bits = self.send_window_bits().max(9);
            self.compressor = EngineState::Active(Compress::new_with_window_bits(
                Compression::default(),
                false,
                bits,
            ));
        }
    }

    /// Feed a chunk of outgoing payload, returning whatever compressed
    /// bytes the engine flushes immediately (may be empty).
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::Backend`] if the deflate engine fails, or
    /// if [`Self::start_compress_message`] was not called.
    pub fn compress_message_data(&mut self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        let EngineState::Active(engine) = &mut self.compressor else {
            return Err(CompressError::Backend(
                "compress called before start_compress_message".to_string(),
            ));
        };
        drive_deflate(engine, data, FlushCompress::None)
    }

    /// Finish an outgoing message: sync-flush the engine and strip the
    /// trailing `00 00 FF FF` marker (the peer re-synthesizes it).
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::Backend`] if the deflate engine fails, or
    /// if [`Self::start_compress_message`] was not called.
    pub fn end_compress_message(&mut self) -> Result<Vec<u8>, CompressError> {
        let EngineState::Active(engine) = &mut self.compressor else {
            return Err(CompressError::Backend(
                "end called before start_compress_message".to_string(),
            ));
        };
        let mut data = drive_deflate(engine, &[], FlushCompress::Sync)?;
        if !data.ends_with(&SYNC_TAIL) {
            return Err(CompressError::Backend(
                "sync flush did not terminate with the empty-block marker".to_string(),
            ));
        }
        data.truncate(data.len() - SYNC_TAIL.len());
        Ok(data)
    }

    /// Begin an incoming message. Must be called once per message, before
    /// any payload data is fed.
    pub fn start_decompress_message(&mut self) {
        if !self.decompressor.is_active() || self.recv_no_context_takeover() {
            let bits = self.recv_window_bits().max(9);
            self.decompressor =
                EngineState::Active(Decompress::new_with_window_bits(false, bits));
        }
    }

    /// Feed a chunk of incoming payload, returning the inflated bytes.
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
        drive_inflate(engine, data)
    }

    /// Finish an incoming message by feeding the `00 00 FF FF` marker the
    /// sender stripped, completing the virtual empty block.
    ///
    /// # Errors
    ///
    /// Returns [`CompressError::Backend`] on malformed input or if
    /// [`Self::start_decompress_message`] was not called.
    pub fn end_decompress_message(&mut self) -> Result<(), CompressError> {
        let EngineState::Active(engine) = &mut self.decompressor else {
            return Err(CompressError::Backend(
                "end called before start_decompress_message".to_string(),
            ));
        };
        // the empty block carries no payload
        drive_inflate(engine, &SYNC_TAIL).map(drop)
    }
}

fn drive_deflate(
    engine: &mut Compress,
    input: &[u8],
    flush: FlushCompress,
) -> Result<Vec<u8>, CompressError> {
    let mut output = Vec::with_capacity(OUT_CHUNK);
    let mut consumed = 0usize;
    loop {
        output.reserve(OUT_CHUNK);
        let before = engine.total_in();
        let status = engine.compress_vec(&input[consumed..], &mut output, flush)?;
        consumed += (engine.total_in() - before) as usize;
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if consumed >= input.len() && output.len() < output.capacity() {
                    break;
                }
            }
        }
    }
    Ok(output)
}

fn drive_inflate(engine: &mut Decompress, input: &[u8]) -> Result<Vec<u8>, CompressError> {
    let mut output = Vec::with_capacity(OUT_CHUNK);
    let mut consumed = 0usize;
    loop {
        output.reserve(OUT_CHUNK);
        let before = engine.total_in();
        let status = engine.decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)?;
        consumed += (engine.total_in() - before) as usize;
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if consumed >= input.len() && output.len() < output.capacity() {
                    break;
                }
            }
        }
    }
    Ok(output)
}
