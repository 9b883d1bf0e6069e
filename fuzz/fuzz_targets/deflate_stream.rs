//! Feed arbitrary bytes into the deflate decompression path: malformed
//! input must surface as an error, never as a panic or hang.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_compress::deflate::{DeflateResponse, DeflateResponseAccept, PerMessageDeflate};
use tether_compress::params::ExtensionParams;

fuzz_target!(|data: &[u8]| {
    let response = DeflateResponse::parse(&ExtensionParams::new()).unwrap();
    let accept = DeflateResponseAccept::new(response, None, None).unwrap();
    let mut pmce = PerMessageDeflate::from_response_accept(false, &accept);

    pmce.start_decompress_message();
    for chunk in data.chunks(257) {
        if pmce.decompress_message_data(chunk).is_err() {
            return;
        }
    }
    let _ = pmce.end_decompress_message();
});
