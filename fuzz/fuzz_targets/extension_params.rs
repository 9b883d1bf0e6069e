//! Fuzz the extension string tokenizer and both extension parameter
//! grammars: parsing must never panic, and anything that parses must
//! round-trip through its canonical string form.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_compress::bzip::{Bzip2Offer, Bzip2Response};
use tether_compress::deflate::{DeflateOffer, DeflateResponse};
use tether_compress::params::parse_extension_string;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok((_, params)) = parse_extension_string(input) else {
        return;
    };

    if let Ok(offer) = DeflateOffer::parse(&params) {
        let (_, reparsed) = parse_extension_string(&offer.extension_string()).unwrap();
        assert_eq!(DeflateOffer::parse(&reparsed).unwrap(), offer);
    }
    let _ = DeflateResponse::parse(&params);

    if let Ok(offer) = Bzip2Offer::parse(&params) {
        let (_, reparsed) = parse_extension_string(&offer.extension_string()).unwrap();
        assert_eq!(Bzip2Offer::parse(&reparsed).unwrap(), offer);
    }
    let _ = Bzip2Response::parse(&params);
});
