//! Fuzz the SCRAM challenge attribute handling: arbitrary JSON challenge
//! extras must be rejected cleanly, never panic the authenticator.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_auth::{AuthConfig, AuthRegistry, Challenge, SessionBinding};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let serde_json::Value::Object(extra) = value else {
        return;
    };
    // keep fuzz iterations fast: cap the KDF work the input can request
    for knob in ["iterations", "memory"] {
        if let Some(n) = extra.get(knob).and_then(serde_json::Value::as_u64) {
            if n > 4096 {
                return;
            }
        }
    }

    let registry = AuthRegistry::with_defaults();
    let config = AuthConfig {
        authid: Some("fuzz".to_string()),
        password: Some("fuzz-password".to_string()),
        ..AuthConfig::default()
    };
    let mut auth = registry.create("scram", &config).unwrap();
    let _ = auth.authextra();
    let _ = auth.on_challenge(&SessionBinding::default(), &Challenge::new("scram", extra));
});
