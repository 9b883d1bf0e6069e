//! End-to-end tests across the TETHER crates: scripted router handshakes,
//! negotiated compression pipelines and the supervisor retry loop.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tether_auth::kdf::derive_key;
use tether_auth::totp::compute_wcs;
use tether_auth::{AuthConfig, AuthExtra};
use tether_compress::bzip::{self, Bzip2Offer, PerMessageBzip2};
use tether_compress::deflate::DeflateOffer;
use tether_core::config::{
    AuthMethodConfig, ConnectionConfig, RetryConfig, TransportConfig, TransportKind,
};
use tether_core::error::ConnectError;
use tether_core::message::{Message, TrafficKind};
use tether_core::session::SessionEvent;
use tether_core::supervisor::{AttemptOutcome, Completion, ConnectionSupervisor, Connector};
use tether_integration_tests::{
    ScramRouter, authenticator, deflate_message, expect_send, inflate_message,
    negotiated_deflate_pair, started_session,
};

fn welcome(session_id: u64, authmethod: &str, authextra: AuthExtra) -> Message {
    Message::Welcome {
        session_id,
        authid: Some("client01".to_string()),
        authrole: Some("frontend".to_string()),
        authmethod: Some(authmethod.to_string()),
        authextra,
    }
}

#[test]
fn cra_handshake_against_scripted_router() {
    let secret = "L3L1YUE8Txlw";
    let config = AuthConfig {
        authid: Some("client01".to_string()),
        secret: Some(secret.to_string()),
        ..AuthConfig::default()
    };
    let (mut session, hello) = started_session("realm1", vec![authenticator("wampcra", config)]);

    let Message::Hello {
        realm, authmethods, ..
    } = hello
    else {
        panic!("expected HELLO")
    };
    assert_eq!(realm, "realm1");
    assert_eq!(authmethods, ["wampcra"]);

    // router issues a salted challenge
    let challenge_json = r#"{"authid": "client01", "session": 2061}"#;
    let serde_json::Value::Object(extra) = json!({
        "challenge": challenge_json,
        "salt": "pepper-mill",
        "iterations": 500,
        "keylen": 32,
    }) else {
        unreachable!()
    };
    let events = session
        .on_message(Message::Challenge {
            method: "wampcra".to_string(),
            extra,
        })
        .unwrap();
    let Message::Authenticate { signature, .. } = expect_send(events) else {
        panic!("expected AUTHENTICATE")
    };

    // router verifies against its own derivation
    let expected_key = derive_key(secret.as_bytes(), b"pepper-mill", Some(500), Some(32)).unwrap();
    let expected = compute_wcs(expected_key.as_bytes(), challenge_json.as_bytes()).unwrap();
    assert_eq!(signature, expected);

    let events = session
        .on_message(welcome(2061, "wampcra", AuthExtra::new()))
        .unwrap();
    let [SessionEvent::Established(details)] = &events[..] else {
        panic!("expected establishment")
    };
    assert_eq!(details.session_id, 2061);
    assert_eq!(details.authmethod.as_deref(), Some("wampcra"));
}

#[test]
fn scram_handshake_is_mutually_authenticated() {
    let mut router = ScramRouter::provision("alice", "correct horse battery staple");

    let config = AuthConfig {
        authid: Some("alice".to_string()),
        password: Some("correct horse battery staple".to_string()),
        ..AuthConfig::default()
    };
    let (mut session, hello) = started_session("realm1", vec![authenticator("scram", config)]);

    let Message::Hello { authextra, .. } = hello else {
        panic!("expected HELLO")
    };
    let client_nonce = authextra["nonce"].as_str().unwrap().to_string();

    let events = session
        .on_message(Message::Challenge {
            method: "scram".to_string(),
            extra: router.challenge_extra("alice", &client_nonce),
        })
        .unwrap();
    let Message::Authenticate { signature, .. } = expect_send(events) else {
        panic!("expected AUTHENTICATE")
    };

    // the router can verify the proof with only the stored credential
    assert!(router.verify_client_proof(&signature));

    // and the client only accepts a WELCOME carrying a valid server
    // signature
    let events = session
        .on_message(welcome(77, "scram", router.welcome_extra()))
        .unwrap();
    assert!(matches!(&events[..], [SessionEvent::Established(_)]));
}

#[test]
fn scram_rejects_router_with_wrong_credential() {
    let mut honest = ScramRouter::provision("alice", "the real password");
    let mut imposter = ScramRouter::provision("alice", "a guessed password");

    let config = AuthConfig {
        authid: Some("alice".to_string()),
        password: Some("the real password".to_string()),
        ..AuthConfig::default()
    };
    let (mut session, hello) = started_session("realm1", vec![authenticator("scram", config)]);
    let Message::Hello { authextra, .. } = hello else {
        panic!("expected HELLO")
    };
    let client_nonce = authextra["nonce"].as_str().unwrap().to_string();

    let events = session
        .on_message(Message::Challenge {
            method: "scram".to_string(),
            extra: honest.challenge_extra("alice", &client_nonce),
        })
        .unwrap();
    let Message::Authenticate { signature, .. } = expect_send(events) else {
        panic!("expected AUTHENTICATE")
    };
    // a router that never held the real credential cannot verify the proof
    assert!(!imposter.verify_client_proof(&signature));

    // nor can it fake a server signature the client accepts, even over the
    // very same exchange transcript (same default salt, nonce and costs)
    let _ = imposter.challenge_extra("alice", &client_nonce);
    let events = session
        .on_message(welcome(78, "scram", imposter.welcome_extra()))
        .unwrap();
    assert!(matches!(&events[..], [SessionEvent::Left { .. }]));
}

#[test]
fn wamp_messages_survive_negotiated_deflate() {
    let (mut client, mut server) = negotiated_deflate_pair(DeflateOffer::default(), false);

    // a realistic WAMP EVENT payload, sent twice to exercise shared context
    let payload = serde_json::to_vec(&json!([
        36,
        5512315355i64,
        4429313566i64,
        {},
        ["Hello, world!", "Hello, world!", "Hello, world!"],
        {"topic": "com.myapp.hello", "retained": false}
    ]))
    .unwrap();

    for _ in 0..3 {
        let wire = deflate_message(&mut client, &payload);
        assert!(wire.len() < payload.len());
        let restored = inflate_message(&mut server, &wire);
        assert_eq!(restored, payload);
    }
}

#[test]
fn bzip2_runtime_interoperates_with_itself() {
    let accept = bzip::accept_offer(Bzip2Offer::default());
    let mut server = PerMessageBzip2::from_offer_accept(true, &accept);

    let (_, params) =
        tether_compress::params::parse_extension_string(&accept.extension_string()).unwrap();
    let response = bzip::Bzip2Response::parse(&params).unwrap();
    let response_accept = bzip::Bzip2ResponseAccept::new(response, None).unwrap();
    let mut client = PerMessageBzip2::from_response_accept(false, &response_accept);

    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i / 64 % 256) as u8).collect();

    client.start_compress_message();
    let mut wire = client.compress_message_data(&payload).unwrap();
    wire.extend(client.end_compress_message().unwrap());

    server.start_decompress_message();
    let restored = server.decompress_message_data(&wire).unwrap();
    server.end_decompress_message().unwrap();
    assert_eq!(restored, payload);
}

/// A connector that drives a full in-process WAMP handshake per attempt,
/// failing the transport a configured number of times first.
struct HandshakeConnector {
    failures_remaining: u32,
}

#[async_trait]
impl Connector for HandshakeConnector {
    async fn connect(
        &mut self,
        _transport: &TransportConfig,
    ) -> Result<AttemptOutcome, ConnectError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(ConnectError::Transport("connection refused".to_string()));
        }

        // transport "established": run an anonymous handshake inline
        let (mut session, _hello) =
            started_session("realm1", vec![authenticator("anonymous", AuthConfig::default())]);
        let events = session
            .on_message(Message::Welcome {
                session_id: 1,
                authid: None,
                authrole: None,
                authmethod: Some("anonymous".to_string()),
                authextra: AuthExtra::new(),
            })
            .map_err(ConnectError::from)?;
        assert!(matches!(&events[..], [SessionEvent::Established(_)]));

        // traffic flows in order, then the application leaves
        let events = session
            .on_message(Message::Traffic {
                kind: TrafficKind::Event,
                payload: json!({"seq": 1}),
            })
            .map_err(ConnectError::from)?;
        assert!(matches!(&events[..], [SessionEvent::Traffic { .. }]));

        session
            .leave("wamp.close.normal", None)
            .map_err(ConnectError::from)?;
        Ok(AttemptOutcome::SessionDone)
    }
}

fn supervisor_config(max_retries: Option<u32>) -> ConnectionConfig {
    ConnectionConfig {
        realm: "realm1".to_string(),
        transports: vec![TransportConfig {
            kind: TransportKind::WebSocket,
            url: "ws://127.0.0.1:9999/ws".to_string(),
            serializers: vec!["json".to_string()],
            tls: None,
        }],
        auth: vec![AuthMethodConfig {
            method: "anonymous".to_string(),
            options: AuthConfig::default(),
        }],
        retry: RetryConfig {
            max_retries,
            max_retry_delay: 0.05,
            initial_retry_delay: 0.001,
            retry_delay_growth: 1.5,
            retry_delay_jitter: 0.1,
        },
    }
}

#[tokio::test]
async fn supervisor_retries_transport_then_completes_session() {
    let config = supervisor_config(Some(5));
    let registry = tether_auth::AuthRegistry::with_defaults();
    let mut supervisor = ConnectionSupervisor::new(&config, &registry).unwrap();

    let mut connector = HandshakeConnector {
        failures_remaining: 2,
    };
    let completion = supervisor.run(&mut connector).await.unwrap();
    assert_eq!(completion, Completion::Completed);

    let transport = &supervisor.transports()[0];
    assert_eq!(transport.connect_attempts, 3);
    assert_eq!(transport.connect_failures, 2);
    assert_eq!(transport.connect_successes, 1);
}

#[tokio::test]
async fn supervisor_exhausts_when_transport_never_connects() {
    let config = supervisor_config(Some(2));
    let registry = tether_auth::AuthRegistry::with_defaults();
    let mut supervisor = ConnectionSupervisor::new(&config, &registry).unwrap();

    let mut connector = HandshakeConnector {
        failures_remaining: u32::MAX,
    };
    let result = supervisor.run(&mut connector).await;
    assert!(matches!(result, Err(ConnectError::Exhausted { last: Some(_) })));
    assert_eq!(supervisor.transports()[0].connect_attempts, 2);
}
