//! Session protocol state machine.
//!
//! Drives one WAMP session over one established transport:
//! `Closed → Connecting → Handshaking(HelloSent → ChallengeReceived →
//! AuthenticateSent) → Established → Closing → Closed`.
//!
//! The session consumes decoded [`Message`] records and emits
//! [`SessionEvent`]s: messages to send, the established session details,
//! ordered traffic records, or the terminal leave. Authenticator and
//! negotiation failures are mapped into one terminal `Left` event; state
//! machine violations (e.g. a CHALLENGE while established) are fatal
//! [`ProtocolError`]s that must close the connection.

use tether_auth::{AuthExtra, Authenticator, Challenge, SessionBinding};

use crate::error::ProtocolError;
use crate::message::{
    CLOSE_GOODBYE_AND_OUT, ERROR_CANNOT_AUTHENTICATE, ERROR_NO_AUTH_METHOD, Message,
    SessionDetails, TrafficKind,
};

/// Handshake sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// HELLO sent, awaiting CHALLENGE or WELCOME.
    HelloSent,
    /// CHALLENGE received, computing the response.
    ChallengeReceived,
    /// AUTHENTICATE sent, awaiting WELCOME or ABORT.
    AuthenticateSent,
}

/// Session state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Closed,
    /// Transport connect in progress.
    Connecting,
    /// WAMP handshake in progress.
    Handshaking(HandshakePhase),
    /// Session established, traffic flows.
    Established,
    /// GOODBYE sent, awaiting the echo.
    Closing,
}

/// Output of feeding the session a decoded message.
#[derive(Debug)]
pub enum SessionEvent {
    /// Hand this message to the serializer for sending.
    Send(Message),
    /// The session is established; details for the application layer.
    Established(SessionDetails),
    /// An ordered post-establishment RPC/PubSub record for the dispatch
    /// table.
    Traffic {
        /// Record tag.
        kind: TrafficKind,
        /// Serializer-owned payload.
        payload: serde_json::Value,
    },
    /// The session ended; consumed by the supervisor.
    Left {
        /// Reason URI.
        reason: String,
        /// Optional detail message.
        message: Option<String>,
    },
}

/// One WAMP client session over one transport connection.
pub struct Session {
    state: SessionState,
    realm: String,
    authenticators: Vec<Authenticator>,
    binding: SessionBinding,
    details: Option<SessionDetails>,
}

impl Session {
    /// Create a session for `realm` with the authenticators to offer, in
    /// announcement order.
    #[must_use]
    pub fn new(
        realm: impl Into<String>,
        authenticators: Vec<Authenticator>,
        binding: SessionBinding,
    ) -> Self {
        Self {
            state: SessionState::Closed,
            realm: realm.into(),
            authenticators,
            binding,
            details: None,
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Details of the established session, once available.
    #[must_use]
    pub fn details(&self) -> Option<&SessionDetails> {
        self.details.as_ref()
    }

    /// Whether the session is established.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Check if a state transition is valid.
    #[must_use]
    pub fn can_transition(&self, to: SessionState) -> bool {
        use HandshakePhase::{AuthenticateSent, ChallengeReceived, HelloSent};
        use SessionState::{Closed, Closing, Connecting, Established, Handshaking};
        matches!(
            (self.state, to),
            (Closed, Connecting | Closed)
                | (Connecting, Handshaking(HelloSent) | Closed)
                | (
                    Handshaking(HelloSent),
                    Handshaking(ChallengeReceived) | Established | Closed
                )
                | (
                    Handshaking(ChallengeReceived),
                    Handshaking(AuthenticateSent) | Closed
                )
                | (Handshaking(AuthenticateSent), Established | Closed)
                | (Established, Closing | Closed)
                | (Closing, Closed)
        )
    }

    /// Transition to a new state.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTransition`] if the transition is
    /// not allowed from the current state.
    pub fn transition_to(&mut self, new_state: SessionState) -> Result<(), ProtocolError> {
        if !self.can_transition(new_state) {
            return Err(ProtocolError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{new_state:?}"),
            });
        }
        tracing::debug!("session state transition: {:?} -> {:?}", self.state, new_state);
        self.state = new_state;
        Ok(())
    }

    /// Mark the transport connect as started.
    ///
    /// Per-attempt authenticator state (e.g. the SCRAM nonce) is discarded
    /// here so every attempt starts fresh.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTransition`] unless the session is
    /// closed.
    pub fn connecting(&mut self) -> Result<(), ProtocolError> {
        self.transition_to(SessionState::Connecting)?;
        for authenticator in &mut self.authenticators {
            authenticator.reset_attempt();
        }
        Ok(())
    }

    /// Build the HELLO once the transport is up.
    ///
    /// Carries the realm, every offered authmethod, the first configured
    /// authid/authrole and the merged `authextra` of all authenticators.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTransition`] unless a transport
    /// connect is in progress, and surfaces authenticator failures from
    /// `authextra()` as a `Left` would not yet make sense here.
    pub fn start(&mut self) -> Result<Message, ProtocolError> {
        self.transition_to(SessionState::Handshaking(HandshakePhase::HelloSent))?;

        let mut authextra = AuthExtra::new();
        let mut authmethods = Vec::with_capacity(self.authenticators.len());
        let mut authid = None;
        let mut authrole = None;
        for authenticator in &mut self.authenticators {
            authmethods.push(authenticator.name().to_string());
            if authid.is_none() {
                authid = authenticator.authid().map(str::to_string);
            }
            if authrole.is_none() {
                authrole = authenticator.authrole().map(str::to_string);
            }
            match authenticator.authextra() {
                Ok(extra) => authextra.extend(extra),
                Err(e) => {
                    tracing::warn!(method = authenticator.name(), error = %e, "authextra failed");
                }
            }
        }

        Ok(Message::Hello {
            realm: self.realm.clone(),
            authmethods,
            authid,
            authrole,
            authextra,
        })
    }

    /// Request a deliberate leave; returns the GOODBYE to send.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTransition`] unless the session is
    /// established.
    pub fn leave(
        &mut self,
        reason: impl Into<String>,
        message: Option<String>,
    ) -> Result<Message, ProtocolError> {
        self.transition_to(SessionState::Closing)?;
        Ok(Message::Goodbye {
            reason: reason.into(),
            message,
        })
    }

    /// Feed one decoded inbound message through the state machine.
    ///
    /// Events come back in the order they must be acted upon; traffic
    /// records preserve arrival order.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ProtocolError`] when the message is illegal in
    /// the current state; the connection must then be closed.
    pub fn on_message(&mut self, msg: Message) -> Result<Vec<SessionEvent>, ProtocolError> {
        use HandshakePhase::{AuthenticateSent, HelloSent};
        use SessionState::{Closing, Established, Handshaking};

        match (self.state, msg) {
            (Handshaking(HelloSent), Message::Challenge { method, extra }) => {
                self.on_challenge(method, extra)
            }

            (
                Handshaking(HelloSent | AuthenticateSent),
                Message::Welcome {
                    session_id,
                    authid,
                    authrole,
                    authmethod,
                    authextra,
                },
            ) => self.on_welcome(session_id, authid, authrole, authmethod, &authextra),

            (Handshaking(_), Message::Abort { reason, message }) => {
                tracing::info!(%reason, "session aborted by router");
                self.transition_to(SessionState::Closed)?;
                Ok(vec![SessionEvent::Left { reason, message }])
            }

            (Established, Message::Traffic { kind, payload }) => {
                Ok(vec![SessionEvent::Traffic { kind, payload }])
            }

            (Established, Message::Goodbye { reason, message }) => {
                // peer-initiated close: echo and leave
                tracing::info!(%reason, "goodbye received, closing session");
                self.transition_to(SessionState::Closed)?;
                Ok(vec![
                    SessionEvent::Send(Message::Goodbye {
                        reason: CLOSE_GOODBYE_AND_OUT.to_string(),
                        message: None,
                    }),
                    SessionEvent::Left { reason, message },
                ])
            }

            (Closing, Message::Goodbye { reason, message }) => {
                self.transition_to(SessionState::Closed)?;
                Ok(vec![SessionEvent::Left { reason, message }])
            }

            (Closing, Message::Traffic { kind, .. }) => {
                // traffic still in flight while our GOODBYE is pending
                tracing::trace!(?kind, "dropping traffic received while closing");
                Ok(vec![])
            }

            (state, msg) => Err(ProtocolError::UnexpectedMessage {
                message: msg.tag(),
                state: format!("{state:?}"),
            }),
        }
    }

    fn on_challenge(
        &mut self,
        method: String,
        extra: AuthExtra,
    ) -> Result<Vec<SessionEvent>, ProtocolError> {
        self.transition_to(SessionState::Handshaking(HandshakePhase::ChallengeReceived))?;

        let Some(authenticator) = self
            .authenticators
            .iter_mut()
            .find(|a| a.name() == method)
        else {
            tracing::warn!(%method, "router challenged with a method we never offered");
            self.transition_to(SessionState::Closed)?;
            return Ok(vec![SessionEvent::Left {
                reason: ERROR_NO_AUTH_METHOD.to_string(),
                message: Some(format!("challenge for unknown method '{method}'")),
            }]);
        };

        let challenge = Challenge::new(method, extra);
        match authenticator.on_challenge(&self.binding, &challenge) {
            Ok(signature) => {
                self.transition_to(SessionState::Handshaking(HandshakePhase::AuthenticateSent))?;
                Ok(vec![SessionEvent::Send(Message::Authenticate {
                    signature,
                    extra: AuthExtra::new(),
                })])
            }
            Err(e) => {
                tracing::warn!(error = %e, "challenge computation failed");
                self.transition_to(SessionState::Closed)?;
                Ok(vec![SessionEvent::Left {
                    reason: ERROR_CANNOT_AUTHENTICATE.to_string(),
                    message: Some(e.to_string()),
                }])
            }
        }
    }

    fn on_welcome(
        &mut self,
        session_id: u64,
        authid: Option<String>,
        authrole: Option<String>,
        authmethod: Option<String>,
        authextra: &AuthExtra,
    ) -> Result<Vec<SessionEvent>, ProtocolError> {
        // post-hoc verification: the authenticator that was used gets to
        // authenticate the router (SCRAM server signature)
        let verification = match &authmethod {
            Some(method) => self
                .authenticators
                .iter_mut()
                .find(|a| a.name() == method.as_str())
                .map_or(Ok(()), |a| a.on_welcome(authextra)),
            None => self
                .authenticators
                .iter_mut()
                .try_for_each(|a| a.on_welcome(authextra)),
        };

        if let Err(e) = verification {
            tracing::error!(error = %e, "post-welcome verification failed, tearing down");
            self.transition_to(SessionState::Closed)?;
            return Ok(vec![SessionEvent::Left {
                reason: ERROR_CANNOT_AUTHENTICATE.to_string(),
                message: Some(e.to_string()),
            }]);
        }

        self.transition_to(SessionState::Established)?;
        let details = SessionDetails {
            session_id,
            realm: self.realm.clone(),
            authid,
            authrole,
            authmethod,
        };
        tracing::info!(
            session_id,
            authmethod = details.authmethod.as_deref().unwrap_or("none"),
            "session established"
        );
        self.details = Some(details.clone());
        Ok(vec![SessionEvent::Established(details)])
    }
}
