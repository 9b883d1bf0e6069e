//! Connection supervisor.
//!
//! Owns the ordered set of candidate transports and cycles through them:
//! `CYCLING → (per transport) DELAYING → CONNECTING → {SESSION_ACTIVE |
//! FAILED}`. One attempt is active at a time; suspension points are the
//! backoff delay and the connect/handshake awaits, both cancellable. The
//! supervisor never inspects the internals of a failure, only whether the
//! transport can still be retried.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::ConnectionConfig;
use crate::error::{ConfigError, ConnectError};
use crate::transport::Transport;
use tether_auth::AuthRegistry;

/// Outcome of one successfully established connection attempt, reported by
/// the [`Connector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The session completed deliberately (main-style user logic finished,
    /// or the application left): the supervisor stops cycling.
    SessionDone,
    /// The transport dropped after establishment (setup-style session lost
    /// its connection): the supervisor keeps cycling.
    TransportDropped,
}

/// Terminal state of a supervisor run that was not exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A session completed deliberately.
    Completed,
    /// The supervisor was stopped from the outside.
    Stopped,
}

/// External-I/O seam: performs one full connect + handshake + session
/// lifetime on a given transport.
///
/// Implementations drive the actual socket/TLS transport, the WebSocket
/// upgrade (including compression negotiation) and the WAMP handshake,
/// returning only once the session ends one way or the other.
#[async_trait]
pub trait Connector: Send {
    /// Attempt to connect over `transport`, run the session to its end,
    /// and report how it ended.
    ///
    /// # Errors
    ///
    /// Any [`ConnectError`] fails this attempt; configuration errors
    /// additionally latch the transport as permanently failed.
    async fn connect(
        &mut self,
        transport: &crate::config::TransportConfig,
    ) -> Result<AttemptOutcome, ConnectError>;
}

/// Handle for stopping a running supervisor from another task.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    stop_tx: watch::Sender<bool>,
}

impl SupervisorHandle {
    /// Request the supervisor to stop. Aborts an in-flight delay or
    /// connect attempt without counting a success.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Cycles through candidate transports with jittered exponential backoff
/// until a session completes, the caller stops it, or every transport is
/// exhausted.
pub struct ConnectionSupervisor {
    transports: Vec<Transport>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl ConnectionSupervisor {
    /// Build a supervisor from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; configuration errors are
    /// fatal and nothing is retried.
    pub fn new(config: &ConnectionConfig, registry: &AuthRegistry) -> Result<Self, ConfigError> {
        config.validate(registry)?;
        let transports = config
            .transports
            .iter()
            .enumerate()
            .map(|(idx, t)| Transport::new(idx, t.clone(), config.retry))
            .collect();
        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            transports,
            stop_tx,
            stop_rx,
        })
    }

    /// Handle for stopping this supervisor from another task.
    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// The transports with their retry bookkeeping.
    #[must_use]
    pub fn transports(&self) -> &[Transport] {
        &self.transports
    }

    /// Whether any transport can still be reconnected.
    #[must_use]
    pub fn can_reconnect(&self) -> bool {
        self.transports.iter().any(Transport::can_reconnect)
    }

    /// Run the connect/retry loop until terminal.
    ///
    /// Round-robins through the transports indefinitely: each eligible
    /// transport waits its backoff delay, attempts a connection, and the
    /// counters record the outcome. A deliberate session completion stops
    /// cycling with [`Completion::Completed`]; a stop request yields
    /// [`Completion::Stopped`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Exhausted`] carrying the last attempt error
    /// once no transport can be reconnected.
    pub async fn run<C: Connector>(
        &mut self,
        connector: &mut C,
    ) -> Result<Completion, ConnectError> {
        let mut rng = rand::rngs::OsRng;
        let mut last_error: Option<ConnectError> = None;
        let mut stop_rx = self.stop_rx.clone();

        loop {
            for i in 0..self.transports.len() {
                if *stop_rx.borrow() {
                    return Ok(Completion::Stopped);
                }
                if !self.transports[i].can_reconnect() {
                    continue;
                }

                let delay = self.transports[i].next_delay(&mut rng)?;
                tracing::debug!(
                    transport = %self.transports[i].describe_endpoint(),
                    delay_secs = delay.as_secs_f64(),
                    "trying transport after connect delay"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop_rx.changed() => return Ok(Completion::Stopped),
                }

                self.transports[i].begin_attempt();
                let attempt = tokio::select! {
                    result = connector.connect(self.transports[i].config()) => result,
                    // aborting a pending attempt must not count a success
                    _ = stop_rx.changed() => return Ok(Completion::Stopped),
                };

                match attempt {
                    Ok(AttemptOutcome::SessionDone) => {
                        self.transports[i].record_success();
                        tracing::info!(
                            transport = %self.transports[i].describe_endpoint(),
                            "session completed, supervisor done"
                        );
                        return Ok(Completion::Completed);
                    }
                    Ok(AttemptOutcome::TransportDropped) => {
                        self.transports[i].record_success();
                        tracing::info!(
                            transport = %self.transports[i].describe_endpoint(),
                            "connection lost, continuing retry cycle"
                        );
                    }
                    Err(e) => {
                        self.transports[i].record_failure();
                        if matches!(e, ConnectError::Config(_)) {
                            // unrecoverable for this endpoint, never retry it
                            self.transports[i].failed();
                        }
                        tracing::warn!(
                            transport = %self.transports[i].describe_endpoint(),
                            error = %e,
                            "connection attempt failed"
                        );
                        last_error = Some(e);
                    }
                }
            }

            if !self.can_reconnect() {
                tracing::warn!("no transport can be reconnected, giving up");
                return Err(ConnectError::Exhausted {
                    last: last_error.map(Box::new),
                });
            }
        }
    }
}
