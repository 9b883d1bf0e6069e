//! Per-transport retry bookkeeping.
//!
//! Each configured endpoint candidate carries its own attempt counters and
//! backoff state. Delays grow geometrically, receive Gaussian jitter and
//! clamp to the configured maximum; a first-ever attempt connects
//! immediately. `failed()` is a one-way latch for endpoints that must never
//! be tried again (unrecoverable configuration or handshake rejection).

use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

use crate::config::{RetryConfig, TransportConfig};
use crate::error::ConnectError;

/// One endpoint candidate with its retry state.
#[derive(Debug, Clone)]
pub struct Transport {
    idx: usize,
    config: TransportConfig,
    retry: RetryConfig,
    /// Attempts started (successful or not).
    pub connect_attempts: u32,
    /// Attempts that reached an established connection.
    pub connect_successes: u32,
    /// Attempts that failed before establishment.
    pub connect_failures: u32,
    /// Current backoff delay in seconds (grows each attempt).
    pub retry_delay: f64,
    permanent_failure: bool,
}

impl Transport {
    /// Wrap a configured endpoint with fresh retry state.
    #[must_use]
    pub fn new(idx: usize, config: TransportConfig, retry: RetryConfig) -> Self {
        let mut transport = Self {
            idx,
            config,
            retry,
            connect_attempts: 0,
            connect_successes: 0,
            connect_failures: 0,
            retry_delay: 0.0,
            permanent_failure: false,
        };
        transport.reset();
        transport
    }

    /// Identity index of this transport in the configured list.
    #[must_use]
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// The immutable endpoint configuration.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Reset counters and the retry delay to their initial values.
    ///
    /// Used when switching connection strategies, not during normal retry;
    /// the permanent-failure latch survives.
    pub fn reset(&mut self) {
        self.connect_attempts = 0;
        self.connect_successes = 0;
        self.connect_failures = 0;
        self.retry_delay = self.retry.initial_retry_delay;
    }

    /// Latch this transport as permanently failed; `can_reconnect()` is
    /// false from here on, irreversibly.
    pub fn failed(&mut self) {
        tracing::warn!(transport_idx = self.idx, "transport marked permanently failed");
        self.permanent_failure = true;
    }

    /// Whether this transport has attempts left.
    #[must_use]
    pub fn can_reconnect(&self) -> bool {
        if self.permanent_failure {
            return false;
        }
        match self.retry.max_retries {
            None => true,
            Some(max) => self.connect_attempts < max,
        }
    }

    /// Compute the delay to wait before the next attempt.
    ///
    /// Returns 0 on a transport's very first attempt ever. Otherwise the
    /// prior delay is multiplied by the growth factor, jittered with a
    /// normal distribution (stddev = delay × jitter fraction) and clamped
    /// to `[0, max_retry_delay]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::RetriesExhausted`] once the attempt budget
    /// is spent; callers check [`Self::can_reconnect`] first.
    pub fn next_delay<R: Rng>(&mut self, rng: &mut R) -> Result<Duration, ConnectError> {
        if self.connect_attempts == 0 {
            // never tried before: connect immediately
            return Ok(Duration::ZERO);
        }
        if let Some(max) = self.retry.max_retries {
            if self.connect_attempts >= max {
                return Err(ConnectError::RetriesExhausted);
            }
        }

        let grown = self.retry_delay * self.retry.retry_delay_growth;
        let jittered = if self.retry.retry_delay_jitter > 0.0 {
            let normal = Normal::new(grown, grown * self.retry.retry_delay_jitter)
                .map_err(|e| ConnectError::Transport(format!("jitter distribution: {e}")))?;
            normal.sample(rng)
        } else {
            grown
        };
        self.retry_delay = jittered.clamp(0.0, self.retry.max_retry_delay);
        Ok(Duration::from_secs_f64(self.retry_delay))
    }

    /// Record that an attempt is starting.
    pub fn begin_attempt(&mut self) {
        self.connect_attempts += 1;
    }

    /// Record an attempt that reached an established connection.
    pub fn record_success(&mut self) {
        self.connect_successes += 1;
    }

    /// Record an attempt that failed before establishment.
    pub fn record_failure(&mut self) {
        self.connect_failures += 1;
    }

    /// Human-readable endpoint description for logs.
    #[must_use]
    pub fn describe_endpoint(&self) -> String {
        format!("transport {} ({})", self.idx, self.config.url)
    }
}
