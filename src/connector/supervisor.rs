//! Reconnect supervisor for streaming connections.
//!
//! One supervisor per streaming connector. It owns the connection state
//! machine and timers; the exchange-specific session body (dial,
//! subscribe, message pump) is injected as a closure, so the transition
//! table here is the reusable part.
//!
//! Transitions:
//! - Disconnected -> Connecting on start or after a reconnect wait
//! - Connecting -> Connected on socket open (resets the attempt counter)
//! - Connected -> ReconnectWait on close or error
//! - ReconnectWait -> Connecting after `base_delay * attempt` (counter
//!   incremented first)
//! - ReconnectWait -> Disconnected once the counter exceeds
//!   `max_attempts`; terminal for this connector.

use crate::error::Result;
use crate::types::ExchangeId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Connection lifecycle of one streaming connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectWait,
}

/// Per-exchange reconnect tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Wait before reconnect attempt `attempt` (1-based): linear backoff.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// How one session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Server or transport closed the connection; the supervisor retries.
    Closed,
    /// The owning connector went away; stop supervising.
    Shutdown,
}

/// Handed to the session body so it can report a successful socket open.
pub struct StateHandle {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl StateHandle {
    pub fn connected(&self) {
        self.tx.send_replace(ConnectionState::Connected);
    }
}

pub struct Supervisor {
    exchange: ExchangeId,
    policy: ReconnectPolicy,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

impl Supervisor {
    pub fn new(
        exchange: ExchangeId,
        policy: ReconnectPolicy,
    ) -> (Self, watch::Receiver<ConnectionState>) {
        // `run` publishes Connecting before anything else; starting the
        // channel there keeps Disconnected unambiguous: readers only ever
        // observe it once the retry budget is spent.
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        (
            Self {
                exchange,
                policy,
                state_tx: Arc::new(state_tx),
            },
            state_rx,
        )
    }

    /// Runs sessions until the retry budget is spent or the session asks
    /// for shutdown. Ends with the state at `Disconnected`.
    pub async fn run<F, Fut>(self, mut session: F)
    where
        F: FnMut(StateHandle) -> Fut,
        Fut: Future<Output = Result<SessionEnd>>,
    {
        let mut attempts: u32 = 0;
        loop {
            self.state_tx.send_replace(ConnectionState::Connecting);
            info!(exchange = %self.exchange, attempt = attempts, "connecting stream");

            let handle = StateHandle {
                tx: Arc::clone(&self.state_tx),
            };
            let outcome = session(handle).await;

            // A session that got as far as Connected earns a fresh budget.
            if *self.state_tx.borrow() == ConnectionState::Connected {
                attempts = 0;
            }

            match outcome {
                Ok(SessionEnd::Shutdown) => {
                    info!(exchange = %self.exchange, "stream supervisor shutting down");
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
                Ok(SessionEnd::Closed) => {
                    warn!(exchange = %self.exchange, "stream closed by peer");
                }
                Err(e) => {
                    warn!(exchange = %self.exchange, "stream error: {e}");
                }
            }

            self.state_tx.send_replace(ConnectionState::ReconnectWait);
            attempts += 1;
            if attempts > self.policy.max_attempts {
                error!(
                    exchange = %self.exchange,
                    max_attempts = self.policy.max_attempts,
                    "reconnect attempts exhausted; giving up"
                );
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return;
            }

            let wait = self.policy.backoff(attempts);
            info!(exchange = %self.exchange, "reconnecting in {wait:?} (attempt {attempts})");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.state_tx.closed() => {
                    info!(exchange = %self.exchange, "connector dropped during backoff");
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
            }
        }
    }
}
