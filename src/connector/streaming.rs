//! Streaming connector: a supervised WebSocket session keeps `last_price`
//! fresh; readers either get the cached value immediately or suspend until
//! the first valid price arrives.

use super::supervisor::{ConnectionState, ReconnectPolicy, SessionEnd, StateHandle, Supervisor};
use super::PriceConnector;
use crate::config::ExchangeConfig;
use crate::error::{ArbError, Result};
use crate::exchange::{KeepAlive, StreamAdapter};
use crate::limiter::RateLimiter;
use crate::types::{ExchangeId, Quote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

/// Most recent validated price seen on the stream.
#[derive(Debug, Clone, Copy)]
pub struct PricePoint {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// One exchange's streaming connector. Created once at startup; the
/// supervisor task owns the socket and is the only writer of the price
/// cell and connection state.
pub struct StreamingConnector {
    exchange: ExchangeId,
    price_rx: watch::Receiver<Option<PricePoint>>,
    state_rx: watch::Receiver<ConnectionState>,
    first_price_timeout: Duration,
}

impl StreamingConnector {
    /// Spawns the supervisor task and returns the read handle.
    pub fn spawn(adapter: Box<dyn StreamAdapter>, cfg: &ExchangeConfig) -> Self {
        let exchange = adapter.exchange();
        let (price_tx, price_rx) = watch::channel(None);
        let (limit, window) = cfg.rate_limit();
        let policy = ReconnectPolicy {
            base_delay: cfg.reconnect_base_delay(),
            max_attempts: cfg.reconnect_max_attempts(),
        };
        let (supervisor, state_rx) = Supervisor::new(exchange, policy);

        let adapter: Arc<dyn StreamAdapter> = Arc::from(adapter);
        let limiter = Arc::new(RateLimiter::new(limit, window));
        let price_tx = Arc::new(price_tx);

        tokio::spawn(async move {
            supervisor
                .run(move |handle| {
                    let adapter = Arc::clone(&adapter);
                    let limiter = Arc::clone(&limiter);
                    let price_tx = Arc::clone(&price_tx);
                    async move { run_session(&*adapter, &limiter, &price_tx, handle).await }
                })
                .await;
        });

        Self {
            exchange,
            price_rx,
            state_rx,
            first_price_timeout: cfg.first_price_timeout(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Waits until either a price lands in the cell or the supervisor goes
    /// terminal.
    async fn wait_for_first_price(&self) -> Result<PricePoint> {
        let mut price_rx = self.price_rx.clone();
        let mut state_rx = self.state_rx.clone();

        loop {
            if let Some(point) = *price_rx.borrow_and_update() {
                return Ok(point);
            }
            if *state_rx.borrow_and_update() == ConnectionState::Disconnected {
                return Err(ArbError::ReconnectExhausted {
                    exchange: self.exchange.to_string(),
                });
            }
            tokio::select! {
                changed = price_rx.changed() => {
                    if changed.is_err() {
                        return Err(ArbError::WebSocket("stream supervisor gone".into()));
                    }
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return Err(ArbError::WebSocket("stream supervisor gone".into()));
                    }
                }
            }
        }
    }
}

#[async_trait]
impl PriceConnector for StreamingConnector {
    fn exchange_id(&self) -> ExchangeId {
        self.exchange
    }

    async fn current_price(&self) -> Quote {
        // A terminal supervisor wins over the cached price: once the
        // retry budget is spent nobody refreshes the cell, so serving it
        // would pass off an arbitrarily stale value as current.
        if *self.state_rx.borrow() == ConnectionState::Disconnected {
            return Quote::failed(
                self.exchange,
                ArbError::ReconnectExhausted {
                    exchange: self.exchange.to_string(),
                }
                .to_string(),
                Utc::now(),
            );
        }

        if let Some(point) = *self.price_rx.borrow() {
            return Quote::price(self.exchange, point.price, point.observed_at);
        }

        match tokio::time::timeout(self.first_price_timeout, self.wait_for_first_price()).await {
            Ok(Ok(point)) => Quote::price(self.exchange, point.price, point.observed_at),
            Ok(Err(e)) => Quote::failed(self.exchange, e.to_string(), Utc::now()),
            Err(_) => Quote::failed(
                self.exchange,
                format!(
                    "timed out waiting for first {} price after {:?}",
                    self.exchange, self.first_price_timeout
                ),
                Utc::now(),
            ),
        }
    }
}

/// One connection's lifetime: dial, subscribe, pump messages, keep alive.
/// Returns when the transport closes or the connector is dropped.
async fn run_session(
    adapter: &dyn StreamAdapter,
    limiter: &RateLimiter,
    price_tx: &watch::Sender<Option<PricePoint>>,
    handle: StateHandle,
) -> Result<SessionEnd> {
    let (ws, _) = connect_async(adapter.ws_url())
        .await
        .map_err(|e| ArbError::WebSocket(e.to_string()))?;
    handle.connected();
    info!(exchange = %adapter.exchange(), "stream connected");

    let (mut write, mut read) = ws.split();

    if let Some(subscribe) = adapter.subscribe_message() {
        limiter.acquire().await;
        write
            .send(Message::Text(subscribe.to_string().into()))
            .await
            .map_err(|e| ArbError::WebSocket(e.to_string()))?;
        debug!(exchange = %adapter.exchange(), "subscribed");
    }

    let keep_alive = adapter.keep_alive();
    let mut ticker = tokio::time::interval(keep_alive.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // first tick is immediate

    loop {
        tokio::select! {
            // All receivers dropped: the connector went away.
            _ = price_tx.closed() => return Ok(SessionEnd::Shutdown),

            _ = ticker.tick() => {
                limiter.acquire().await;
                let frame = match &keep_alive {
                    KeepAlive::Ping { .. } => Message::Ping(Vec::new().into()),
                    KeepAlive::Heartbeat { payload, .. } => {
                        Message::Text(payload.to_string().into())
                    }
                };
                write
                    .send(frame)
                    .await
                    .map_err(|e| ArbError::WebSocket(e.to_string()))?;
            }

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(price) = adapter.parse_message(&text) {
                        price_tx.send_replace(Some(PricePoint {
                            price,
                            observed_at: Utc::now(),
                        }));
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    // Keep-alive ack; its absence is not fatal.
                    debug!(exchange = %adapter.exchange(), "pong");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(exchange = %adapter.exchange(), "close frame: {frame:?}");
                    return Ok(SessionEnd::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ArbError::WebSocket(e.to_string())),
                None => return Ok(SessionEnd::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn connector_with_channels(
        timeout: Duration,
    ) -> (
        StreamingConnector,
        watch::Sender<Option<PricePoint>>,
        watch::Sender<ConnectionState>,
    ) {
        let (price_tx, price_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        (
            StreamingConnector {
                exchange: ExchangeId::Coinbase,
                price_rx,
                state_rx,
                first_price_timeout: timeout,
            },
            price_tx,
            state_tx,
        )
    }

    fn point(price: Decimal) -> PricePoint {
        PricePoint {
            price,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cached_price_returns_immediately() {
        let (connector, price_tx, _state_tx) = connector_with_channels(Duration::from_secs(10));
        price_tx.send_replace(Some(point(dec!(97000))));

        let quote = connector.current_price().await;
        assert_eq!(quote.price, Some(dec!(97000)));
        assert!(quote.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_first_price() {
        let (connector, price_tx, _state_tx) = connector_with_channels(Duration::from_secs(10));

        let waiter = tokio::spawn(async move { connector.current_price().await });
        tokio::task::yield_now().await;
        price_tx.send_replace(Some(point(dec!(96500.5))));

        let quote = waiter.await.unwrap();
        assert_eq!(quote.price, Some(dec!(96500.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_price() {
        let (connector, _price_tx, _state_tx) = connector_with_channels(Duration::from_secs(10));

        let quote = connector.current_price().await;
        assert!(quote.price.is_none());
        assert!(quote.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_terminal_supervisor_overrides_cached_price() {
        let (connector, price_tx, state_tx) = connector_with_channels(Duration::from_secs(10));
        price_tx.send_replace(Some(point(dec!(97000))));
        state_tx.send_replace(ConnectionState::Disconnected);

        // The cached value predates exhaustion; serving it would present
        // a dead feed as live.
        let quote = connector.current_price().await;
        assert!(quote.price.is_none());
        assert!(quote.error.unwrap().contains("exhausted"));
    }

    #[tokio::test]
    async fn test_exhausted_supervisor_yields_error_quote() {
        let (connector, _price_tx, state_tx) = connector_with_channels(Duration::from_secs(10));
        state_tx.send_replace(ConnectionState::Disconnected);

        let quote = connector.current_price().await;
        assert!(quote.price.is_none());
        assert!(quote.error.unwrap().contains("exhausted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_transition_while_waiting() {
        let (connector, _price_tx, state_tx) = connector_with_channels(Duration::from_secs(10));

        let waiter = tokio::spawn(async move { connector.current_price().await });
        tokio::task::yield_now().await;
        state_tx.send_replace(ConnectionState::Disconnected);

        let quote = waiter.await.unwrap();
        assert!(quote.price.is_none());
        assert!(quote.error.unwrap().contains("exhausted"));
    }
}
