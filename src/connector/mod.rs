//! Exchange connectors
//!
//! One connector per exchange, polymorphic over two variants behind the
//! same contract:
//! - `StreamingConnector`: persistent WebSocket kept alive by a
//!   reconnect supervisor; prices arrive asynchronously.
//! - `PolledConnector`: discrete rate-limited REST calls with retry and
//!   fallback.
//!
//! The variant is chosen by configuration, not by separate code paths.

pub mod polled;
pub mod streaming;
pub mod supervisor;

pub use polled::PolledConnector;
pub use streaming::StreamingConnector;
pub use supervisor::{ConnectionState, ReconnectPolicy, Supervisor};

use crate::config::{ConnectorMode, ExchangeConfig};
use crate::error::Result;
use crate::exchange;
use crate::types::{ExchangeId, Quote};
use async_trait::async_trait;
use std::sync::Arc;

/// Common contract for both connector variants. Failures never escape:
/// they travel inside the returned `Quote`.
#[async_trait]
pub trait PriceConnector: Send + Sync {
    fn exchange_id(&self) -> ExchangeId;

    /// Latest known price. Non-blocking when a cached value exists;
    /// otherwise suspends up to the connector's configured bound.
    async fn current_price(&self) -> Quote;
}

/// Builds the configured variant for one exchange. Streaming connectors
/// spawn their supervisor task immediately.
pub fn build(cfg: &ExchangeConfig) -> Result<Arc<dyn PriceConnector>> {
    match cfg.mode {
        ConnectorMode::Streaming => Ok(Arc::new(StreamingConnector::spawn(
            exchange::stream_adapter(cfg.exchange),
            cfg,
        ))),
        ConnectorMode::Polled => Ok(Arc::new(PolledConnector::new(cfg)?)),
    }
}
