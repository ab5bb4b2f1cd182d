//! Price aggregation: fan out to every connector, fan in to one snapshot.

use crate::arbitrage;
use crate::config::Config;
use crate::connector::{self, PriceConnector};
use crate::error::{ArbError, Result};
use crate::types::{ArbitrageOpportunity, Quote, Snapshot};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Owns the connector set and produces point-in-time snapshots. Explicitly
/// constructed and passed by reference to the serving layer; there is no
/// process-wide registry.
pub struct PriceAggregator {
    connectors: Vec<Arc<dyn PriceConnector>>,
    query_timeout: Duration,
}

/// The inbound service contract: the latest snapshot plus, on request,
/// the derived opportunity list. JSON-serializable as-is.
#[derive(Debug, Clone, Serialize)]
pub struct PriceReport {
    #[serde(rename = "asOf")]
    pub as_of: chrono::DateTime<Utc>,
    pub prices: Vec<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunities: Option<Vec<ArbitrageOpportunity>>,
}

impl PriceAggregator {
    pub fn new(connectors: Vec<Arc<dyn PriceConnector>>, query_timeout: Duration) -> Self {
        Self {
            connectors,
            query_timeout,
        }
    }

    /// Builds one connector per configured exchange.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let connectors = config
            .exchanges
            .iter()
            .map(connector::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(connectors, config.snapshot_timeout()))
    }

    pub fn exchange_count(&self) -> usize {
        self.connectors.len()
    }

    /// Queries every connector concurrently and waits for all of them.
    /// One quote per exchange, all stamped with a single `as_of`, sorted
    /// by exchange name. A failed or timed-out connector yields an error
    /// quote; partial failure never fails the call. Cancelling this
    /// future cancels every in-flight query.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        if self.connectors.is_empty() {
            return Err(ArbError::Config("no exchanges configured".into()));
        }

        let as_of = Utc::now();
        let queries = self.connectors.iter().map(|connector| {
            let connector = Arc::clone(connector);
            let bound = self.query_timeout;
            async move {
                let exchange = connector.exchange_id();
                match tokio::time::timeout(bound, connector.current_price()).await {
                    Ok(quote) => quote,
                    Err(_) => Quote::failed(
                        exchange,
                        format!("query timed out after {bound:?}"),
                        as_of,
                    ),
                }
            }
        });

        let mut quotes = join_all(queries).await;
        for quote in &mut quotes {
            quote.timestamp = as_of;
        }
        quotes.sort_by_key(|q| q.exchange);

        debug!(
            ok = quotes.iter().filter(|q| q.is_ok()).count(),
            failed = quotes.iter().filter(|q| !q.is_ok()).count(),
            "snapshot complete"
        );
        Ok(Snapshot { as_of, quotes })
    }

    /// Snapshot plus optional ranked opportunities, shaped for the
    /// external serving layer.
    pub async fn report(&self, include_opportunities: bool) -> Result<PriceReport> {
        let snapshot = self.snapshot().await?;
        let opportunities =
            include_opportunities.then(|| arbitrage::opportunities(&snapshot));
        Ok(PriceReport {
            as_of: snapshot.as_of,
            prices: snapshot.quotes,
            opportunities,
        })
    }
}
