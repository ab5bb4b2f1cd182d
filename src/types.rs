//! Core data model: exchanges, quotes, snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier for a supported exchange.
///
/// Ordering is by canonical lowercase name, which gives snapshots their
/// deterministic row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Coinbase,
    Kraken,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 3] = [ExchangeId::Binance, ExchangeId::Coinbase, ExchangeId::Kraken];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Coinbase => "coinbase",
            ExchangeId::Kraken => "kraken",
        }
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExchangeId {
    type Err = crate::error::ArbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "coinbase" => Ok(ExchangeId::Coinbase),
            "kraken" => Ok(ExchangeId::Kraken),
            other => Err(crate::error::ArbError::Config(format!(
                "unknown exchange: {other}"
            ))),
        }
    }
}

/// A single exchange's price observation (or failure) at a point in time.
///
/// Exactly one of `price` / `error` is set; the constructors are the only
/// way to build one. A set price is strictly positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub exchange: ExchangeId,
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// A successful observation. `price` must be strictly positive.
    pub fn price(exchange: ExchangeId, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        debug_assert!(price > Decimal::ZERO);
        Self {
            exchange,
            price: Some(price),
            error: None,
            timestamp,
        }
    }

    /// A failed observation.
    pub fn failed(
        exchange: ExchangeId,
        error: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            exchange,
            price: None,
            error: Some(error.into()),
            timestamp,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.price.is_some()
    }
}

/// The full set of quotes across all configured exchanges, captured at one
/// instant. Rows are sorted by exchange name; one row per exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "asOf")]
    pub as_of: DateTime<Utc>,
    pub quotes: Vec<Quote>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// A priced (buy, sell) exchange pair where quotes diverge. Derived from a
/// snapshot, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageOpportunity {
    pub buy_exchange: ExchangeId,
    pub sell_exchange: ExchangeId,
    pub price_difference: Decimal,
    pub percentage_difference: Decimal,
}
