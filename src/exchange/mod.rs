//! Exchange-specific pieces: endpoint defaults, subscribe payloads,
//! keep-alive shapes, and ticker parsers.
//!
//! The reconnect machinery and the polled fetch loop are generic; each
//! exchange module only supplies what differs between venues.

pub mod binance;
pub mod coinbase;
pub mod kraken;

use crate::error::{ArbError, Result};
use crate::types::ExchangeId;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;

/// How a streaming connection keeps itself alive while connected.
#[derive(Debug, Clone)]
pub enum KeepAlive {
    /// Transport-level WebSocket ping.
    Ping { interval: Duration },
    /// Application-level JSON heartbeat message.
    Heartbeat {
        interval: Duration,
        payload: serde_json::Value,
    },
}

impl KeepAlive {
    pub fn interval(&self) -> Duration {
        match self {
            KeepAlive::Ping { interval } => *interval,
            KeepAlive::Heartbeat { interval, .. } => *interval,
        }
    }
}

/// Exchange-specific callbacks for a streaming connection: where to dial,
/// what to send on open, how to stay alive, and how to read a ticker.
pub trait StreamAdapter: Send + Sync + 'static {
    fn exchange(&self) -> ExchangeId;

    fn ws_url(&self) -> &str;

    /// Subscription payload sent once per connection, if the venue needs one.
    fn subscribe_message(&self) -> Option<serde_json::Value> {
        None
    }

    fn keep_alive(&self) -> KeepAlive;

    /// Extracts a validated price from one inbound text frame. Returns
    /// `None` for frames about other instruments, acknowledgments, or
    /// anything malformed; such frames never fail the connection.
    fn parse_message(&self, text: &str) -> Option<Decimal>;
}

/// One REST ticker endpoint and its payload parser.
#[derive(Clone)]
pub struct RestEndpoint {
    pub url: String,
    pub parse: fn(&serde_json::Value) -> Result<Decimal>,
}

impl std::fmt::Debug for RestEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestEndpoint").field("url", &self.url).finish()
    }
}

/// Built-in per-exchange constants: endpoints, reconnect tuning, and the
/// outbound message budget. Overridable from configuration.
#[derive(Debug, Clone)]
pub struct ExchangeDefaults {
    pub ws_url: &'static str,
    pub rest_primary: &'static str,
    pub rest_fallback: Option<&'static str>,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_attempts: u32,
    pub messages_per_sec: u32,
}

pub fn defaults(exchange: ExchangeId) -> ExchangeDefaults {
    match exchange {
        ExchangeId::Binance => binance::DEFAULTS,
        ExchangeId::Coinbase => coinbase::DEFAULTS,
        ExchangeId::Kraken => kraken::DEFAULTS,
    }
}

pub fn stream_adapter(exchange: ExchangeId) -> Box<dyn StreamAdapter> {
    match exchange {
        ExchangeId::Binance => Box::new(binance::BinanceStream),
        ExchangeId::Coinbase => Box::new(coinbase::CoinbaseStream),
        ExchangeId::Kraken => Box::new(kraken::KrakenStream),
    }
}

/// Primary and optional fallback REST endpoints for an exchange, with the
/// configured URLs substituted in.
pub fn rest_endpoints(
    exchange: ExchangeId,
    primary_url: String,
    fallback_url: Option<String>,
) -> (RestEndpoint, Option<RestEndpoint>) {
    match exchange {
        ExchangeId::Binance => (
            RestEndpoint {
                url: primary_url,
                parse: binance::parse_rest_primary,
            },
            fallback_url.map(|url| RestEndpoint {
                url,
                parse: binance::parse_rest_fallback,
            }),
        ),
        ExchangeId::Coinbase => (
            RestEndpoint {
                url: primary_url,
                parse: coinbase::parse_rest,
            },
            fallback_url.map(|url| RestEndpoint {
                url,
                parse: coinbase::parse_rest,
            }),
        ),
        ExchangeId::Kraken => (
            RestEndpoint {
                url: primary_url,
                parse: kraken::parse_rest,
            },
            fallback_url.map(|url| RestEndpoint {
                url,
                parse: kraken::parse_rest,
            }),
        ),
    }
}

/// Parses a JSON value holding a price (string or number) into a strictly
/// positive `Decimal`.
pub(crate) fn positive_price(value: &serde_json::Value, field: &str) -> Result<Decimal> {
    let price = match value {
        serde_json::Value::String(s) => s
            .parse::<Decimal>()
            .map_err(|_| ArbError::Validation(format!("{field}: not a number: {s:?}")))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| ArbError::Validation(format!("{field}: not a number: {n}")))?,
        other => {
            return Err(ArbError::Protocol(format!(
                "{field}: expected number, got {other}"
            )))
        }
    };
    if price <= Decimal::ZERO {
        return Err(ArbError::Validation(format!(
            "{field}: non-positive price {price}"
        )));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_positive_price_accepts_string_and_number() {
        assert_eq!(positive_price(&json!("97123.45"), "p").unwrap(), dec!(97123.45));
        assert_eq!(positive_price(&json!(42.5), "p").unwrap(), dec!(42.5));
    }

    #[test]
    fn test_positive_price_rejects_garbage() {
        assert!(matches!(
            positive_price(&json!("abc"), "p"),
            Err(ArbError::Validation(_))
        ));
        assert!(matches!(
            positive_price(&json!(0), "p"),
            Err(ArbError::Validation(_))
        ));
        assert!(matches!(
            positive_price(&json!(-5), "p"),
            Err(ArbError::Validation(_))
        ));
        assert!(matches!(
            positive_price(&json!({"x": 1}), "p"),
            Err(ArbError::Protocol(_))
        ));
    }
}
