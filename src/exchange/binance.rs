//! Binance.US adapter: `btcusdt@ticker` stream plus spot/24hr REST tickers.

use super::{positive_price, ExchangeDefaults, KeepAlive, StreamAdapter};
use crate::error::{ArbError, Result};
use crate::types::ExchangeId;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULTS: ExchangeDefaults = ExchangeDefaults {
    ws_url: "wss://stream.binance.us:9443/ws/btcusdt@ticker",
    rest_primary: "https://api.binance.us/api/v3/ticker/price?symbol=BTCUSDT",
    rest_fallback: Some("https://api.binance.us/api/v3/ticker/24hr?symbol=BTCUSDT"),
    reconnect_base_delay: Duration::from_secs(2),
    reconnect_max_attempts: 3,
    messages_per_sec: 5,
};

/// 24hr ticker event pushed on the `@ticker` stream.
#[derive(Debug, Deserialize)]
struct TickerEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    close_price: String,
}

pub struct BinanceStream;

impl StreamAdapter for BinanceStream {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn ws_url(&self) -> &str {
        DEFAULTS.ws_url
    }

    // The instrument is baked into the stream URL; no subscribe frame.

    fn keep_alive(&self) -> KeepAlive {
        KeepAlive::Ping {
            interval: Duration::from_secs(120),
        }
    }

    fn parse_message(&self, text: &str) -> Option<Decimal> {
        let event: TickerEvent = serde_json::from_str(text).ok()?;
        if event.symbol != "BTCUSDT" {
            return None;
        }
        let price: Decimal = event.close_price.parse().ok()?;
        (price > Decimal::ZERO).then_some(price)
    }
}

/// Spot ticker payload: `{"symbol": "BTCUSDT", "price": "97000.12"}`.
pub fn parse_rest_primary(body: &serde_json::Value) -> Result<Decimal> {
    let raw = body
        .get("price")
        .ok_or_else(|| ArbError::Protocol("binance: missing 'price' field".into()))?;
    positive_price(raw, "binance.price")
}

/// 24hr ticker payload; `lastPrice` is the most recent trade, accepted as
/// an approximation of spot when the primary endpoint is down.
pub fn parse_rest_fallback(body: &serde_json::Value) -> Result<Decimal> {
    let raw = body
        .get("lastPrice")
        .ok_or_else(|| ArbError::Protocol("binance: missing 'lastPrice' field".into()))?;
    positive_price(raw, "binance.lastPrice")
}
