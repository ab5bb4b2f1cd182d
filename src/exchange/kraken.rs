//! Kraken adapter: v1 WebSocket ticker subscription plus the public
//! Ticker REST endpoint.
//!
//! Kraken frames ticker updates as arrays: `[channel_id, data, "ticker",
//! "XBT/USD"]`, with the last-trade price at `data.c[0]`.

use super::{positive_price, ExchangeDefaults, KeepAlive, StreamAdapter};
use crate::error::{ArbError, Result};
use crate::types::ExchangeId;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULTS: ExchangeDefaults = ExchangeDefaults {
    ws_url: "wss://ws.kraken.com",
    rest_primary: "https://api.kraken.com/0/public/Ticker?pair=XBTUSD",
    rest_fallback: None,
    reconnect_base_delay: Duration::from_secs(10),
    reconnect_max_attempts: 3,
    messages_per_sec: 2,
};

pub struct KrakenStream;

impl StreamAdapter for KrakenStream {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Kraken
    }

    fn ws_url(&self) -> &str {
        DEFAULTS.ws_url
    }

    fn subscribe_message(&self) -> Option<Value> {
        Some(json!({
            "event": "subscribe",
            "pair": ["XBT/USD"],
            "subscription": { "name": "ticker" },
        }))
    }

    fn keep_alive(&self) -> KeepAlive {
        KeepAlive::Ping {
            interval: Duration::from_secs(30),
        }
    }

    fn parse_message(&self, text: &str) -> Option<Decimal> {
        let msg: Value = serde_json::from_str(text).ok()?;
        let frame = msg.as_array()?;
        if frame.len() < 4
            || frame[2].as_str() != Some("ticker")
            || frame[3].as_str() != Some("XBT/USD")
        {
            return None;
        }
        let price: Decimal = frame[1].pointer("/c/0")?.as_str()?.parse().ok()?;
        (price > Decimal::ZERO).then_some(price)
    }
}

/// Public ticker payload: `{"error": [], "result": {"XXBTZUSD": {"c":
/// ["97000.1", "0.02"], ...}}}`. A non-empty `error` array is surfaced as
/// a protocol error.
pub fn parse_rest(body: &Value) -> Result<Decimal> {
    if let Some(errors) = body.get("error").and_then(Value::as_array) {
        if let Some(first) = errors.first().and_then(Value::as_str) {
            return Err(ArbError::Protocol(format!("kraken API error: {first}")));
        }
    }
    let raw = body
        .pointer("/result/XXBTZUSD/c/0")
        .ok_or_else(|| ArbError::Protocol("kraken: missing 'result.XXBTZUSD.c[0]' field".into()))?;
    positive_price(raw, "kraken.result.XXBTZUSD.c[0]")
}
