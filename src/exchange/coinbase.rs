//! Coinbase adapter: exchange WebSocket ticker channel plus the v2 spot
//! price REST endpoint.

use super::{positive_price, ExchangeDefaults, KeepAlive, StreamAdapter};
use crate::error::{ArbError, Result};
use crate::types::ExchangeId;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULTS: ExchangeDefaults = ExchangeDefaults {
    ws_url: "wss://ws-feed.exchange.coinbase.com",
    rest_primary: "https://api.coinbase.com/v2/prices/BTC-USD/spot",
    rest_fallback: None,
    reconnect_base_delay: Duration::from_secs(5),
    reconnect_max_attempts: 5,
    messages_per_sec: 8,
};

#[derive(Debug, Deserialize)]
struct TickerMessage {
    #[serde(rename = "type")]
    msg_type: String,
    product_id: Option<String>,
    price: Option<String>,
}

pub struct CoinbaseStream;

impl StreamAdapter for CoinbaseStream {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Coinbase
    }

    fn ws_url(&self) -> &str {
        DEFAULTS.ws_url
    }

    fn subscribe_message(&self) -> Option<serde_json::Value> {
        Some(json!({
            "type": "subscribe",
            "channels": [{ "name": "ticker", "product_ids": ["BTC-USD"] }],
        }))
    }

    fn keep_alive(&self) -> KeepAlive {
        KeepAlive::Heartbeat {
            interval: Duration::from_secs(30),
            payload: json!({ "type": "heartbeat" }),
        }
    }

    fn parse_message(&self, text: &str) -> Option<Decimal> {
        let msg: TickerMessage = serde_json::from_str(text).ok()?;
        if msg.msg_type != "ticker" || msg.product_id.as_deref() != Some("BTC-USD") {
            return None;
        }
        let price: Decimal = msg.price?.parse().ok()?;
        (price > Decimal::ZERO).then_some(price)
    }
}

/// Spot price payload: `{"data": {"amount": "97000.12", ...}}`.
pub fn parse_rest(body: &serde_json::Value) -> Result<Decimal> {
    let raw = body
        .pointer("/data/amount")
        .ok_or_else(|| ArbError::Protocol("coinbase: missing 'data.amount' field".into()))?;
    positive_price(raw, "coinbase.data.amount")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_stream_ticker() {
        let adapter = CoinbaseStream;
        let msg = r#"{"type":"ticker","product_id":"BTC-USD","price":"96850.55","best_bid":"96850.00"}"#;
        assert_eq!(adapter.parse_message(msg), Some(dec!(96850.55)));
    }

    #[test]
    fn test_parse_stream_ignores_subscriptions_and_other_products() {
        let adapter = CoinbaseStream;
        assert_eq!(
            adapter.parse_message(r#"{"type":"subscriptions","channels":[]}"#),
            None
        );
        assert_eq!(
            adapter.parse_message(r#"{"type":"ticker","product_id":"ETH-USD","price":"3400"}"#),
            None
        );
        assert_eq!(
            adapter.parse_message(r#"{"type":"heartbeat","product_id":"BTC-USD"}"#),
            None
        );
    }

    #[test]
    fn test_parse_rest() {
        let body = json!({"data": {"base": "BTC", "currency": "USD", "amount": "96800.00"}});
        assert_eq!(parse_rest(&body).unwrap(), dec!(96800.00));
    }

    #[test]
    fn test_parse_rest_missing_amount() {
        let err = parse_rest(&json!({"data": {"base": "BTC"}})).unwrap_err();
        assert!(matches!(err, ArbError::Protocol(_)));
    }
}
