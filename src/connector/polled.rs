//! Polled connector: rate-limited REST ticker fetch with a bounded retry
//! loop and a fallback endpoint.

use super::PriceConnector;
use crate::config::ExchangeConfig;
use crate::error::{ArbError, Result};
use crate::exchange::{self, RestEndpoint};
use crate::limiter::RateLimiter;
use crate::retry::{retry_with_timeout, RetryPolicy};
use crate::types::{ExchangeId, Quote};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::ACCEPT;
use rust_decimal::Decimal;
use tracing::warn;

pub struct PolledConnector {
    exchange: ExchangeId,
    http: reqwest::Client,
    limiter: RateLimiter,
    primary: RestEndpoint,
    fallback: Option<RestEndpoint>,
    retry: RetryPolicy,
}

impl PolledConnector {
    pub fn new(cfg: &ExchangeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        let (limit, window) = cfg.rate_limit();
        let (primary, fallback) =
            exchange::rest_endpoints(cfg.exchange, cfg.rest_primary(), cfg.rest_fallback());

        Ok(Self {
            exchange: cfg.exchange,
            http,
            limiter: RateLimiter::new(limit, window),
            primary,
            fallback,
            retry: cfg.retry_policy(),
        })
    }

    /// Single request against one endpoint; non-success status is a
    /// transport failure, body problems surface from the parser.
    async fn fetch(&self, endpoint: &RestEndpoint) -> Result<Decimal> {
        let resp = self
            .http
            .get(&endpoint.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ArbError::Transport(format!("HTTP {status}")));
        }
        let body: serde_json::Value = resp.json().await?;
        (endpoint.parse)(&body)
    }

    async fn fetch_with_retry(&self, endpoint: &RestEndpoint) -> Result<Decimal> {
        let label = format!("{} {}", self.exchange, endpoint.url);
        retry_with_timeout(self.retry, &label, || self.fetch(endpoint)).await
    }
}

#[async_trait]
impl PriceConnector for PolledConnector {
    fn exchange_id(&self) -> ExchangeId {
        self.exchange
    }

    async fn current_price(&self) -> Quote {
        self.limiter.acquire().await;

        let primary_err = match self.fetch_with_retry(&self.primary).await {
            Ok(price) => return Quote::price(self.exchange, price, Utc::now()),
            Err(e) => e,
        };
        warn!(
            exchange = %self.exchange,
            "primary endpoint failed: {primary_err}, trying fallback"
        );

        match &self.fallback {
            Some(fallback) => match self.fetch_with_retry(fallback).await {
                Ok(price) => Quote::price(self.exchange, price, Utc::now()),
                Err(fallback_err) => Quote::failed(
                    self.exchange,
                    format!("primary: {primary_err}; fallback: {fallback_err}"),
                    Utc::now(),
                ),
            },
            None => Quote::failed(self.exchange, primary_err.to_string(), Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectorMode, RateLimitConfig, RetryConfig};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(exchange: ExchangeId, primary: String, fallback: Option<String>) -> ExchangeConfig {
        let mut cfg = ExchangeConfig::new(exchange, ConnectorMode::Polled);
        cfg.rest_primary = Some(primary);
        cfg.rest_fallback = fallback;
        cfg.rate_limit = Some(RateLimitConfig {
            limit: 100,
            window_ms: 1_000,
        });
        cfg.retry = RetryConfig {
            attempts: 2,
            delay_ms: 1,
            timeout_ms: 2_000,
        };
        cfg
    }

    #[tokio::test]
    async fn test_primary_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ticker"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "BTCUSDT",
                "price": "97100.25"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(ExchangeId::Binance, format!("{}/ticker", server.uri()), None);
        let connector = PolledConnector::new(&cfg).unwrap();
        let quote = connector.current_price().await;
        assert_eq!(quote.price, Some(dec!(97100.25)));
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spot"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/24hr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "BTCUSDT",
                "lastPrice": "97050.00"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(
            ExchangeId::Binance,
            format!("{}/spot", server.uri()),
            Some(format!("{}/24hr", server.uri())),
        );
        let connector = PolledConnector::new(&cfg).unwrap();
        let quote = connector.current_price().await;
        assert_eq!(quote.price, Some(dec!(97050.00)));
    }

    #[tokio::test]
    async fn test_error_quote_when_both_endpoints_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let cfg = test_config(
            ExchangeId::Binance,
            format!("{}/spot", server.uri()),
            Some(format!("{}/24hr", server.uri())),
        );
        let connector = PolledConnector::new(&cfg).unwrap();
        let quote = connector.current_price().await;
        assert!(quote.price.is_none());
        let error = quote.error.unwrap();
        assert!(error.contains("primary"));
        assert!(error.contains("fallback"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_failure_not_crash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "base": "BTC" }
            })))
            .mount(&server)
            .await;

        let cfg = test_config(ExchangeId::Coinbase, format!("{}/spot", server.uri()), None);
        let connector = PolledConnector::new(&cfg).unwrap();
        let quote = connector.current_price().await;
        assert!(quote.price.is_none());
        assert!(quote.error.unwrap().contains("data.amount"));
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "price": "96999.00"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(ExchangeId::Binance, format!("{}/ticker", server.uri()), None);
        let connector = PolledConnector::new(&cfg).unwrap();
        let quote = connector.current_price().await;
        assert_eq!(quote.price, Some(dec!(96999.00)));
    }
}
