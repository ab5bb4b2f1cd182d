//! Cross-Exchange BTC/USD Arbitrage Monitor
//!
//! Ingests live BTC/USD quotes from several exchanges over streaming
//! WebSocket or polled REST connectors and derives ranked arbitrage
//! opportunities from the latest known price per exchange.

pub mod aggregator;
pub mod arbitrage;
pub mod config;
pub mod connector;
pub mod error;
pub mod exchange;
pub mod limiter;
pub mod retry;
pub mod types;
