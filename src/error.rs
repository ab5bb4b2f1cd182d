//! Error types for the arbitrage monitor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArbError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid price: {0}")]
    Validation(String),

    #[error("rate limit exceeded for {exchange}")]
    RateLimited { exchange: String },

    #[error("reconnect attempts exhausted for {exchange}")]
    ReconnectExhausted { exchange: String },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ArbError>;
