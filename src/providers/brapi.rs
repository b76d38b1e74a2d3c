//! HTTP quote polling client for the brapi.dev quote API
//!
//! `GET {base_url}/quote/{symbol}` returns
//! ```json
//! {"results": [{"symbol": "PETR4", "regularMarketPrice": 37.5,
//!               "regularMarketDayHigh": 38.1, "regularMarketDayLow": 37.0}]}
//! ```
//! Prices may arrive as numbers or as strings.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{lenient_decimal, Observation, StockProvider};
use crate::config::{env_parse, env_string, ConfigError};
use crate::error::SetupError;

/// Quote API configuration
#[derive(Debug, Clone)]
pub struct BrapiConfig {
    pub base_url: String,
    /// Optional API token, sent as the `token` query parameter
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for BrapiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://brapi.dev/api".to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl BrapiConfig {
    /// STOCKWATCH_BRAPI_URL, STOCKWATCH_BRAPI_TOKEN, STOCKWATCH_BRAPI_TIMEOUT_MS
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timeout_ms = env_parse("STOCKWATCH_BRAPI_TIMEOUT_MS", defaults.timeout.as_millis() as u64)?;
        if timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "brapi_timeout_ms",
                reason: "must be positive",
            });
        }

        Ok(Self {
            base_url: env_string("STOCKWATCH_BRAPI_URL").unwrap_or(defaults.base_url),
            token: env_string("STOCKWATCH_BRAPI_TOKEN"),
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Quote provider backed by the brapi.dev HTTP API
pub struct BrapiProvider {
    client: reqwest::Client,
    config: BrapiConfig,
    cancel: CancellationToken,
}

impl BrapiProvider {
    pub fn new(config: BrapiConfig) -> Result<Self, SetupError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SetupError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            cancel: CancellationToken::new(),
        })
    }

    fn quote_url(&self, symbol: &str) -> String {
        format!("{}/quote/{}", self.config.base_url.trim_end_matches('/'), symbol)
    }

    /// Fetch and decode one quote
    pub async fn fetch(&self, symbol: &str) -> Result<Observation, FetchError> {
        let mut request = self.client.get(self.quote_url(symbol));
        if let Some(token) = &self.config.token {
            request = request.query(&[("token", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        parse_quote(&body)
    }
}

#[async_trait]
impl StockProvider for BrapiProvider {
    fn name(&self) -> &'static str {
        "brapi"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.cancel = cancel.clone();
        Ok(())
    }

    async fn observe(&mut self, symbol: &str) -> Option<Observation> {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            result = self.fetch(symbol) => result,
        };

        match result {
            Ok(observation) => {
                tracing::debug!(
                    symbol = %observation.symbol,
                    price = %observation.current_price,
                    "Fetched quote"
                );
                Some(observation)
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Quote fetch failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    results: Option<Vec<QuoteResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResult {
    #[serde(default)]
    symbol: String,
    #[serde(deserialize_with = "lenient_decimal")]
    regular_market_price: Decimal,
    #[serde(deserialize_with = "lenient_decimal")]
    regular_market_day_high: Decimal,
    #[serde(deserialize_with = "lenient_decimal")]
    regular_market_day_low: Decimal,
}

/// Decode a quote response body into the first result
fn parse_quote(body: &[u8]) -> Result<Observation, FetchError> {
    let response: QuoteResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Deserialization(e.to_string()))?;

    let first = response
        .results
        .and_then(|results| results.into_iter().next())
        .ok_or(FetchError::NoResults)?;

    Ok(Observation {
        symbol: first.symbol,
        current_price: first.regular_market_price,
        day_high: first.regular_market_day_high,
        day_low: first.regular_market_day_low,
    })
}

/// Quote fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Quote API returned status {0}")]
    Status(u16),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("No quote found for the requested symbol")]
    NoResults,
}
