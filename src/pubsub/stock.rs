//! Quote subscriber

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{spawn_subscriber, ParseError, PubSubConfig};
use crate::error::SetupError;
use crate::providers::{lenient_decimal, Observation, StockProvider};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteMessage {
    symbol: String,
    #[serde(deserialize_with = "lenient_decimal")]
    price: Decimal,
    #[serde(deserialize_with = "lenient_decimal")]
    day_high: Decimal,
    #[serde(deserialize_with = "lenient_decimal")]
    day_low: Decimal,
}

fn parse_quote(payload: &[u8]) -> Result<Observation, ParseError> {
    let quote: QuoteMessage = serde_json::from_slice(payload)?;
    let symbol = quote.symbol.trim();
    if symbol.is_empty() {
        return Err(ParseError::Invalid("missing symbol"));
    }

    Ok(Observation {
        symbol: symbol.to_string(),
        current_price: quote.price,
        day_high: quote.day_high,
        day_low: quote.day_low,
    })
}

/// Serves the most recent quote received for each symbol.
///
/// `observe` fails until a first quote for the symbol has arrived.
pub struct KafkaStockProvider {
    config: PubSubConfig,
    latest: Arc<DashMap<String, Observation>>,
    subscriber: Option<JoinHandle<()>>,
}

impl KafkaStockProvider {
    pub fn new(config: PubSubConfig) -> Self {
        Self {
            config,
            latest: Arc::new(DashMap::new()),
            subscriber: None,
        }
    }

    fn record(latest: &DashMap<String, Observation>, payload: &[u8]) -> Result<(), ParseError> {
        let observation = parse_quote(payload)?;
        tracing::debug!(symbol = %observation.symbol, price = %observation.current_price, "Quote received");
        latest.insert(observation.symbol.clone(), observation);
        Ok(())
    }
}

#[async_trait]
impl StockProvider for KafkaStockProvider {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        let latest = Arc::clone(&self.latest);
        let handle = spawn_subscriber(
            &self.config,
            &self.config.stock_topic,
            cancel.clone(),
            move |payload| Self::record(&latest, payload),
        )
        .map_err(|e| SetupError::Transport(format!("Kafka subscribe failed: {}", e)))?;

        self.subscriber = Some(handle);
        Ok(())
    }

    async fn observe(&mut self, symbol: &str) -> Option<Observation> {
        let observation = self.latest.get(symbol).map(|entry| entry.value().clone());
        if observation.is_none() {
            tracing::debug!(symbol = %symbol, "No quote received yet");
        }
        observation
    }
}

impl Drop for KafkaStockProvider {
    fn drop(&mut self) {
        if let Some(handle) = self.subscriber.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote_mixed_number_formats() {
        let payload = br#"{"symbol": "PETR4", "price": 31.2, "dayHigh": "31.9", "dayLow": 30.8}"#;
        let observation = parse_quote(payload).unwrap();

        assert_eq!(observation.symbol, "PETR4");
        assert_eq!(observation.current_price, Decimal::new(312, 1));
        assert_eq!(observation.day_high, Decimal::new(319, 1));
        assert_eq!(observation.day_low, Decimal::new(308, 1));
    }

    #[test]
    fn test_parse_quote_rejects_missing_fields() {
        assert!(parse_quote(br#"{"symbol": "PETR4", "price": 31.2}"#).is_err());
        assert!(parse_quote(br#"{"symbol": " ", "price": 1, "dayHigh": 1, "dayLow": 1}"#).is_err());
        assert!(parse_quote(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_observe_returns_latest_quote() {
        let mut provider = KafkaStockProvider::new(PubSubConfig::default());

        assert_eq!(provider.observe("VALE3").await, None);

        KafkaStockProvider::record(
            &provider.latest,
            br#"{"symbol": "VALE3", "price": 60, "dayHigh": 61, "dayLow": 59}"#,
        )
        .unwrap();
        KafkaStockProvider::record(
            &provider.latest,
            br#"{"symbol": "VALE3", "price": 62, "dayHigh": 62, "dayLow": 59}"#,
        )
        .unwrap();

        let observation = provider.observe("VALE3").await.unwrap();
        assert_eq!(observation.current_price, Decimal::new(62, 0));
        assert_eq!(provider.observe("PETR4").await, None);
    }
}
