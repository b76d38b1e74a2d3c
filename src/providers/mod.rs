//! Data sources feeding the monitors
//!
//! - [`StockProvider`]: one quote observation per call (random walk, HTTP
//!   quote API, or a pub/sub subscriber with the `kafka` feature)
//! - [`MessageRelay`]: free-text messages pushed in by some external party,
//!   drained in arrival order

pub mod brapi;
pub mod inbox;
pub mod random;

pub use brapi::{BrapiConfig, BrapiProvider};
pub use inbox::MessageInbox;
pub use random::{RandomStockConfig, RandomStockProvider};

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::SetupError;

/// A single quote snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub symbol: String,
    pub current_price: Decimal,
    pub day_high: Decimal,
    pub day_low: Decimal,
}

/// Source of quote observations
#[async_trait]
pub trait StockProvider: Send {
    fn name(&self) -> &'static str;

    /// Connect/subscribe. Called once before the first observation.
    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError>;

    /// Fetch the latest observation. `None` signals a transient failure.
    async fn observe(&mut self, symbol: &str) -> Option<Observation>;
}

/// Inbound relay message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub content: String,
}

/// Source of relayed free-text messages
#[async_trait]
pub trait MessageRelay: Send {
    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError>;

    /// Take every message received since the last drain, oldest first.
    /// `None` signals a relay failure; an empty vector is a quiet period.
    fn drain(&mut self) -> Option<Vec<RelayMessage>>;
}

/// Deserialize a decimal sent either as a JSON number or as a string
pub(crate) fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    decimal_from_json(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a decimal, got {}", value)))
}

fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    let raw = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_from_number_and_string() {
        assert_eq!(decimal_from_json(&json!(31.25)), Some(Decimal::new(3125, 2)));
        assert_eq!(decimal_from_json(&json!("31.25")), Some(Decimal::new(3125, 2)));
        assert_eq!(decimal_from_json(&json!(42)), Some(Decimal::new(42, 0)));
    }

    #[test]
    fn test_decimal_from_scientific() {
        assert_eq!(decimal_from_json(&json!("1.5e2")), Some(Decimal::new(150, 0)));
    }

    #[test]
    fn test_decimal_rejects_other_types() {
        assert_eq!(decimal_from_json(&json!(null)), None);
        assert_eq!(decimal_from_json(&json!("abc")), None);
        assert_eq!(decimal_from_json(&json!([1])), None);
    }
}
