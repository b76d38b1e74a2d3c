//! Threshold and day-record rules for a single stock
//!
//! Three independent rules, evaluated in this order on every observation:
//!
//! 1. **Recommendation**: BUY when the price drops below the buy threshold,
//!    SELL when it rises above the sell threshold. The rule fires once per
//!    crossing; a repeat of the last recommendation is suppressed until the
//!    opposite side fires.
//! 2. **Day high**: alert when the reported day high exceeds the last one
//!    seen.
//! 3. **Day low**: alert when the reported day low is below the last one
//!    seen.
//!
//! The watermark is seeded from the first observation. Afterwards it always
//! takes the latest reported value, so a downward revision of the source's
//! own day high lowers the bar for the next record.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use super::MonitorStrategy;
use crate::alerts::Alert;
use crate::config::{env_bool, ConfigError};
use crate::error::SetupError;
use crate::params::Parameters;
use crate::providers::{Observation, StockProvider};

/// Which rules are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMonitorConfig {
    pub recommendation: bool,
    pub day_high_alert: bool,
    pub day_low_alert: bool,
}

impl Default for StockMonitorConfig {
    fn default() -> Self {
        Self {
            recommendation: true,
            day_high_alert: true,
            day_low_alert: true,
        }
    }
}

impl StockMonitorConfig {
    /// STOCKWATCH_RECOMMENDATION, STOCKWATCH_DAY_HIGH_ALERT, STOCKWATCH_DAY_LOW_ALERT
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            recommendation: env_bool("STOCKWATCH_RECOMMENDATION", true)?,
            day_high_alert: env_bool("STOCKWATCH_DAY_HIGH_ALERT", true)?,
            day_low_alert: env_bool("STOCKWATCH_DAY_LOW_ALERT", true)?,
        })
    }
}

/// Last recommendation issued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Recommendation {
    #[default]
    None,
    Buy,
    Sell,
}

/// Day range last reported by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub day_high: Decimal,
    pub day_low: Decimal,
}

/// Stateful rule engine
#[derive(Debug, Clone)]
pub struct StockRules {
    params: Arc<Parameters>,
    config: StockMonitorConfig,
    recommendation: Recommendation,
    watermark: Option<Watermark>,
}

impl StockRules {
    pub fn new(params: Arc<Parameters>, config: StockMonitorConfig) -> Self {
        Self {
            params,
            config,
            recommendation: Recommendation::None,
            watermark: None,
        }
    }

    pub fn recommendation(&self) -> Recommendation {
        self.recommendation
    }

    pub fn watermark(&self) -> Option<Watermark> {
        self.watermark
    }

    /// Apply every enabled rule to an observation, in rule order
    pub fn evaluate(&mut self, observation: &Observation) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let watermark = self.watermark.get_or_insert(Watermark {
            day_high: observation.day_high,
            day_low: observation.day_low,
        });

        if self.config.recommendation {
            if let Some(alert) = Self::recommend(
                &self.params,
                &mut self.recommendation,
                observation.current_price,
            ) {
                alerts.push(alert);
            }
        }

        if self.config.day_high_alert {
            if observation.day_high > watermark.day_high {
                alerts.push(record_alert(&self.params.symbol, "HIGH", "high", observation.day_high));
            }
            watermark.day_high = observation.day_high;
        }

        if self.config.day_low_alert {
            if observation.day_low < watermark.day_low {
                alerts.push(record_alert(&self.params.symbol, "LOW", "low", observation.day_low));
            }
            watermark.day_low = observation.day_low;
        }

        alerts
    }

    fn recommend(
        params: &Parameters,
        state: &mut Recommendation,
        price: Decimal,
    ) -> Option<Alert> {
        let action = if *state != Recommendation::Buy && price < params.buy_threshold {
            Recommendation::Buy
        } else if *state != Recommendation::Sell && price > params.sell_threshold {
            Recommendation::Sell
        } else {
            return None;
        };

        *state = action;
        let verb = match action {
            Recommendation::Buy => "BUY",
            _ => "SELL",
        };

        Some(Alert::new(
            format!("{} monitor - {}", params.symbol, verb),
            format!(
                "{} reached {:.6} at {}.\nRecommendation: {}",
                params.symbol,
                price,
                timestamp(),
                verb
            ),
        ))
    }
}

fn record_alert(symbol: &str, side: &str, label: &str, value: Decimal) -> Alert {
    Alert::new(
        format!("{} monitor - NEW DAY {} RECORD", symbol, side),
        format!(
            "{} set a new day {} record of {:.6} at {}.",
            symbol,
            label,
            value,
            timestamp()
        ),
    )
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Monitor for one stock: a quote provider feeding [`StockRules`]
pub struct StockMonitor {
    name: String,
    provider: Box<dyn StockProvider>,
    rules: StockRules,
}

impl StockMonitor {
    pub fn new(
        params: Arc<Parameters>,
        config: StockMonitorConfig,
        provider: Box<dyn StockProvider>,
    ) -> Self {
        Self {
            name: format!("stock:{}", provider.name()),
            provider,
            rules: StockRules::new(params, config),
        }
    }

    pub fn rules(&self) -> &StockRules {
        &self.rules
    }
}

#[async_trait]
impl MonitorStrategy for StockMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.provider.setup(cancel).await
    }

    async fn monitor(&mut self) -> Option<Vec<Alert>> {
        let symbol = self.rules.params.symbol.clone();
        let observation = self.provider.observe(&symbol).await?;

        tracing::debug!(
            symbol = %observation.symbol,
            price = %observation.current_price,
            day_high = %observation.day_high,
            day_low = %observation.day_low,
            "Observation received"
        );

        let alerts = self.rules.evaluate(&observation);
        if !alerts.is_empty() {
            tracing::info!(symbol = %symbol, alerts = alerts.len(), "Stock rules fired");
        }
        Some(alerts)
    }
}
