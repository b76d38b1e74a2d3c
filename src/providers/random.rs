//! Synthetic random-walk quote source
//!
//! Every call waits a simulated network latency, moves the price by a
//! normally distributed step scaled by the time since the previous call,
//! and fails with a fixed probability.

use std::time::Instant;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use super::{Observation, StockProvider};
use crate::config::{env_parse, ConfigError};
use crate::error::SetupError;
use crate::sim::{gaussian, LatencyModel};

/// Random walk configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RandomStockConfig {
    pub start_price: Decimal,
    pub day_high: Decimal,
    pub day_low: Decimal,
    /// Standard deviation of the price step per second
    pub std_stock: f64,
    pub latency: LatencyModel,
}

impl Default for RandomStockConfig {
    fn default() -> Self {
        Self {
            start_price: Decimal::new(30, 0),
            day_high: Decimal::new(31, 0),
            day_low: Decimal::new(29, 0),
            std_stock: 0.05,
            latency: LatencyModel::default(),
        }
    }
}

impl RandomStockConfig {
    /// Create config from environment variables
    /// STOCKWATCH_RANDOM_START_PRICE=30
    /// STOCKWATCH_RANDOM_DAY_HIGH=31
    /// STOCKWATCH_RANDOM_DAY_LOW=29
    /// STOCKWATCH_RANDOM_STD_STOCK=0.05
    /// STOCKWATCH_RANDOM_AVG_LATENCY_MS / _STD_LATENCY_MS / _FAILURE_RATE
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            start_price: env_parse("STOCKWATCH_RANDOM_START_PRICE", defaults.start_price)?,
            day_high: env_parse("STOCKWATCH_RANDOM_DAY_HIGH", defaults.day_high)?,
            day_low: env_parse("STOCKWATCH_RANDOM_DAY_LOW", defaults.day_low)?,
            std_stock: env_parse("STOCKWATCH_RANDOM_STD_STOCK", defaults.std_stock)?,
            latency: LatencyModel::from_env("STOCKWATCH_RANDOM")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let out_of_range = |field, reason| Err(ConfigError::OutOfRange { field, reason });

        if self.start_price.is_sign_negative() {
            return out_of_range("start_price", "must be greater than or equal to zero");
        }
        if self.day_low.is_sign_negative() {
            return out_of_range("day_low", "must be greater than or equal to zero");
        }
        if self.day_high.is_sign_negative() {
            return out_of_range("day_high", "must be greater than or equal to zero");
        }
        if self.day_high < self.day_low {
            return out_of_range("day_high", "must be greater than or equal to day_low");
        }
        if self.start_price < self.day_low || self.start_price > self.day_high {
            return out_of_range("start_price", "must be between day_low and day_high");
        }
        if self.std_stock < 0.0 {
            return out_of_range("std_stock", "must be greater than or equal to zero");
        }
        self.latency.validate()
    }
}

/// Random walk provider
pub struct RandomStockProvider {
    price: Decimal,
    day_high: Decimal,
    day_low: Decimal,
    std_stock: f64,
    latency: LatencyModel,
    last_step: Instant,
    rng: StdRng,
    cancel: CancellationToken,
}

impl RandomStockProvider {
    pub fn new(config: RandomStockConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a provider with a caller-supplied RNG (deterministic in tests)
    pub fn with_rng(config: RandomStockConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            price: config.start_price,
            day_high: config.day_high,
            day_low: config.day_low,
            std_stock: config.std_stock,
            latency: config.latency,
            last_step: Instant::now(),
            rng,
            cancel: CancellationToken::new(),
        })
    }

    fn step_price(&mut self) {
        let elapsed_secs = self.last_step.elapsed().as_secs_f64();
        let variation_per_second = gaussian(&mut self.rng, 0.0, self.std_stock);
        let step = Decimal::from_f64(variation_per_second * elapsed_secs).unwrap_or_default();

        self.price = (self.price + step).max(Decimal::ZERO);
        self.day_high = self.day_high.max(self.price);
        self.day_low = self.day_low.min(self.price);
        self.last_step = Instant::now();
    }
}

#[async_trait]
impl StockProvider for RandomStockProvider {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.cancel = cancel.clone();
        Ok(())
    }

    async fn observe(&mut self, symbol: &str) -> Option<Observation> {
        let latency = self.latency.sample_latency(&mut self.rng);

        tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!("Random quote interrupted by cancellation");
                return None;
            }
            _ = tokio::time::sleep(latency) => {}
        }

        self.step_price();

        if self.latency.roll_failure(&mut self.rng) {
            tracing::warn!(symbol = %symbol, "Simulated quote fetch failure");
            return None;
        }

        tracing::debug!(symbol = %symbol, price = %self.price, "Generated random quote");

        Some(Observation {
            symbol: symbol.to_string(),
            current_price: self.price,
            day_high: self.day_high,
            day_low: self.day_low,
        })
    }
}
