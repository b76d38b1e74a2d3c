//! Latency and failure simulation shared by the synthetic transports
//!
//! Latency follows a normal distribution sampled with the Box–Muller
//! transform and clamped at zero. Failure is a uniform [0, 1) draw compared
//! against a fixed probability.

use std::f64::consts::PI;
use std::time::Duration;

use rand::Rng;

use crate::config::{env_parse, ConfigError};

/// Sample `N(mean, std_dev)` with the Box–Muller transform
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    // gen::<f64>() is in [0, 1); flip it so ln() never sees zero
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = 1.0 - rng.gen::<f64>();

    let standard_normal = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin();
    mean + standard_normal * std_dev
}

/// Latency/failure profile of a simulated channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyModel {
    /// Mean latency in milliseconds
    pub average_latency_ms: f64,
    /// Standard deviation of the latency in milliseconds
    pub std_latency_ms: f64,
    /// Probability in [0, 1] that a call fails
    pub failure_rate: f64,
}

impl LatencyModel {
    /// Read `{prefix}_AVG_LATENCY_MS`, `{prefix}_STD_LATENCY_MS` and
    /// `{prefix}_FAILURE_RATE`
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let model = Self {
            average_latency_ms: env_parse(&format!("{}_AVG_LATENCY_MS", prefix), 0.0)?,
            std_latency_ms: env_parse(&format!("{}_STD_LATENCY_MS", prefix), 0.0)?,
            failure_rate: env_parse(&format!("{}_FAILURE_RATE", prefix), 0.0)?,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.average_latency_ms < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "average_latency_ms",
                reason: "must be greater than or equal to zero",
            });
        }
        if self.std_latency_ms < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "std_latency_ms",
                reason: "must be greater than or equal to zero",
            });
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::OutOfRange {
                field: "failure_rate",
                reason: "must be between 0 and 1",
            });
        }
        Ok(())
    }

    /// Draw a latency, rounded to whole milliseconds and never negative
    pub fn sample_latency<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let millis = gaussian(rng, self.average_latency_ms, self.std_latency_ms).round();
        Duration::from_millis(millis.max(0.0) as u64)
    }

    /// Decide whether this call fails
    pub fn roll_failure<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.failure_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_gaussian_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f64> = (0..20_000).map(|_| gaussian(&mut rng, 10.0, 2.0)).collect();

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance =
            samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;

        assert!((mean - 10.0).abs() < 0.1, "mean was {}", mean);
        assert!((variance.sqrt() - 2.0).abs() < 0.1, "std was {}", variance.sqrt());
    }

    #[test]
    fn test_zero_std_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian(&mut rng, 3.5, 0.0), 3.5);
    }

    #[test]
    fn test_latency_clamped_at_zero() {
        let model = LatencyModel {
            average_latency_ms: -1000.0,
            std_latency_ms: 1.0,
            failure_rate: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(model.sample_latency(&mut rng), Duration::ZERO);
        }
    }

    #[test]
    fn test_failure_rate_extremes() {
        let mut rng = StdRng::seed_from_u64(9);
        let never = LatencyModel::default();
        let always = LatencyModel {
            failure_rate: 1.0,
            ..LatencyModel::default()
        };

        for _ in 0..100 {
            assert!(!never.roll_failure(&mut rng));
            assert!(always.roll_failure(&mut rng));
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let model = LatencyModel {
            failure_rate: 1.5,
            ..LatencyModel::default()
        };
        assert!(model.validate().is_err());

        let model = LatencyModel {
            std_latency_ms: -1.0,
            ..LatencyModel::default()
        };
        assert!(model.validate().is_err());
    }
}
