//! Pipeline configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::policy::FailurePolicy;
use crate::config::{env_bool, env_parse, ConfigError};

/// How the monitor and alert loops are wired together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Separate monitor and alert tasks joined by a bounded queue
    #[default]
    TwoLoop,
    /// One task that monitors and delivers inline, no queue
    SingleLoop,
}

impl FromStr for Topology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-loop" | "two_loop" | "split" => Ok(Topology::TwoLoop),
            "single-loop" | "single_loop" | "all-in-one" => Ok(Topology::SingleLoop),
            other => Err(ConfigError::Unknown {
                kind: "topology",
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::TwoLoop => write!(f, "two-loop"),
            Topology::SingleLoop => write!(f, "single-loop"),
        }
    }
}

/// Loop timing, queue sizing and failure tolerance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub topology: Topology,
    pub queue_capacity: usize,
    /// Pause between monitor ticks
    pub monitor_interval: Duration,
    /// Pause after each fully delivered alert
    pub alert_throttle: Duration,
    pub allow_monitoring_failure: bool,
    pub allow_alerting_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: Topology::TwoLoop,
            queue_capacity: 100,
            monitor_interval: Duration::from_millis(5000),
            alert_throttle: Duration::from_millis(200),
            allow_monitoring_failure: false,
            allow_alerting_failure: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables
    /// STOCKWATCH_TOPOLOGY=two-loop|single-loop
    /// STOCKWATCH_QUEUE_CAPACITY=100
    /// STOCKWATCH_MONITOR_INTERVAL_MS=5000
    /// STOCKWATCH_ALERT_THROTTLE_MS=200
    /// STOCKWATCH_ALLOW_MONITORING_FAILURE=false
    /// STOCKWATCH_ALLOW_ALERTING_FAILURE=false
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            topology: env_parse("STOCKWATCH_TOPOLOGY", defaults.topology)?,
            queue_capacity: env_parse("STOCKWATCH_QUEUE_CAPACITY", defaults.queue_capacity)?,
            monitor_interval: Duration::from_millis(env_parse(
                "STOCKWATCH_MONITOR_INTERVAL_MS",
                5000u64,
            )?),
            alert_throttle: Duration::from_millis(env_parse("STOCKWATCH_ALERT_THROTTLE_MS", 200u64)?),
            allow_monitoring_failure: env_bool(
                "STOCKWATCH_ALLOW_MONITORING_FAILURE",
                defaults.allow_monitoring_failure,
            )?,
            allow_alerting_failure: env_bool(
                "STOCKWATCH_ALLOW_ALERTING_FAILURE",
                defaults.allow_alerting_failure,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "queue_capacity",
                reason: "must be at least 1",
            });
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "monitor_interval_ms",
                reason: "must be positive",
            });
        }
        if self.alert_throttle.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "alert_throttle_ms",
                reason: "must be positive",
            });
        }
        Ok(())
    }

    pub fn monitoring_policy(&self) -> FailurePolicy {
        FailurePolicy::from_allow(self.allow_monitoring_failure)
    }

    pub fn alerting_policy(&self) -> FailurePolicy {
        FailurePolicy::from_allow(self.allow_alerting_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitoring_policy(), FailurePolicy::Abort);
        assert_eq!(config.alerting_policy(), FailurePolicy::Abort);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = PipelineConfig {
            monitor_interval: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "monitor_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_topology_parsing() {
        assert_eq!("single-loop".parse::<Topology>().unwrap(), Topology::SingleLoop);
        assert_eq!("Two-Loop".parse::<Topology>().unwrap(), Topology::TwoLoop);
        assert!("pipeline".parse::<Topology>().is_err());
        assert_eq!(Topology::SingleLoop.to_string(), "single-loop");
    }
}
