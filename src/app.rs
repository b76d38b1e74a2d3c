//! Wiring: turns environment configuration into ordered strategy lists

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{env_list, env_parse, ConfigError};
use crate::delivery::{
    ConsoleDelivery, DeliveryStrategy, SmtpConfig, SmtpDelivery, WebhookConfig, WebhookDelivery,
};
use crate::error::SetupError;
use crate::monitor::{MonitorStrategy, RelayMonitor, StockMonitor, StockMonitorConfig};
use crate::params::{Parameters, ParamsError};
use crate::pipeline::{PipelineConfig, PipelineError};
use crate::providers::{
    BrapiConfig, BrapiProvider, RandomStockConfig, RandomStockProvider, StockProvider,
};
use crate::sim::LatencyModel;

#[cfg(feature = "kafka")]
use crate::pubsub::{KafkaDelivery, KafkaRelay, KafkaStockProvider, PubSubConfig};

/// Quote source for the stock monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Random,
    Brapi,
    Kafka,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(ProviderKind::Random),
            "brapi" => Ok(ProviderKind::Brapi),
            "kafka" => Ok(ProviderKind::Kafka),
            other => Err(ConfigError::Unknown {
                kind: "provider",
                name: other.to_string(),
            }),
        }
    }
}

/// Optional relay monitor source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayKind {
    #[default]
    None,
    Kafka,
}

impl FromStr for RelayKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(RelayKind::None),
            "kafka" => Ok(RelayKind::Kafka),
            other => Err(ConfigError::Unknown {
                kind: "relay",
                name: other.to_string(),
            }),
        }
    }
}

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Console,
    Smtp,
    Webhook,
    Kafka,
}

impl FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(ChannelKind::Console),
            "smtp" | "email" => Ok(ChannelKind::Smtp),
            "webhook" => Ok(ChannelKind::Webhook),
            "kafka" => Ok(ChannelKind::Kafka),
            other => Err(ConfigError::Unknown {
                kind: "channel",
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Console => "console",
            ChannelKind::Smtp => "smtp",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Kafka => "kafka",
        };
        write!(f, "{}", name)
    }
}

/// Everything the binary needs besides the positional parameters
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub provider: ProviderKind,
    pub relay: RelayKind,
    /// Delivery order
    pub channels: Vec<ChannelKind>,
    pub rules: StockMonitorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            provider: ProviderKind::Random,
            relay: RelayKind::None,
            channels: vec![ChannelKind::Console],
            rules: StockMonitorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create config from environment variables
    /// STOCKWATCH_PROVIDER=random|brapi|kafka
    /// STOCKWATCH_RELAY=none|kafka
    /// STOCKWATCH_CHANNELS=console,smtp,webhook,kafka
    pub fn from_env() -> Result<Self, ConfigError> {
        let channels = match env_list("STOCKWATCH_CHANNELS") {
            Some(names) => names
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<ChannelKind>, _>>()?,
            None => vec![ChannelKind::Console],
        };

        Ok(Self {
            pipeline: PipelineConfig::from_env()?,
            provider: env_parse("STOCKWATCH_PROVIDER", ProviderKind::Random)?,
            relay: env_parse("STOCKWATCH_RELAY", RelayKind::None)?,
            channels,
            rules: StockMonitorConfig::from_env()?,
        })
    }

    /// Build the monitor list: the stock monitor, then the relay monitor if enabled
    pub fn build_monitors(&self, params: Arc<Parameters>) -> Result<Vec<Box<dyn MonitorStrategy>>, AppError> {
        let mut monitors: Vec<Box<dyn MonitorStrategy>> = vec![Box::new(StockMonitor::new(
            params,
            self.rules,
            build_provider(self.provider)?,
        ))];

        match self.relay {
            RelayKind::None => {}
            RelayKind::Kafka => monitors.push(Box::new(RelayMonitor::new(kafka_relay()?))),
        }

        Ok(monitors)
    }

    /// Build the channel list in configured order
    pub fn build_channels(&self) -> Result<Vec<Box<dyn DeliveryStrategy>>, AppError> {
        if self.channels.is_empty() {
            return Err(AppError::Config(ConfigError::OutOfRange {
                field: "channels",
                reason: "at least one delivery channel is required",
            }));
        }

        self.channels
            .iter()
            .map(|kind| build_channel(*kind))
            .collect()
    }
}

fn build_provider(kind: ProviderKind) -> Result<Box<dyn StockProvider>, AppError> {
    let provider: Box<dyn StockProvider> = match kind {
        ProviderKind::Random => Box::new(RandomStockProvider::new(RandomStockConfig::from_env()?)?),
        ProviderKind::Brapi => Box::new(BrapiProvider::new(BrapiConfig::from_env()?)?),
        ProviderKind::Kafka => kafka_provider()?,
    };
    Ok(provider)
}

fn build_channel(kind: ChannelKind) -> Result<Box<dyn DeliveryStrategy>, AppError> {
    let channel: Box<dyn DeliveryStrategy> = match kind {
        ChannelKind::Console => Box::new(ConsoleDelivery::new(LatencyModel::from_env(
            "STOCKWATCH_CONSOLE",
        )?)),
        ChannelKind::Smtp => Box::new(SmtpDelivery::new(SmtpConfig::from_env()?)?),
        ChannelKind::Webhook => Box::new(WebhookDelivery::new(WebhookConfig::from_env()?)?),
        ChannelKind::Kafka => kafka_channel()?,
    };
    Ok(channel)
}

#[cfg(feature = "kafka")]
fn kafka_provider() -> Result<Box<dyn StockProvider>, AppError> {
    Ok(Box::new(KafkaStockProvider::new(PubSubConfig::from_env()?)))
}

#[cfg(not(feature = "kafka"))]
fn kafka_provider() -> Result<Box<dyn StockProvider>, AppError> {
    Err(ConfigError::FeatureDisabled("provider kafka".to_string()).into())
}

#[cfg(feature = "kafka")]
fn kafka_relay() -> Result<Box<dyn crate::providers::MessageRelay>, AppError> {
    Ok(Box::new(KafkaRelay::new(PubSubConfig::from_env()?)))
}

#[cfg(not(feature = "kafka"))]
fn kafka_relay() -> Result<Box<dyn crate::providers::MessageRelay>, AppError> {
    Err(ConfigError::FeatureDisabled("relay kafka".to_string()).into())
}

#[cfg(feature = "kafka")]
fn kafka_channel() -> Result<Box<dyn DeliveryStrategy>, AppError> {
    Ok(Box::new(KafkaDelivery::new(PubSubConfig::from_env()?)))
}

#[cfg(not(feature = "kafka"))]
fn kafka_channel() -> Result<Box<dyn DeliveryStrategy>, AppError> {
    Err(ConfigError::FeatureDisabled("channel kafka".to_string()).into())
}

/// Startup errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Pipeline aborted: {0}")]
    Aborted(String),
}
