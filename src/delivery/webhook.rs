//! HTTP webhook delivery

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::DeliveryStrategy;
use crate::alerts::Alert;
use crate::config::{env_parse, env_required, env_string, ConfigError};
use crate::error::SetupError;

/// Webhook configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Extra request headers
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Create config from environment variables
    /// STOCKWATCH_WEBHOOK_URL=https://hooks.example.com/alerts
    /// STOCKWATCH_WEBHOOK_HEADERS=Authorization:Bearer abc,X-Team:desk
    /// STOCKWATCH_WEBHOOK_TIMEOUT_MS=10000
    pub fn from_env() -> Result<Self, ConfigError> {
        let headers = env_string("STOCKWATCH_WEBHOOK_HEADERS")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|pair| {
                        let (key, value) = pair.split_once(':')?;
                        Some((key.trim().to_string(), value.trim().to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let timeout_ms: u64 = env_parse("STOCKWATCH_WEBHOOK_TIMEOUT_MS", 10_000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "webhook_timeout_ms",
                reason: "must be positive",
            });
        }

        Ok(Self {
            url: env_required("STOCKWATCH_WEBHOOK_URL")?,
            headers,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Posts each alert as JSON to a webhook URL
pub struct WebhookDelivery {
    client: reqwest::Client,
    config: WebhookConfig,
    cancel: CancellationToken,
}

impl WebhookDelivery {
    pub fn new(config: WebhookConfig) -> Result<Self, SetupError> {
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

    fn payload(alert: &Alert) -> serde_json::Value {
        serde_json::json!({
            "topic": alert.topic(),
            "message": alert.message(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn post(&self, alert: &Alert) -> Result<(), String> {
        let mut request = self.client.post(&self.config.url).json(&Self::payload(alert));

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Failed to send webhook: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Webhook returned status {}", response.status()));
        }

        Ok(())
    }
}

#[async_trait]
impl DeliveryStrategy for WebhookDelivery {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.cancel = cancel.clone();
        Ok(())
    }

    async fn send(&mut self, alert: &Alert) -> bool {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            result = self.post(alert) => result,
        };

        match result {
            Ok(()) => {
                tracing::debug!(url = %self.config.url, "Webhook notification sent");
                true
            }
            Err(e) => {
                tracing::warn!(url = %self.config.url, error = %e, "Webhook delivery failed");
                false
            }
        }
    }
}
