//! Outbound mail delivery over SMTP (STARTTLS)
//!
//! The transport and mailboxes are built lazily on the first send and then
//! reused. Each alert is retried up to `max_tries` times.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio_util::sync::CancellationToken;

use super::DeliveryStrategy;
use crate::alerts::Alert;
use crate::config::{env_parse, env_required, ConfigError};
use crate::error::SetupError;

/// SMTP configuration
#[derive(Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub sender_address: String,
    pub sender_password: String,
    pub target_address: String,
    pub max_tries: u32,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender_address", &self.sender_address)
            .field("sender_password", &"***")
            .field("target_address", &self.target_address)
            .field("max_tries", &self.max_tries)
            .finish()
    }
}

impl SmtpConfig {
    /// Create config from environment variables
    /// STOCKWATCH_SMTP_SERVER, STOCKWATCH_SMTP_PORT (587),
    /// STOCKWATCH_SMTP_SENDER, STOCKWATCH_SMTP_PASSWORD,
    /// STOCKWATCH_SMTP_TARGET, STOCKWATCH_SMTP_MAX_TRIES (3)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            server: env_required("STOCKWATCH_SMTP_SERVER")?,
            port: env_parse("STOCKWATCH_SMTP_PORT", 587)?,
            sender_address: env_required("STOCKWATCH_SMTP_SENDER")?,
            sender_password: env_required("STOCKWATCH_SMTP_PASSWORD")?,
            target_address: env_required("STOCKWATCH_SMTP_TARGET")?,
            max_tries: env_parse("STOCKWATCH_SMTP_MAX_TRIES", 3)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let blank = |field| ConfigError::OutOfRange {
            field,
            reason: "must not be empty",
        };

        if self.server.trim().is_empty() {
            return Err(blank("smtp_server"));
        }
        if self.port == 0 {
            return Err(ConfigError::OutOfRange {
                field: "smtp_port",
                reason: "must be positive",
            });
        }
        if self.sender_address.trim().is_empty() {
            return Err(blank("smtp_sender"));
        }
        if self.sender_password.is_empty() {
            return Err(blank("smtp_password"));
        }
        if self.target_address.trim().is_empty() {
            return Err(blank("smtp_target"));
        }
        if self.max_tries == 0 {
            return Err(ConfigError::OutOfRange {
                field: "smtp_max_tries",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

/// Mail delivery channel
pub struct SmtpDelivery {
    config: SmtpConfig,
    mailer: Option<Mailer>,
    cancel: CancellationToken,
}

impl SmtpDelivery {
    pub fn new(config: SmtpConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            mailer: None,
            cancel: CancellationToken::new(),
        })
    }

    fn connect(config: &SmtpConfig) -> Result<Mailer, SmtpError> {
        let from: Mailbox = config.sender_address.parse()?;
        let to: Mailbox = config.target_address.parse()?;

        let credentials = Credentials::new(
            config.sender_address.clone(),
            config.sender_password.clone(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Mailer { transport, from, to })
    }

    fn compose(mailer: &Mailer, alert: &Alert) -> Result<Message, SmtpError> {
        let message = Message::builder()
            .from(mailer.from.clone())
            .to(mailer.to.clone())
            .subject(alert.topic())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.message().to_string())?;
        Ok(message)
    }
}

#[async_trait]
impl DeliveryStrategy for SmtpDelivery {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.cancel = cancel.clone();
        Ok(())
    }

    async fn send(&mut self, alert: &Alert) -> bool {
        if self.mailer.is_none() {
            match Self::connect(&self.config) {
                Ok(mailer) => self.mailer = Some(mailer),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to prepare SMTP transport");
                    return false;
                }
            }
        }
        let Some(mailer) = self.mailer.as_ref() else {
            return false;
        };

        let message = match Self::compose(mailer, alert) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build alert email");
                return false;
            }
        };

        let max_tries = self.config.max_tries;
        for attempt in 1..=max_tries {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return false,
                result = mailer.transport.send(message.clone()) => result,
            };

            match result {
                Ok(_) => {
                    tracing::info!(topic = %alert.topic(), "Alert email sent");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_tries = max_tries,
                        error = %e,
                        "SMTP send failed"
                    );
                }
            }
        }

        tracing::error!(max_tries = max_tries, "Giving up on alert email");
        false
    }
}

/// SMTP errors
#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
    #[error("Invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Message error: {0}")]
    Message(#[from] lettre::error::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            server: "127.0.0.1".to_string(),
            port: 9,
            sender_address: "monitor@example.com".to_string(),
            sender_password: "secret".to_string(),
            target_address: "desk@example.com".to_string(),
            max_tries: 2,
        }
    }

    #[test]
    fn test_validate_rejects_zero_tries() {
        let config = SmtpConfig {
            max_tries: 0,
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "smtp_max_tries", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_blank_server() {
        let config = SmtpConfig {
            server: " ".to_string(),
            ..config()
        };
        assert!(SmtpDelivery::new(config).is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_compose_uses_topic_as_subject() {
        let mailer = SmtpDelivery::connect(&config()).unwrap();
        let message = SmtpDelivery::compose(&mailer, &Alert::new("PETR4 monitor - BUY", "body")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: PETR4 monitor - BUY"));
        assert!(raw.contains("To: desk@example.com"));
    }

    #[tokio::test]
    async fn test_bad_mailbox_fails_lazily_on_send() {
        let mut smtp = SmtpDelivery::new(SmtpConfig {
            target_address: "not-an-address".to_string(),
            ..config()
        })
        .unwrap();
        smtp.setup(&CancellationToken::new()).await.unwrap();

        assert!(!smtp.send(&Alert::new("topic", "body")).await);
    }

    #[tokio::test]
    async fn test_unreachable_server_returns_false_after_retries() {
        let mut smtp = SmtpDelivery::new(config()).unwrap();
        smtp.setup(&CancellationToken::new()).await.unwrap();

        assert!(!smtp.send(&Alert::new("topic", "body")).await);
    }
}
