//! Alert delivery.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::{MailConfig, MailCredentials, Notification};

/// Delivers a notification to the configured recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

enum CredentialSource {
    Fixed(MailCredentials),
    Env(EnvLookup),
}

/// SMTP delivery with STARTTLS and login credentials.
pub struct SmtpMailer {
    config: MailConfig,
    credentials: CredentialSource,
}

impl SmtpMailer {
    /// Credentials are read from the process environment when a message is sent.
    pub fn new(config: MailConfig) -> Self {
        Self::with_env(config, |key| std::env::var(key).ok())
    }

    /// Credentials are resolved through `lookup` when a message is sent.
    pub fn with_env(
        config: MailConfig,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            credentials: CredentialSource::Env(Box::new(lookup)),
        }
    }

    pub fn with_credentials(config: MailConfig, credentials: MailCredentials) -> Self {
        Self {
            config,
            credentials: CredentialSource::Fixed(credentials),
        }
    }

    fn credentials(&self) -> Result<MailCredentials> {
        match &self.credentials {
            CredentialSource::Fixed(credentials) => Ok(credentials.clone()),
            CredentialSource::Env(lookup) => MailCredentials::resolve(&self.config, lookup),
        }
    }
}

/// Build a UTF-8 plain-text message.
pub fn build_message(credentials: &MailCredentials, notification: &Notification) -> Result<Message> {
    let from: Mailbox = credentials
        .from
        .parse()
        .map_err(|e| AppError::mail(format!("invalid sender '{}': {e}", credentials.from)))?;
    let to: Mailbox = credentials
        .to
        .parse()
        .map_err(|e| AppError::mail(format!("invalid recipient '{}': {e}", credentials.to)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(notification.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())
        .map_err(AppError::mail)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let credentials = self.credentials()?;
        let message = build_message(&credentials, notification)?;

        log::info!("Connecting to SMTP relay {}", self.config.smtp_host);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .map_err(AppError::mail)?
            .port(self.config.smtp_port)
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .credentials(Credentials::new(
                credentials.user.clone(),
                credentials.password.clone(),
            ))
            .build();

        transport.send(message).await.map_err(AppError::mail)?;
        log::info!("Email sent to {}", credentials.to);
        Ok(())
    }
}

/// Logs the alert instead of sending it.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        log::info!("[dry-run] Subject: {}", notification.subject);
        for line in notification.body.lines() {
            log::info!("[dry-run]   {}", line);
        }
        Ok(())
    }
}
