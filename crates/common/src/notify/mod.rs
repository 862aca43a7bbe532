//! Outgoing email
//!
//! Services only see the [`Mailer`] trait. `HttpMailer` talks to a
//! Resend-style JSON API; `LogMailer` is used when no provider is configured.

pub mod templates;

use crate::config::EmailConfig;
use crate::errors::{AppError, Result};
use crate::metrics::record_email;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Template name, used for metrics and logs
    pub template: &'static str,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

pub type DynMailer = Arc<dyn Mailer>;

/// Outcome of a best-effort notification, reported back to API clients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub sent: bool,
    pub error: Option<String>,
}

/// Send `message`, turning a failure into a [`Delivery`] instead of an error
pub async fn deliver(mailer: &dyn Mailer, message: EmailMessage) -> Delivery {
    let template = message.template;
    let to = message.to.clone();

    match mailer.send(message).await {
        Ok(()) => {
            record_email(template, true);
            Delivery { sent: true, error: None }
        }
        Err(e) => {
            record_email(template, false);
            warn!(template, to = %to, error = %e, "Email delivery failed");
            Delivery {
                sent: false,
                error: Some(e.to_string()),
            }
        }
    }
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Mail provider reached over HTTP (`POST {api_base}/emails`)
pub struct HttpMailer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_base: &str, api_key: &str, from: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let body = OutgoingEmail {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Email {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Email {
                message: format!("provider returned {}: {}", status, text),
            });
        }

        info!(template = message.template, to = %message.to, "Email sent");
        Ok(())
    }
}

/// Logs instead of sending; for local development.
///
/// Every send reports failure so callers never tell a client the email went out.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        warn!(
            template = message.template,
            to = %message.to,
            subject = %message.subject,
            "Email provider not configured, email logged but not sent"
        );
        Err(AppError::Email {
            message: "email provider not configured".to_string(),
        })
    }
}

/// HTTP mailer when both api base and key are configured, log mailer otherwise
pub fn create_mailer(config: &EmailConfig) -> Result<DynMailer> {
    match (config.api_base.as_deref(), config.api_key.as_deref()) {
        (Some(base), Some(key)) => Ok(Arc::new(HttpMailer::new(
            base,
            key,
            &config.from,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => {
            warn!("Email provider not configured, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
