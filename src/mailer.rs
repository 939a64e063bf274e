//! Outbound notification seam. Booking and confirmation notices go out
//! through `Mailer`; the HTTP implementation posts to a JSON mail API.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::ApiError;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<(), ApiError>;
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    /// HTTP mailer when the mail API is configured, otherwise a logging no-op.
    pub fn from_config(cfg: &Config) -> std::sync::Arc<dyn Mailer> {
        match (&cfg.mail_api_url, &cfg.mail_api_key) {
            (Some(url), Some(key)) => std::sync::Arc::new(HttpMailer::new(
                url.clone(),
                key.clone(),
                cfg.mail_from.clone(),
            )),
            _ => {
                tracing::warn!("MAIL_API_URL/MAIL_API_KEY not set, outbound mail disabled");
                std::sync::Arc::new(NullMailer)
            }
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<(), ApiError> {
        let body = OutboundMail {
            from: &self.from,
            to,
            subject,
            text,
            html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("mail api request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::Transport(format!(
                "mail api returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Drops mail on the floor, with a log line. Used when no mail API is
/// configured and in tests.
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _text: &str,
        _html: Option<&str>,
    ) -> Result<(), ApiError> {
        tracing::info!("mail disabled, dropping notice to {to}: {subject}");
        Ok(())
    }
}
