use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("no incoming webhook is configured (set RTMBOT_WEBHOOK_URL or RTMBOT_WEBHOOK_TOKEN)")]
    NotConfigured,
    #[error("message text is empty")]
    EmptyText,
    #[error("could not reach webhook: {0}")]
    Network(#[source] reqwest::Error),
    #[error("webhook returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts plain text messages to a Slack incoming webhook.
pub struct WebhookClient {
    http: reqwest::Client,
    url: SecretString,
}

impl WebhookClient {
    pub fn new(url: Option<&SecretString>, timeout_secs: u64) -> Result<Self, WebhookError> {
        let url = url.cloned().ok_or(WebhookError::NotConfigured)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(WebhookError::Network)?;
        Ok(Self { http, url })
    }

    /// Returns the HTTP status on success.
    pub async fn post_text(&self, text: &str) -> Result<u16, WebhookError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WebhookError::EmptyText);
        }

        let response = self
            .http
            .post(self.url.expose_secret())
            .json(&WebhookPayload { text })
            .send()
            .await
            .map_err(WebhookError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::UnexpectedStatus { status: status.as_u16(), body });
        }

        info!(event_name = "egress.webhook.posted", status = status.as_u16(), "webhook accepted");
        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::{WebhookClient, WebhookError};

    #[test]
    fn missing_url_is_reported_up_front() {
        assert!(matches!(WebhookClient::new(None, 5), Err(WebhookError::NotConfigured)));
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_a_request() {
        let url = "http://127.0.0.1:9/never".to_owned().into();
        let client = WebhookClient::new(Some(&url), 5).expect("client builds");
        assert!(matches!(client.post_text("   ").await, Err(WebhookError::EmptyText)));
    }
}
