use std::time::Duration;

use async_trait::async_trait;
use rtmbot_core::config::SlackConfig;
use rtmbot_core::{BotIdentity, SessionInfo};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// `ok: false` error codes that mean the token itself is bad.
const AUTH_ERROR_CODES: &[&str] =
    &["invalid_auth", "not_authed", "account_inactive", "token_revoked", "token_expired"];

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("could not reach rtm.start: {0}")]
    Network(#[source] reqwest::Error),
    #[error("rtm.start returned unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("rtm.start response could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("slack rejected the bot token: {0}")]
    Auth(String),
    #[error("rtm.start failed: {0}")]
    Rejected(String),
    #[error("rtm.start response is missing `{0}`")]
    Incomplete(&'static str),
}

#[async_trait]
pub trait SessionNegotiator: Send + Sync {
    async fn negotiate(&self) -> Result<SessionInfo, NegotiationError>;
}

#[derive(Debug, Deserialize)]
struct RtmStartResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "self")]
    identity: Option<RtmSelf>,
}

#[derive(Debug, Deserialize)]
struct RtmSelf {
    #[serde(default)]
    id: Option<String>,
}

/// Decodes an `rtm.start` body into the socket url and the bot's own id.
pub fn parse_rtm_start(body: &str) -> Result<SessionInfo, NegotiationError> {
    let response: RtmStartResponse =
        serde_json::from_str(body).map_err(NegotiationError::Decode)?;

    if !response.ok {
        let code = response.error.unwrap_or_else(|| "unknown".to_owned());
        if AUTH_ERROR_CODES.contains(&code.as_str()) {
            return Err(NegotiationError::Auth(code));
        }
        return Err(NegotiationError::Rejected(code));
    }

    let socket_url = response
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(NegotiationError::Incomplete("url"))?;
    let id = response
        .identity
        .and_then(|identity| identity.id)
        .filter(|id| !id.trim().is_empty())
        .ok_or(NegotiationError::Incomplete("self.id"))?;

    Ok(SessionInfo { socket_url, identity: BotIdentity::new(id) })
}

pub struct RtmStartNegotiator {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl RtmStartNegotiator {
    pub fn new(config: &SlackConfig) -> Result<Self, NegotiationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(NegotiationError::Network)?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rtm.start", self.api_base_url)
    }
}

#[async_trait]
impl SessionNegotiator for RtmStartNegotiator {
    async fn negotiate(&self) -> Result<SessionInfo, NegotiationError> {
        info!(event_name = "system.session.negotiating", "starting rtm session");
        let response = self
            .http
            .get(self.endpoint())
            .query(&[("token", self.bot_token.expose_secret())])
            .send()
            .await
            .map_err(NegotiationError::Network)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(NegotiationError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(NegotiationError::Network)?;
        let session = parse_rtm_start(&body)?;
        info!(
            event_name = "system.session.negotiated",
            bot_id = %session.identity,
            "rtm session negotiated"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use rtmbot_core::config::AppConfig;

    use super::{parse_rtm_start, NegotiationError, RtmStartNegotiator};

    #[test]
    fn parses_url_and_self_id() {
        let session = parse_rtm_start(
            r#"{"ok":true,"url":"wss://ms9.slack-msgs.com/websocket/abc","self":{"id":"U023BECGF","name":"bobby"},"team":{"id":"T024BE7LD"}}"#,
        )
        .expect("valid response");
        assert_eq!(session.socket_url, "wss://ms9.slack-msgs.com/websocket/abc");
        assert_eq!(session.identity.as_str(), "U023BECGF");
    }

    #[test]
    fn auth_failures_are_distinguished() {
        let error = parse_rtm_start(r#"{"ok":false,"error":"invalid_auth"}"#).expect_err("auth");
        assert!(matches!(error, NegotiationError::Auth(ref code) if code == "invalid_auth"));

        let error = parse_rtm_start(r#"{"ok":false,"error":"ratelimited"}"#).expect_err("other");
        assert!(matches!(error, NegotiationError::Rejected(ref code) if code == "ratelimited"));
    }

    #[test]
    fn missing_fields_are_reported() {
        let error = parse_rtm_start(r#"{"ok":true,"self":{"id":"U1"}}"#).expect_err("no url");
        assert!(matches!(error, NegotiationError::Incomplete("url")));

        let error = parse_rtm_start(r#"{"ok":true,"url":"wss://x"}"#).expect_err("no self");
        assert!(matches!(error, NegotiationError::Incomplete("self.id")));

        let error = parse_rtm_start("<html>").expect_err("not json");
        assert!(matches!(error, NegotiationError::Decode(_)));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let mut config = AppConfig::default();
        config.slack.api_base_url = "http://127.0.0.1:9000/api/".to_owned();
        let negotiator = RtmStartNegotiator::new(&config.slack).expect("client builds");
        assert_eq!(negotiator.endpoint(), "http://127.0.0.1:9000/api/rtm.start");
    }
}
