use std::time::Duration;

use rtmbot_core::config::AppConfig;
use rtmbot_core::SessionInfo;
use rtmbot_slack::commands::default_commands;
use rtmbot_slack::session::{NegotiationError, SessionNegotiator};
use rtmbot_slack::socket::RtmRunner;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub socket_url: String,
    pub runner: RtmRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("session negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),
}

/// Negotiates the session and builds the runner. Nothing touches the socket yet.
pub async fn bootstrap_with_config(
    config: AppConfig,
    negotiator: &dyn SessionNegotiator,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        api_base_url = %config.slack.api_base_url,
        "starting application bootstrap"
    );

    let SessionInfo { socket_url, identity } = negotiator.negotiate().await?;
    info!(
        event_name = "system.bootstrap.session_ready",
        bot_id = %identity,
        "bot identity established"
    );

    let runner = RtmRunner::new(
        identity,
        default_commands(),
        Duration::from_secs(config.shutdown.drain_timeout_secs),
    );

    Ok(Application { config, socket_url, runner })
}
