mod bootstrap;

use anyhow::Result;
use rtmbot_core::config::{AppConfig, LoadOptions};
use rtmbot_slack::session::RtmStartNegotiator;
use rtmbot_slack::shutdown::interrupt_signal;

fn init_logging(config: &AppConfig) {
    use rtmbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let negotiator = RtmStartNegotiator::new(&config.slack)?;
    let app = bootstrap::bootstrap_with_config(config, &negotiator).await?;

    tracing::info!(
        event_name = "system.server.connecting",
        bot_id = %app.runner.identity(),
        drain_timeout_secs = app.config.shutdown.drain_timeout_secs,
        "connecting to rtm"
    );
    let report = app.runner.connect_and_run(&app.socket_url, interrupt_signal()).await?;

    tracing::info!(
        event_name = "system.server.stopped",
        shutdown = ?report.shutdown,
        "rtmbot-server stopped"
    );

    Ok(())
}
