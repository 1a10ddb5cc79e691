use rtmbot_core::config::{AppConfig, LoadOptions};
use rtmbot_slack::webhook::{WebhookClient, WebhookError};

use crate::commands::config::error_class;
use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DELIVERY};

pub fn run(text: &str) -> CommandResult {
    run_with(text, LoadOptions::default())
}

pub fn run_with(text: &str, options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "webhook",
                error_class(&error),
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let client =
        match WebhookClient::new(config.webhook.url.as_ref(), config.slack.request_timeout_secs) {
            Ok(client) => client,
            Err(error) => return failure(error),
        };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "webhook",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_DELIVERY,
            );
        }
    };

    match runtime.block_on(client.post_text(text)) {
        Ok(status) => {
            CommandResult::success("webhook", format!("message accepted (status {status})"))
        }
        Err(error) => failure(error),
    }
}

fn failure(error: WebhookError) -> CommandResult {
    let (error_class, exit_code) = match &error {
        WebhookError::NotConfigured => ("config_validation", EXIT_CONFIG),
        WebhookError::EmptyText => ("invalid_input", EXIT_CONFIG),
        WebhookError::Network(_) => ("delivery_network", EXIT_DELIVERY),
        WebhookError::UnexpectedStatus { .. } => ("delivery_rejected", EXIT_DELIVERY),
    };
    CommandResult::failure("webhook", error_class, error.to_string(), exit_code)
}
