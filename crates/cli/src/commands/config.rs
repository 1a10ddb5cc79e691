use std::env;
use std::fs;
use std::path::Path;

use rtmbot_core::config::{resolve_config_path, AppConfig, ConfigError, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

/// One reported key: where it lives in the file and which env vars can set it.
struct ConfigField {
    key: &'static str,
    file_keys: &'static [&'static str],
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    run_with(LoadOptions::default())
}

pub fn run_with(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                error_class(&error),
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

pub(crate) fn error_class(error: &ConfigError) -> &'static str {
    match error {
        ConfigError::ReadFile { .. } | ConfigError::MissingConfigFile(_) => "config_file",
        ConfigError::ParseFile { .. } => "config_parse",
        _ => "config_validation",
    }
}

fn fields(config: &AppConfig) -> Vec<ConfigField> {
    let webhook_url = if config.webhook.url.is_some() { "<redacted>" } else { "<unset>" };

    vec![
        ConfigField {
            key: "slack.bot_token",
            file_keys: &["slack.bot_token"],
            env_keys: &["RTMBOT_SLACK_BOT_TOKEN", "TOKEN"],
            value: redact_token(config.slack.bot_token.expose_secret()),
        },
        ConfigField {
            key: "slack.api_base_url",
            file_keys: &["slack.api_base_url"],
            env_keys: &["RTMBOT_SLACK_API_BASE_URL"],
            value: config.slack.api_base_url.clone(),
        },
        ConfigField {
            key: "slack.request_timeout_secs",
            file_keys: &["slack.request_timeout_secs"],
            env_keys: &["RTMBOT_SLACK_REQUEST_TIMEOUT_SECS"],
            value: config.slack.request_timeout_secs.to_string(),
        },
        ConfigField {
            key: "webhook.url",
            file_keys: &["webhook.url", "webhook.token"],
            env_keys: &["RTMBOT_WEBHOOK_URL", "RTMBOT_WEBHOOK_TOKEN"],
            value: webhook_url.to_string(),
        },
        ConfigField {
            key: "shutdown.drain_timeout_secs",
            file_keys: &["shutdown.drain_timeout_secs"],
            env_keys: &["RTMBOT_SHUTDOWN_DRAIN_TIMEOUT_SECS"],
            value: config.shutdown.drain_timeout_secs.to_string(),
        },
        ConfigField {
            key: "logging.level",
            file_keys: &["logging.level"],
            env_keys: &["RTMBOT_LOGGING_LEVEL", "RTMBOT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        ConfigField {
            key: "logging.format",
            file_keys: &["logging.format"],
            env_keys: &["RTMBOT_LOGGING_FORMAT", "RTMBOT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &ConfigField,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if field.file_keys.iter().any(|key_path| contains_path(doc, key_path)) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
