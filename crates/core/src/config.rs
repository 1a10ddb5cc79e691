use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";
pub const SLACK_WEBHOOK_BASE_URL: &str = "https://hooks.slack.com/services";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub webhook: WebhookConfig,
    pub shutdown: ShutdownConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub url: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ShutdownConfig {
    /// How long to wait for both pumps after the close frame; zero exits immediately.
    pub drain_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub webhook_url: Option<String>,
    pub shutdown_drain_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                bot_token: String::new().into(),
                api_base_url: DEFAULT_SLACK_API_BASE_URL.to_string(),
                request_timeout_secs: 30,
            },
            webhook: WebhookConfig::default(),
            shutdown: ShutdownConfig { drain_timeout_secs: 5 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

/// Expands a bare incoming-webhook token (`T000/B000/XXXX`) into the full hook URL.
pub fn webhook_url_from_token(token: &str) -> String {
    format!("{SLACK_WEBHOOK_BASE_URL}/{}", token.trim().trim_start_matches('/'))
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("rtmbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(request_timeout_secs) = slack.request_timeout_secs {
                self.slack.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(webhook) = patch.webhook {
            if let Some(token) = webhook.token {
                self.webhook.url = Some(secret_value(webhook_url_from_token(&token)));
            }
            if let Some(url) = webhook.url {
                self.webhook.url = Some(secret_value(url));
            }
        }

        if let Some(shutdown) = patch.shutdown {
            if let Some(drain_timeout_secs) = shutdown.drain_timeout_secs {
                self.shutdown.drain_timeout_secs = drain_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // `TOKEN` is what the standalone bot scripts have always read.
        let bot_token = read_env("RTMBOT_SLACK_BOT_TOKEN").or_else(|| read_env("TOKEN"));
        if let Some(value) = bot_token {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("RTMBOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("RTMBOT_SLACK_REQUEST_TIMEOUT_SECS") {
            self.slack.request_timeout_secs =
                parse_u64("RTMBOT_SLACK_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RTMBOT_WEBHOOK_TOKEN") {
            self.webhook.url = Some(secret_value(webhook_url_from_token(&value)));
        }
        if let Some(value) = read_env("RTMBOT_WEBHOOK_URL") {
            self.webhook.url = Some(secret_value(value));
        }

        if let Some(value) = read_env("RTMBOT_SHUTDOWN_DRAIN_TIMEOUT_SECS") {
            self.shutdown.drain_timeout_secs =
                parse_u64("RTMBOT_SHUTDOWN_DRAIN_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("RTMBOT_LOGGING_LEVEL").or_else(|| read_env("RTMBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RTMBOT_LOGGING_FORMAT").or_else(|| read_env("RTMBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(webhook_url) = overrides.webhook_url {
            self.webhook.url = Some(secret_value(webhook_url));
        }
        if let Some(drain_timeout_secs) = overrides.shutdown_drain_timeout_secs {
            self.shutdown.drain_timeout_secs = drain_timeout_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_webhook(&self.webhook)?;
        validate_shutdown(&self.shutdown)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Returns the config file `load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("rtmbot.toml"), PathBuf::from("config/rtmbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Set RTMBOT_SLACK_BOT_TOKEN (or TOKEN) to the bot user OAuth token from https://api.slack.com/apps".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used an app-level token instead of the bot token)"
        } else if bot_token.starts_with("xoxp-") {
            " (hint: you may have used a user token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if !is_http_url(&slack.api_base_url) {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if slack.request_timeout_secs == 0 || slack.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "slack.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_webhook(webhook: &WebhookConfig) -> Result<(), ConfigError> {
    if let Some(url) = &webhook.url {
        if !is_http_url(url.expose_secret()) {
            return Err(ConfigError::Validation(
                "webhook.url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_shutdown(shutdown: &ShutdownConfig) -> Result<(), ConfigError> {
    if shutdown.drain_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "shutdown.drain_timeout_secs must be in range 0..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    webhook: Option<WebhookPatch>,
    shutdown: Option<ShutdownPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPatch {
    url: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ShutdownPatch {
    drain_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
