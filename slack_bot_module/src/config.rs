use std::env;
use std::path::PathBuf;
use std::time::Duration;

use action_items_module::backend::{
    BackendKind, LocalBackend, LocalConfig, ModelBackend, OpenAiBackend, OpenAiConfig,
    DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_URL, DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL,
    DEFAULT_TIMEOUT,
};

pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_ALERT_CHANNEL_NAME: &str = "action-items-alarm";
pub const DEFAULT_LOG_PATH: &str = "slack_bot.log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid {key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Model provider settings, resolved from `MODEL_TYPE`.
#[derive(Debug, Clone)]
pub enum ModelConfig {
    Local(LocalConfig),
    OpenAi(OpenAiConfig),
}

impl ModelConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local(_) => BackendKind::Local,
            Self::OpenAi(_) => BackendKind::OpenAi,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            Self::Local(config) => &config.model,
            Self::OpenAi(config) => &config.model,
        }
    }

    pub fn build_backend(&self) -> ModelBackend {
        match self {
            Self::Local(config) => ModelBackend::Local(LocalBackend::new(config.clone())),
            Self::OpenAi(config) => ModelBackend::OpenAi(OpenAiBackend::new(config.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Slack bot OAuth token (xoxb-...)
    pub slack_bot_token: String,
    /// Signing secret for Events API requests; verification is off when unset
    pub slack_signing_secret: Option<String>,
    /// Slack Web API base URL (overridden in tests)
    pub slack_api_base_url: String,
    /// Channel that receives action item posts
    pub alert_channel_name: String,
    /// Whether thread `message` events are answered in-thread
    pub thread_replies_enabled: bool,
    pub model: ModelConfig,
    /// Append-only log file
    pub log_path: PathBuf,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = env::var("RUST_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match env_var_non_empty("RUST_SERVICE_PORT") {
            Some(value) => value.parse::<u16>().map_err(|err| ConfigError::Invalid {
                key: "RUST_SERVICE_PORT",
                value: value.clone(),
                reason: err.to_string(),
            })?,
            None => 9001,
        };

        let slack_bot_token =
            env_var_non_empty("SLACK_BOT_TOKEN").ok_or(ConfigError::Missing("SLACK_BOT_TOKEN"))?;
        let slack_signing_secret = env_var_non_empty("SLACK_SIGNING_SECRET");
        let slack_api_base_url = env_var_non_empty("SLACK_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE_URL.to_string());
        let alert_channel_name = env_var_non_empty("ALERT_CHANNEL_NAME")
            .map(|name| name.trim_start_matches('#').to_string())
            .unwrap_or_else(|| DEFAULT_ALERT_CHANNEL_NAME.to_string());
        let thread_replies_enabled = env_flag("THREAD_REPLIES_ENABLED", true);
        let log_path = env_var_non_empty("LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));

        let model = model_config_from_env()?;

        Ok(Self {
            host,
            port,
            slack_bot_token,
            slack_signing_secret,
            slack_api_base_url,
            alert_channel_name,
            thread_replies_enabled,
            model,
            log_path,
        })
    }
}

fn model_config_from_env() -> Result<ModelConfig, ConfigError> {
    let kind = match env_var_non_empty("MODEL_TYPE") {
        Some(value) => value
            .parse::<BackendKind>()
            .map_err(|reason| ConfigError::Invalid {
                key: "MODEL_TYPE",
                value: value.clone(),
                reason,
            })?,
        None => BackendKind::Local,
    };

    let timeout = match env_var_non_empty("LLM_TIMEOUT_SECS") {
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::Invalid {
                key: "LLM_TIMEOUT_SECS",
                value: value.clone(),
                reason: "expected a positive number of seconds".to_string(),
            })?,
        None => DEFAULT_TIMEOUT,
    };

    match kind {
        BackendKind::OpenAi => {
            let api_key =
                env_var_non_empty("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
            Ok(ModelConfig::OpenAi(OpenAiConfig {
                api_key,
                api_url: env_var_non_empty("OPENAI_API_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
                model: env_var_non_empty("OPENAI_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                timeout,
            }))
        }
        BackendKind::Local => Ok(ModelConfig::Local(LocalConfig {
            base_url: env_var_non_empty("LOCAL_MODEL_URL")
                .unwrap_or_else(|| DEFAULT_LOCAL_URL.to_string()),
            model: env_var_non_empty("LOCAL_MODEL")
                .or_else(|| env_var_non_empty("HUGGINGFACE_MODEL"))
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            token: env_var_non_empty("LOCAL_MODEL_TOKEN")
                .or_else(|| env_var_non_empty("HUGGINGFACE_TOKEN")),
            timeout,
        })),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Err(_) => default,
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
