use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_TEXT_MODEL: &str = "allenai/olmo-3-32b-think";
pub const DEFAULT_APP_TITLE: &str = "WhatsApp Demo Bot";

/// OpenRouter settings. An absent API key disables every LLM feature.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub referer: Option<String>,
    pub app_title: Option<String>,
}

impl OpenRouterConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            api_url: DEFAULT_OPENROUTER_API_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_TEXT_MODEL.to_string(),
            referer: None,
            app_title: Some(DEFAULT_APP_TITLE.to_string()),
        }
    }

    fn from_env() -> Self {
        let text_model = optional("OPENROUTER_TEXT_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string());
        // Vision falls back to whatever text model is in use
        let vision_model = optional("OPENROUTER_VISION_MODEL").unwrap_or_else(|| text_model.clone());

        Self {
            api_key: optional("OPENROUTER_API_KEY"),
            api_url: optional("OPENROUTER_API_URL").unwrap_or_else(|| DEFAULT_OPENROUTER_API_URL.to_string()),
            text_model,
            vision_model,
            referer: optional("OPENROUTER_REFERER"),
            app_title: Some(optional("OPENROUTER_APP_TITLE").unwrap_or_else(|| DEFAULT_APP_TITLE.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BirdConfig {
    pub api_key: String,
    pub workspace_id: String,
    pub channel_id: String,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openrouter: OpenRouterConfig,
    pub bird: BirdConfig,
    pub downloads_dir: PathBuf,
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub admin_token: Option<String>,
    pub initial_notification_jid: Option<String>,
}

impl Config {
    /// Reads the whole configuration once; nothing else in the crate touches the environment.
    pub fn from_env() -> Result<Self> {
        let cwd = env::current_dir().context("cannot resolve current directory")?;

        let bird = BirdConfig {
            api_key: required("BIRD_API_KEY")?,
            workspace_id: required("BIRD_WORKSPACE_ID")?,
            channel_id: required("BIRD_CHANNEL_ID")?,
            webhook_secret: optional("BIRD_WEBHOOK_SECRET"),
        };

        Ok(Self {
            openrouter: OpenRouterConfig::from_env(),
            bird,
            downloads_dir: optional("DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.join("downloads")),
            data_dir: optional("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.join("data")),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            database_url: optional("DATABASE_URL").or_else(|| optional("POSTGRES_URL")),
            admin_token: optional("ADMIN_TOKEN"),
            initial_notification_jid: optional("INITIAL_NOTIFICATION_JID"),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    non_empty(env::var(key).ok())
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{} must be set in .env file", key))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
