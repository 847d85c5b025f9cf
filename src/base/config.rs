//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::base::prompt::{PromptConfig, PromptRegistry};

use super::types::Res;

/// Default database endpoint; an embedded, non-persistent store.
fn default_db_endpoint() -> String {
    "mem://".to_string()
}

/// Default database namespace.
fn default_db_namespace() -> String {
    "response".to_string()
}

/// Default database name.
fn default_db_database() -> String {
    "bot".to_string()
}

/// Default prompt types.
fn default_prompts() -> Vec<PromptConfig> {
    vec![PromptConfig::quiz(), PromptConfig::event()]
}

/// Configuration for the response-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Slack app token (`SLACK_APP_TOKEN`).
    #[serde(default)]
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    #[serde(default)]
    pub slack_bot_token: String,
    /// Slack signing secret (`SLACK_SIGNING_SECRET`).
    #[serde(default)]
    pub slack_signing_secret: String,
    /// Database endpoint URL (`DB_ENDPOINT`), e.g. `ws://localhost:8000` or `mem://`.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`); sign-in is skipped when unset.
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: Option<String>,
    /// Database namespace (`DB_NAMESPACE`).
    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,
    /// Database name (`DB_DATABASE`).
    #[serde(default = "default_db_database")]
    pub db_database: String,
    /// Prompt types the bot can post (file only).
    #[serde(default = "default_prompts")]
    pub prompts: Vec<PromptConfig>,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            slack_app_token: String::new(),
            slack_bot_token: String::new(),
            slack_signing_secret: String::new(),
            db_endpoint: default_db_endpoint(),
            db_username: None,
            db_password: None,
            db_namespace: default_db_namespace(),
            db_database: default_db_database(),
            prompts: default_prompts(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("RESPONSE_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the settings that cannot be caught by deserialization alone.
    pub fn validate(&self) -> Res<()> {
        if self.db_endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!("Database endpoint must not be empty."));
        }

        if self.db_username.is_some() != self.db_password.is_some() {
            return Err(anyhow::anyhow!("Database username and password must be set together."));
        }

        if self.prompts.is_empty() {
            return Err(anyhow::anyhow!("At least one prompt must be configured."));
        }

        PromptRegistry::from_configs(&self.prompts)?;

        Ok(())
    }

    /// Build the prompt registry from the configured prompts.
    pub fn prompt_registry(&self) -> Res<PromptRegistry> {
        Ok(PromptRegistry::from_configs(&self.prompts)?)
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

// Tests.
