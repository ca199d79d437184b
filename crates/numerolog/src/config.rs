//! Configuration management for numerolog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "numerolog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "numerolog.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NUMEROLOG_`, sections separated by `__`)
/// 2. TOML config file at `~/.config/numerolog/config.toml`
/// 3. Default values
///
/// `TELEGRAM_BOT_TOKEN` and `OPENAI_API_KEY` fill the secrets when no other
/// source sets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat platform configuration.
    pub telegram: TelegramConfig,
    /// Language model configuration.
    pub openai: OpenAiConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Free tier limits.
    pub limits: LimitsConfig,
    /// Prices in Telegram Stars.
    pub pricing: PricingConfig,
    /// Referral rewards.
    pub referral: ReferralConfig,
    /// HTTP service configuration.
    pub server: ServerConfig,
}

/// Telegram-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token.
    #[serde(skip_serializing)]
    pub bot_token: String,
    /// Public bot username, used in invite links.
    pub bot_username: String,
    /// Bot API base URL.
    pub api_base: String,
    /// URL of the mini-app opened from the settings button.
    pub webapp_url: String,
    /// Secret expected in `X-Telegram-Bot-Api-Secret-Token` on webhook calls.
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
}

/// Language model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Chat completion model name.
    pub model: String,
    /// Versioned API base, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per completion before giving up.
    pub max_retries: u32,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/numerolog/numerolog.db`
    pub database_path: Option<PathBuf>,
    /// Number of recent messages loaded as conversation context.
    pub history_limit: usize,
    /// Age after which a report generation lock is considered abandoned.
    pub report_lock_ttl_secs: u64,
}

/// Free tier limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Questions a free user may ask per day.
    pub free_questions_per_day: u32,
    /// Compatibility checks a free user may run per week.
    pub free_compatibility_per_week: u32,
}

/// Prices in Telegram Stars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price of the LITE subscription.
    pub lite: u32,
    /// Price of the PRO subscription.
    pub pro: u32,
    /// Length of a subscription period in days.
    pub subscription_days: u32,
}

/// Referral rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralConfig {
    /// Bonus questions credited to the referrer per referral.
    pub bonus_questions: u32,
    /// Report granted to the referrer on their first referral.
    pub first_referral_report: String,
}

/// HTTP service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the webhook and API listen on.
    pub bind_address: String,
    /// Origin allowed to call the API from a browser.
    pub cors_origin: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_username: "NumeroChatBot".to_string(),
            api_base: "https://api.telegram.org".to_string(),
            webapp_url: "https://dreatrio-yaby.github.io/numerolog-ai/".to_string(),
            webhook_secret: None,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            history_limit: 20,
            report_lock_ttl_secs: 300,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            free_questions_per_day: 3,
            free_compatibility_per_week: 2,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            lite: 175,
            pro: 500,
            subscription_days: 30,
        }
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            bonus_questions: 10,
            first_referral_report: "full_portrait".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            cors_origin: "https://dreatrio-yaby.github.io".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("NUMEROLOG_").split("__"));

        let mut config: Config = figment.extract()?;
        config.apply_conventional_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Fill unset secrets from the conventional environment variables.
    fn apply_conventional_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.telegram.bot_token.is_empty() {
            if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
                self.telegram.bot_token = token;
            }
        }
        if self.openai.api_key.is_empty() {
            if let Some(key) = lookup("OPENAI_API_KEY") {
                self.openai.api_key = key;
            }
        }
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.history_limit == 0 {
            return Err(validation("history_limit must be greater than 0"));
        }

        if self.storage.report_lock_ttl_secs == 0 {
            return Err(validation("report_lock_ttl_secs must be greater than 0"));
        }

        if self.pricing.subscription_days == 0 {
            return Err(validation("subscription_days must be greater than 0"));
        }

        if self.openai.max_retries == 0 {
            return Err(validation("max_retries must be greater than 0"));
        }

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(validation(format!(
                "invalid bind_address: {}",
                self.server.bind_address
            )));
        }

        if catalog::find_report(&self.referral.first_referral_report).is_none() {
            return Err(validation(format!(
                "unknown first_referral_report: {}",
                self.referral.first_referral_report
            )));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the bind address of the HTTP service.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind_address
            .parse()
            .map_err(|_| validation(format!("invalid bind_address: {}", self.server.bind_address)))
    }

    /// Get the report lock TTL as a Duration.
    #[must_use]
    pub fn report_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.storage.report_lock_ttl_secs)
    }

    /// Get the language model request timeout as a Duration.
    #[must_use]
    pub fn openai_timeout(&self) -> Duration {
        Duration::from_secs(self.openai.timeout_secs)
    }
}

fn validation(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.limits.free_questions_per_day, 3);
        assert_eq!(config.limits.free_compatibility_per_week, 2);
        assert_eq!(config.pricing.lite, 175);
        assert_eq!(config.pricing.pro, 500);
        assert_eq!(config.pricing.subscription_days, 30);
        assert_eq!(config.referral.bonus_questions, 10);
    }

    #[test]
    fn test_default_storage_config() {
        let storage = StorageConfig::default();

        assert!(storage.database_path.is_none());
        assert_eq!(storage.history_limit, 20);
        assert_eq!(storage.report_lock_ttl_secs, 300);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_history_limit() {
        let mut config = Config::default();
        config.storage.history_limit = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("history_limit"));
    }

    #[test]
    fn test_validate_zero_subscription_days() {
        let mut config = Config::default();
        config.pricing.subscription_days = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("subscription_days"));
    }

    #[test]
    fn test_validate_bad_bind_address() {
        let mut config = Config::default();
        config.server.bind_address = "not an address".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("bind_address"));
    }

    #[test]
    fn test_validate_unknown_referral_report() {
        let mut config = Config::default();
        config.referral.first_referral_report = "horoscope".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("first_referral_report"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config
            .database_path()
            .to_string_lossy()
            .contains("numerolog.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_report_lock_ttl() {
        assert_eq!(
            Config::default().report_lock_ttl(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_conventional_env_fills_missing_secrets() {
        let mut config = Config::default();
        config.apply_conventional_env(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        });

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.openai.api_key, "sk-test");
    }

    #[test]
    fn test_conventional_env_does_not_override() {
        let mut config = Config::default();
        config.telegram.bot_token = "from-file".to_string();
        config.apply_conventional_env(|_| Some("from-env".to_string()));

        assert_eq!(config.telegram.bot_token, "from-file");
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = Config::default();
        config.telegram.bot_token = "123:secret".to_string();
        config.openai.api_key = "sk-secret".to_string();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("numerolog"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[limits]\nfree_questions_per_day = 5\n\n[openai]\nmodel = \"gpt-4o\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.limits.free_questions_per_day, 5);
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.limits.free_compatibility_per_week, 2);
    }

    #[test]
    fn test_limits_config_deserialize() {
        let json = r#"{"free_questions_per_day": 7}"#;
        let limits: LimitsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(limits.free_questions_per_day, 7);
        assert_eq!(limits.free_compatibility_per_week, 2);
    }
}
