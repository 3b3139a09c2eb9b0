//! Configuration for the Telegram API session and the bot front-end
//!
//! Values come from the environment (a `.env` file is honoured) and an
//! optional `config.yml`. Environment variables take precedence.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Records between two progress edits of the status message.
pub const PROGRESS_EVERY: usize = 500;
/// Characters kept from a message body.
pub const SNIPPET_CHARS: usize = 200;
/// Characters kept from the channel title in the export file name.
pub const FILENAME_MAX_CHARS: usize = 100;
/// Messages requested per history page.
pub const HISTORY_PAGE_SIZE: i32 = 100;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramConfig>,
    bot: Option<BotConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
    phone: Option<String>,
    session_string: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotConfig {
    token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    owner_id: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Process-wide settings, built once at startup and shared by reference.
#[derive(Clone, Default)]
pub struct Config {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
    pub session_string: String,
    pub bot_token: String,
    /// 0 means every caller may scrape.
    pub owner_id: i64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_id", &self.api_id)
            .field("api_hash", &redact(&self.api_hash))
            .field("phone", &redact(&self.phone))
            .field("session_string", &redact(&self.session_string))
            .field("bot_token", &redact(&self.bot_token))
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Config {
    /// Load `.env`, then `config.yml` if present, then the environment.
    pub fn load() -> Result<Self> {
        Self::load_path(DEFAULT_CONFIG_FILE)
    }

    /// Same as [`Config::load`] with an explicit YAML path.
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();
        Self::load_from(path)
    }

    /// Load configuration from a specific YAML file. A missing file means
    /// environment-only configuration; a malformed one is an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Self::parse_yaml(&content)?
        } else {
            YamlConfig::default()
        };
        Ok(Self::from_yaml(yaml))
    }

    /// Build configuration from YAML text, resolving env overrides.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(Self::from_yaml(Self::parse_yaml(content)?))
    }

    fn parse_yaml(content: &str) -> Result<YamlConfig> {
        if content.trim().is_empty() {
            return Ok(YamlConfig::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let telegram = yaml.telegram.unwrap_or_default();
        let bot = yaml.bot.unwrap_or_default();

        Self {
            api_id: Self::resolve_env_i32(telegram.api_id, "API_ID"),
            api_hash: Self::resolve_env_string(telegram.api_hash, "API_HASH"),
            phone: Self::resolve_env_string(telegram.phone, "TELEGRAM_PHONE"),
            session_string: Self::resolve_env_string(telegram.session_string, "SESSION_STRING"),
            bot_token: Self::resolve_env_string(bot.token, "BOT_TOKEN"),
            owner_id: Self::resolve_env_i64(bot.owner_id, "OWNER_ID"),
        }
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Expand a `${VAR}` placeholder, if the value is one.
    fn expand_placeholder(value: &str) -> Option<String> {
        let var_name = value.strip_prefix("${")?.strip_suffix('}')?;
        std::env::var(var_name).ok()
    }

    /// Resolve a value: explicit env var, then `${VAR}` placeholder, then literal.
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        match value {
            Some(v) => match Self::expand_placeholder(&v) {
                Some(expanded) => expanded,
                None if v.starts_with("${") => String::new(),
                None => v,
            },
            None => String::new(),
        }
    }

    fn resolve_env_i32(value: Option<String>, env_key: &str) -> i32 {
        Self::resolve_env_string(value, env_key)
            .trim()
            .parse()
            .unwrap_or(0)
    }

    fn resolve_env_i64(value: Option<String>, env_key: &str) -> i64 {
        Self::resolve_env_string(value, env_key)
            .trim()
            .parse()
            .unwrap_or(0)
    }

    /// Keys needed to open an MTProto connection.
    fn require_api(&self) -> Result<()> {
        if self.api_id == 0 {
            return Err(Error::ConfigError("API_ID is not set".to_string()));
        }
        if self.api_hash.is_empty() {
            return Err(Error::ConfigError("API_HASH is not set".to_string()));
        }
        Ok(())
    }

    /// Everything the bot front-end needs.
    pub fn validate_for_bot(&self) -> Result<()> {
        self.validate_for_session()?;
        if self.bot_token.is_empty() {
            return Err(Error::ConfigError("BOT_TOKEN is not set".to_string()));
        }
        Ok(())
    }

    /// Everything a scrape through an existing session needs.
    pub fn validate_for_session(&self) -> Result<()> {
        self.require_api()?;
        if self.session_string.is_empty() {
            return Err(Error::ConfigError(
                "SESSION_STRING is not set (run init_session first)".to_string(),
            ));
        }
        Ok(())
    }

    /// Interactive login only needs API credentials.
    pub fn validate_for_login(&self) -> Result<()> {
        self.require_api()
    }

    pub fn is_authorized(&self, caller_id: Option<i64>) -> bool {
        is_authorized(self, caller_id)
    }
}

/// Owner restriction: 0 allows everyone, otherwise only the owner.
pub fn is_authorized(config: &Config, caller_id: Option<i64>) -> bool {
    config.owner_id == 0 || caller_id == Some(config.owner_id)
}
