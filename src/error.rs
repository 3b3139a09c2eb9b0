//! Error types for the channel scraper

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unauthorized. Ask the owner to enable access for you.")]
    Unauthorized,

    #[error("Usage:\n/scrape <channel_link_or_username> [start_id] [end_id]")]
    Usage,

    #[error("{}", describe_wait(.seconds))]
    RateLimited { seconds: Option<u64> },

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Bot API error: {0}")]
    BotError(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Invalid channel reference: {0}")]
    InvalidReference(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn describe_wait(seconds: &Option<u64>) -> String {
    match seconds {
        Some(secs) => format!("A wait of {} seconds is required", secs),
        None => "A wait is required before retrying".to_string(),
    }
}

impl Error {
    /// Whether the backend asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }
}

/// Extract flood wait seconds from an error string (best-effort)
pub fn parse_flood_wait_seconds(error: &str) -> Option<u64> {
    if let Some(idx) = error.find("FLOOD_WAIT_") {
        let start = idx + "FLOOD_WAIT_".len();
        let secs = error[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if let Ok(v) = secs.parse::<u64>() {
            return Some(v);
        }
    }

    if let Some(idx) = error.find("value:") {
        let start = idx + "value:".len();
        let secs = error[start..]
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if let Ok(v) = secs.parse::<u64>() {
            return Some(v);
        }
    }

    None
}

fn is_flood_wait(error: &str) -> bool {
    error.contains("FLOOD_WAIT") || error.contains("FLOOD_PREMIUM_WAIT")
}

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        let message = err.to_string();
        if is_flood_wait(&message) {
            Error::RateLimited {
                seconds: parse_flood_wait_seconds(&message),
            }
        } else {
            Error::TelegramError(message)
        }
    }
}

impl From<teloxide::RequestError> for Error {
    fn from(err: teloxide::RequestError) -> Self {
        Error::BotError(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::ExportError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::SessionError(format!("Invalid session string: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
