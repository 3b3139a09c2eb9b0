//! Tests for init_session command

use telegram_scraper::commands::init_session;
use telegram_scraper::{Config, Error};

#[tokio::test]
async fn test_init_session_requires_api_credentials() {
    let config = Config::default();
    let result = init_session::run(&config).await;
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[tokio::test]
#[ignore] // Requires Telegram connection and an interactive terminal
async fn test_init_session_run_prints_session() {
    let config = Config::load().expect("config");
    let result = init_session::run(&config).await;
    assert!(result.is_ok() || result.is_err());
}
