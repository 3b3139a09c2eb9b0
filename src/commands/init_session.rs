//! Interactive login that produces a `SESSION_STRING` credential

use std::io::{self, Write};

use grammers_client::SignInError;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{encode_session, new_session_file, open_session, TelegramClient};

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Log in with phone + code (+ 2FA password) and return the encoded session.
pub async fn run(config: &Config) -> Result<String> {
    config.validate_for_login()?;

    let phone = if config.phone.is_empty() {
        prompt("Phone number (international format): ")?
    } else {
        config.phone.clone()
    };
    if phone.is_empty() {
        return Err(Error::ConfigError("TELEGRAM_PHONE is not set".to_string()));
    }

    let session_file = new_session_file()?;
    let session = open_session(session_file.path())?;
    let client = TelegramClient::start(session, config.api_id);

    if client
        .is_authorized()
        .await
        .map_err(|e| Error::ConnectionError(e.to_string()))?
    {
        client.shutdown();
        return Err(Error::SessionError(
            "Fresh session is unexpectedly authorized".to_string(),
        ));
    }

    info!(%phone, "Requesting login code");
    let token = client
        .request_login_code(&phone, &config.api_hash)
        .await
        .map_err(|e| Error::TelegramError(format!("Failed to request code: {}", e)))?;

    let code = prompt("Code from Telegram: ")?;
    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = prompt(&format!("Two-step verification password (hint: {}): ", hint))?;
            client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| Error::TelegramError(format!("Failed to check password: {}", e)))?
        }
        Err(e) => return Err(Error::TelegramError(format!("Failed to sign in: {}", e))),
    };

    info!(
        user = %user.full_name(),
        username = user.username().unwrap_or("-"),
        "Signed in"
    );

    client.shutdown();
    drop(client);

    encode_session(session_file.path())
}
