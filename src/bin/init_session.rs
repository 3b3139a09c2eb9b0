//! Session initialization binary.

use telegram_scraper::commands::init_session;
use telegram_scraper::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::load()?;
    let session_string = init_session::run(&config).await?;
    println!("\nSESSION_STRING={}", session_string);
    Ok(())
}
