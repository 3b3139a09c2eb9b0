//! Telegram Channel Scraper - main entry point
//!
//! Runs the bot by default; `scrape` and `init-session` are local helpers.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use telegram_scraper::commands::{self, OutputFormat, ScrapeRequest};
use telegram_scraper::config::DEFAULT_CONFIG_FILE;
use telegram_scraper::{bot, metrics, Config, SessionClient};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "telegram_scraper")]
#[command(about = "Telegram channel scraper bot", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Optional YAML config file; environment variables take precedence
    #[arg(long, env = "SCRAPER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot (default)
    Bot,

    /// Scrape a channel once and write the result locally
    Scrape {
        /// Channel link, @username, invite link or -100<id>
        reference: String,

        /// First message id (inclusive)
        start_id: Option<String>,

        /// Last message id (inclusive)
        end_id: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Output format: xlsx | json
        #[arg(long, default_value = "xlsx")]
        format: String,
    },

    /// Log in interactively and print a SESSION_STRING
    InitSession,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("telegram_scraper=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_path(&cli.config)?;

    match cli.command.unwrap_or(Commands::Bot) {
        Commands::Bot => {
            if let Some(addr) = cli.metrics_addr.as_deref() {
                match addr.parse::<SocketAddr>() {
                    Ok(socket) => metrics::spawn_metrics_server(socket),
                    Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
                }
            }
            bot::run(Arc::new(config)).await?;
        }
        Commands::Scrape {
            reference,
            start_id,
            end_id,
            output,
            format,
        } => {
            config.validate_for_session()?;
            let format = OutputFormat::parse(&format)?;
            let args: Vec<String> = std::iter::once(reference)
                .chain(start_id)
                .chain(end_id)
                .collect();
            let request = ScrapeRequest::from_args(&args)?;

            let started = Instant::now();
            let client = SessionClient::connect(&config).await?;
            let result = commands::scrape_to_dir(&client, &request, &output, format).await;
            client.disconnect().await;

            let outcome = result?;
            info!(
                outcome = outcome.label(),
                rows = outcome.rows(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scrape finished"
            );
        }
        Commands::InitSession => {
            let session_string = commands::init_session::run(&config).await?;
            println!("\nSESSION_STRING={}", session_string);
        }
    }

    Ok(())
}
