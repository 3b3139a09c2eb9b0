//! Command implementations
//!
//! `scrape` is shared by the bot and the CLI; `init_session` is CLI-only.

pub mod init_session;
pub mod scrape;

pub use scrape::{
    run_to_dir as scrape_to_dir, MessageRange, OutputFormat, Reporter, ScrapeOutcome,
    ScrapeRequest,
};
