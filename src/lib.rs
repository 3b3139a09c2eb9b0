//! Telegram Channel Scraper Library
//!
//! This library provides tools to:
//! - Resolve channel references (usernames, public/private links, invites)
//! - Page through a chat's history within an optional id range
//! - Map messages to flat records with permalinks and file info
//! - Export records to an in-memory `.xlsx` spreadsheet
//! - Serve all of it through a Telegram bot

pub mod bot;
pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod metrics;
pub mod record;
pub mod session;
pub mod source;

// Re-export common types
pub use chat::{ChannelRef, Entity, JoinOutcome};
pub use config::{is_authorized, Config};
pub use error::{Error, Result};
pub use export::{export, export_caption, export_file_name, ExportBuffer};
pub use record::{map_message, Attachment, MessageRecord, ScrapedMessage};
pub use session::{decode_session, encode_session, SessionClient};
pub use source::{IdBounds, MessageSource, MessageStream};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
