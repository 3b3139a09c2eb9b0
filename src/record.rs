//! Flat per-message records
//!
//! Messages arrive as [`ScrapedMessage`], a backend-neutral view built by the
//! history adapter, and leave as [`MessageRecord`] rows for the spreadsheet.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::Entity;
use crate::config::SNIPPET_CHARS;

/// File attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    /// Name stored with the document, if any.
    pub file_name: Option<String>,
    /// Extension the attachment kind implies (with leading dot).
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub is_photo: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedMessage {
    pub id: i32,
    pub date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
}

/// One spreadsheet row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub channel_title: String,
    pub channel_id: i64,
    pub is_private: String,
    pub message_id: i32,
    pub message_date: Option<String>,
    pub post_link: Option<String>,
    pub file_name: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub file_mime: Option<String>,
    pub text_snippet: Option<String>,
}

impl MessageRecord {
    pub const COLUMNS: [&'static str; 10] = [
        "channel_title",
        "channel_id",
        "is_private",
        "message_id",
        "message_date",
        "post_link",
        "file_name",
        "file_size_bytes",
        "file_mime",
        "text_snippet",
    ];
}

/// Map one message of `entity` to its row.
pub fn map_message(entity: &Entity, message: &ScrapedMessage) -> MessageRecord {
    let attachment = message.attachment.as_ref();

    MessageRecord {
        channel_title: entity.title().to_string(),
        channel_id: entity.id(),
        is_private: if entity.is_private() { "Yes" } else { "No" }.to_string(),
        message_id: message.id,
        message_date: message.date.map(|d| d.to_rfc3339()),
        post_link: post_link(entity, message.id),
        file_name: attachment.map(|a| best_file_name(message.id, a)),
        file_size_bytes: attachment.and_then(|a| a.size),
        file_mime: attachment.and_then(|a| a.mime_type.clone()),
        text_snippet: message.text.as_deref().and_then(text_snippet),
    }
}

pub fn post_link(entity: &Entity, message_id: i32) -> Option<String> {
    if let Some(username) = entity.username() {
        return Some(format!("https://t.me/{}/{}", username, message_id));
    }
    if entity.is_group_like() {
        return Some(format!("https://t.me/c/{}/{}", entity.id(), message_id));
    }
    None
}

/// Display name: stored name, else `<id><ext>` with the extension taken from
/// the attachment kind, the MIME type, or `.jpg` for photos.
pub fn best_file_name(message_id: i32, attachment: &Attachment) -> String {
    if let Some(name) = attachment.file_name.as_deref().filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let ext = attachment
        .extension
        .clone()
        .filter(|e| !e.is_empty())
        .or_else(|| attachment.mime_type.as_deref().and_then(guess_extension))
        .or_else(|| attachment.is_photo.then(|| ".jpg".to_string()))
        .unwrap_or_default();

    format!("{}{}", message_id, ext)
}

/// Extension (with leading dot) for a MIME type.
pub fn guess_extension(mime: &str) -> Option<String> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    if essence.is_empty() {
        return None;
    }
    let essence = essence.to_ascii_lowercase();

    let preferred = match essence.as_str() {
        "image/jpeg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "audio/mpeg" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "application/x-tgsticker" => Some("tgs"),
        "text/plain" => Some("txt"),
        _ => None,
    };

    preferred
        .or_else(|| {
            mime_guess::get_mime_extensions_str(&essence).and_then(|exts| exts.first().copied())
        })
        .map(|ext| format!(".{}", ext))
}

/// First [`SNIPPET_CHARS`] characters, or nothing for an empty body.
pub fn text_snippet(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(SNIPPET_CHARS).collect())
}
