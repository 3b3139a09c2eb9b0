//! Paginated message history over `messages.getHistory`
//!
//! Converts raw TL messages into [`ScrapedMessage`] so nothing downstream
//! depends on grammers types.

use std::collections::VecDeque;

use chrono::DateTime;
use grammers_client::Client;
use grammers_tl_types as tl;
use tracing::debug;

use crate::config::HISTORY_PAGE_SIZE;
use crate::error::Result;
use crate::record::{Attachment, ScrapedMessage};
use crate::source::{IdBounds, MessageStream};

/// Lazy, descending walk over one chat's history.
pub struct HistoryPages {
    client: Client,
    peer: tl::enums::InputPeer,
    bounds: IdBounds,
    buffer: VecDeque<tl::enums::Message>,
    offset_id: i32,
    exhausted: bool,
}

impl HistoryPages {
    pub fn new(client: Client, peer: tl::enums::InputPeer, bounds: IdBounds) -> Self {
        Self {
            client,
            peer,
            bounds,
            buffer: VecDeque::new(),
            offset_id: 0,
            exhausted: bounds.is_empty(),
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let request = tl::functions::messages::GetHistory {
            peer: self.peer.clone(),
            offset_id: self.offset_id,
            offset_date: 0,
            add_offset: 0,
            limit: HISTORY_PAGE_SIZE,
            max_id: self.bounds.max_exclusive.unwrap_or(0),
            min_id: self.bounds.min_exclusive.unwrap_or(0),
            hash: 0,
        };

        let (batch, complete) = match self.client.invoke(&request).await? {
            tl::enums::messages::Messages::Messages(m) => (m.messages, true),
            tl::enums::messages::Messages::Slice(m) => (m.messages, false),
            tl::enums::messages::Messages::ChannelMessages(m) => (m.messages, false),
            tl::enums::messages::Messages::NotModified(_) => (Vec::new(), true),
        };

        debug!(
            offset_id = self.offset_id,
            fetched = batch.len(),
            "Fetched history page"
        );

        if complete || batch.len() < HISTORY_PAGE_SIZE as usize {
            self.exhausted = true;
        }
        match batch.iter().map(raw_message_id).min() {
            Some(lowest) => self.offset_id = lowest,
            None => self.exhausted = true,
        }

        self.buffer.extend(batch);
        Ok(())
    }
}

impl MessageStream for HistoryPages {
    async fn next(&mut self) -> Result<Option<ScrapedMessage>> {
        loop {
            if let Some(raw) = self.buffer.pop_front() {
                let id = raw_message_id(&raw);
                if self.bounds.is_past_end(id) {
                    self.buffer.clear();
                    self.exhausted = true;
                    continue;
                }
                if !self.bounds.admits(id) {
                    continue;
                }
                if let Some(message) = scraped_from_raw(&raw) {
                    return Ok(Some(message));
                }
                continue;
            }

            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }
}

pub fn raw_message_id(message: &tl::enums::Message) -> i32 {
    match message {
        tl::enums::Message::Empty(m) => m.id,
        tl::enums::Message::Message(m) => m.id,
        tl::enums::Message::Service(m) => m.id,
    }
}

/// Backend-neutral view of a raw message. Empty placeholders yield `None`.
pub fn scraped_from_raw(message: &tl::enums::Message) -> Option<ScrapedMessage> {
    match message {
        tl::enums::Message::Empty(_) => None,
        tl::enums::Message::Message(m) => Some(ScrapedMessage {
            id: m.id,
            date: DateTime::from_timestamp(i64::from(m.date), 0),
            text: (!m.message.is_empty()).then(|| m.message.clone()),
            attachment: m.media.as_ref().and_then(attachment_from_media),
        }),
        tl::enums::Message::Service(m) => Some(ScrapedMessage {
            id: m.id,
            date: DateTime::from_timestamp(i64::from(m.date), 0),
            text: None,
            attachment: None,
        }),
    }
}

/// Photos and documents count as files, including link-preview media.
pub fn attachment_from_media(media: &tl::enums::MessageMedia) -> Option<Attachment> {
    match media {
        tl::enums::MessageMedia::Photo(p) => p.photo.as_ref().and_then(photo_attachment),
        tl::enums::MessageMedia::Document(d) => d.document.as_ref().and_then(document_attachment),
        tl::enums::MessageMedia::WebPage(w) => match &w.webpage {
            tl::enums::WebPage::Page(page) => page
                .photo
                .as_ref()
                .and_then(photo_attachment)
                .or_else(|| page.document.as_ref().and_then(document_attachment)),
            _ => None,
        },
        _ => None,
    }
}

fn photo_attachment(photo: &tl::enums::Photo) -> Option<Attachment> {
    match photo {
        tl::enums::Photo::Photo(p) => Some(Attachment {
            file_name: None,
            extension: None,
            mime_type: Some("image/jpeg".to_string()),
            size: p.sizes.last().and_then(photo_size_bytes),
            is_photo: true,
        }),
        tl::enums::Photo::Empty(_) => None,
    }
}

/// Byte count of one photo size, when the server reports it.
pub fn photo_size_bytes(size: &tl::enums::PhotoSize) -> Option<i64> {
    match size {
        tl::enums::PhotoSize::Size(s) => Some(i64::from(s.size)),
        tl::enums::PhotoSize::Progressive(s) => s.sizes.iter().max().map(|b| i64::from(*b)),
        tl::enums::PhotoSize::PhotoCachedSize(s) => Some(s.bytes.len() as i64),
        tl::enums::PhotoSize::PhotoStrippedSize(s) => Some(s.bytes.len() as i64),
        tl::enums::PhotoSize::PhotoPathSize(s) => Some(s.bytes.len() as i64),
        tl::enums::PhotoSize::Empty(_) => None,
    }
}

pub fn document_attachment(document: &tl::enums::Document) -> Option<Attachment> {
    match document {
        tl::enums::Document::Document(doc) => {
            let file_name = doc.attributes.iter().find_map(|attr| match attr {
                tl::enums::DocumentAttribute::Filename(f) => Some(f.file_name.clone()),
                _ => None,
            });
            let mime_type = (!doc.mime_type.is_empty()).then(|| doc.mime_type.clone());
            Some(Attachment {
                file_name,
                extension: declared_extension(&doc.attributes, &doc.mime_type),
                mime_type,
                size: Some(doc.size),
                is_photo: false,
            })
        }
        tl::enums::Document::Empty(_) => None,
    }
}

/// Extension implied by the document kind rather than its MIME type.
fn declared_extension(attributes: &[tl::enums::DocumentAttribute], mime: &str) -> Option<String> {
    attributes.iter().find_map(|attr| match attr {
        tl::enums::DocumentAttribute::Sticker(_) => Some(
            match mime {
                "application/x-tgsticker" => ".tgs",
                "video/webm" => ".webm",
                _ => ".webp",
            }
            .to_string(),
        ),
        tl::enums::DocumentAttribute::Audio(a) if a.voice => Some(".oga".to_string()),
        _ => None,
    })
}
