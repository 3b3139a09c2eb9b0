//! In-memory message source and recording reporter

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use telegram_scraper::commands::Reporter;
use telegram_scraper::{
    Attachment, ChannelRef, Entity, Error, ExportBuffer, IdBounds, JoinOutcome, MessageSource,
    MessageStream, Result, ScrapedMessage,
};

pub fn public_channel() -> Entity {
    Entity::Channel {
        id: 1234567890,
        username: Some("testchannel".to_string()),
        title: "Test Channel".to_string(),
    }
}

pub fn private_channel() -> Entity {
    Entity::Channel {
        id: 555000111,
        username: None,
        title: "Secret: Room".to_string(),
    }
}

/// Messages `1..=count` in descending order; every third carries a photo.
pub fn history(count: i32) -> Vec<ScrapedMessage> {
    (1..=count)
        .rev()
        .map(|id| ScrapedMessage {
            id,
            date: Utc.timestamp_opt(1_700_000_000 + i64::from(id) * 60, 0).single(),
            text: Some(format!("post {}", id)),
            attachment: (id % 3 == 0).then(|| Attachment {
                mime_type: Some("image/jpeg".to_string()),
                size: Some(1000 + i64::from(id)),
                is_photo: true,
                ..Attachment::default()
            }),
        })
        .collect()
}

pub struct VecStream {
    items: VecDeque<ScrapedMessage>,
    bounds: IdBounds,
    fail_after: Option<usize>,
    yielded: usize,
}

impl MessageStream for VecStream {
    async fn next(&mut self) -> Result<Option<ScrapedMessage>> {
        if self.fail_after == Some(self.yielded) {
            return Err(Error::RateLimited { seconds: Some(42) });
        }
        if self.bounds.is_empty() {
            return Ok(None);
        }
        while let Some(message) = self.items.pop_front() {
            if self.bounds.is_past_end(message.id) {
                return Ok(None);
            }
            if self.bounds.admits(message.id) {
                self.yielded += 1;
                return Ok(Some(message));
            }
        }
        Ok(None)
    }
}

pub struct FakeSource {
    pub entity: Entity,
    pub messages: Vec<ScrapedMessage>,
    /// Fail with a rate limit after this many messages.
    pub fail_after: Option<usize>,
    pub missing: bool,
    pub join_succeeds: bool,
    pub joined: Mutex<Vec<String>>,
    pub resolved: Mutex<Vec<ChannelRef>>,
}

impl FakeSource {
    pub fn new(entity: Entity, messages: Vec<ScrapedMessage>) -> Self {
        Self {
            entity,
            messages,
            fail_after: None,
            missing: false,
            join_succeeds: true,
            joined: Mutex::new(Vec::new()),
            resolved: Mutex::new(Vec::new()),
        }
    }
}

impl MessageSource for FakeSource {
    type Target = ();
    type Messages = VecStream;

    async fn join_invite(&self, hash: &str) -> JoinOutcome {
        self.joined.lock().unwrap().push(hash.to_string());
        if self.join_succeeds {
            JoinOutcome::Joined
        } else {
            JoinOutcome::Failed("INVITE_HASH_EXPIRED".to_string())
        }
    }

    async fn resolve(&self, reference: &ChannelRef) -> Result<(Entity, ())> {
        self.resolved.lock().unwrap().push(reference.clone());
        if self.missing {
            return Err(Error::ChatNotFound(format!("{:?}", reference)));
        }
        Ok((self.entity.clone(), ()))
    }

    fn messages(&self, _target: &(), bounds: IdBounds) -> VecStream {
        VecStream {
            items: self.messages.iter().cloned().collect(),
            bounds,
            fail_after: self.fail_after,
            yielded: 0,
        }
    }
}

pub struct Delivery {
    pub file_name: String,
    pub caption: String,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingReporter {
    pub updates: Mutex<Vec<String>>,
    pub deliveries: Mutex<Vec<Delivery>>,
    pub finished: Mutex<usize>,
    pub fail_updates: bool,
    pub fail_finish: bool,
}

impl RecordingReporter {
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }

    pub fn finished(&self) -> usize {
        *self.finished.lock().unwrap()
    }
}

impl Reporter for RecordingReporter {
    async fn update(&self, text: &str) -> Result<()> {
        self.updates.lock().unwrap().push(text.to_string());
        if self.fail_updates {
            return Err(Error::BotError("message is not modified".to_string()));
        }
        Ok(())
    }

    async fn deliver(
        &self,
        file_name: &str,
        caption: &str,
        document: &ExportBuffer,
    ) -> Result<()> {
        self.deliveries.lock().unwrap().push(Delivery {
            file_name: file_name.to_string(),
            caption: caption.to_string(),
            data: document.as_bytes().to_vec(),
        });
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        *self.finished.lock().unwrap() += 1;
        if self.fail_finish {
            return Err(Error::BotError("message to delete not found".to_string()));
        }
        Ok(())
    }
}
