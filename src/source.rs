//! Message source abstraction
//!
//! The scrape pipeline only needs three things from a backend: a best-effort
//! invite join, reference resolution, and a lazy descending message stream.

use crate::chat::{ChannelRef, Entity, JoinOutcome};
use crate::error::Result;
use crate::record::ScrapedMessage;

/// Exclusive id interval passed to the backend. `None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdBounds {
    pub min_exclusive: Option<i32>,
    pub max_exclusive: Option<i32>,
}

impl IdBounds {
    pub fn admits(&self, id: i32) -> bool {
        self.min_exclusive.map_or(true, |min| id > min)
            && self.max_exclusive.map_or(true, |max| id < max)
    }

    /// No id can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        match (self.min_exclusive, self.max_exclusive) {
            (Some(min), Some(max)) => i64::from(max) - i64::from(min) <= 1,
            (Some(min), None) => min == i32::MAX,
            (None, Some(max)) => max <= i32::MIN + 1,
            (None, None) => false,
        }
    }

    /// Descending ids: everything at or below the lower bound is past the end.
    pub fn is_past_end(&self, id: i32) -> bool {
        self.min_exclusive.is_some_and(|min| id <= min)
    }
}

#[allow(async_fn_in_trait)]
pub trait MessageStream {
    /// Next message in descending id order, `None` once exhausted.
    async fn next(&mut self) -> Result<Option<ScrapedMessage>>;
}

#[allow(async_fn_in_trait)]
pub trait MessageSource {
    /// Backend handle for a resolved chat.
    type Target;
    type Messages: MessageStream;

    async fn join_invite(&self, hash: &str) -> JoinOutcome;

    async fn resolve(&self, reference: &ChannelRef) -> Result<(Entity, Self::Target)>;

    fn messages(&self, target: &Self::Target, bounds: IdBounds) -> Self::Messages;
}
