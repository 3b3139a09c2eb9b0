//! Session management for the Telegram user client
//!
//! Provides:
//! - Conversion between a session file and its base64 credential string
//! - A per-command client built from that credential
//! - Guaranteed release through [`SessionClient::disconnect`]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use grammers_client::client::updates::UpdatesLike;
use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::chat::{self, ChannelRef, Entity, JoinOutcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::HistoryPages;
use crate::source::{IdBounds, MessageSource};

/// Serialize a session file into the credential string kept in `SESSION_STRING`.
pub fn encode_session<P: AsRef<Path>>(path: P) -> Result<String> {
    let bytes = fs::read(path.as_ref())?;
    if bytes.is_empty() {
        return Err(Error::SessionError("Session file is empty".to_string()));
    }
    Ok(STANDARD.encode(bytes))
}

/// Materialize a credential string as a private temporary session file.
pub fn decode_session(encoded: &str) -> Result<NamedTempFile> {
    let compact: String = encoded.split_whitespace().collect();
    if compact.is_empty() {
        return Err(Error::SessionError("Session string is empty".to_string()));
    }
    let bytes = STANDARD.decode(compact)?;

    let file = new_session_file()?;
    fs::write(file.path(), bytes)?;
    Ok(file)
}

/// Empty temporary file to hold a session database.
pub fn new_session_file() -> Result<NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix("tg-scraper-")
        .suffix(".session")
        .tempfile()?)
}

pub fn open_session(path: &Path) -> Result<Arc<SqliteSession>> {
    let session = SqliteSession::open(path)
        .map_err(|e| Error::SessionError(format!("Failed to load session: {}", e)))?;
    Ok(Arc::new(session))
}

/// Holder for SenderPool components and Client
pub struct TelegramClient {
    pub client: Client,
    // Keeps the runner's request channel open for the lifetime of `client`.
    _handle: SenderPoolHandle,
    // Never read: the scraper does not consume updates, but the pool expects a live receiver.
    _updates: mpsc::UnboundedReceiver<UpdatesLike>,
    runner: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    /// Start the sender pool for `session`.
    pub fn start(session: Arc<SqliteSession>, api_id: i32) -> Self {
        let pool = SenderPool::new(session, api_id);

        // Create client from pool (need reference to whole pool)
        let client = Client::new(&pool);

        let SenderPool {
            runner,
            updates,
            handle,
        } = pool;
        let runner = tokio::spawn(async move {
            runner.run().await;
        });

        Self {
            client,
            _handle: handle,
            _updates: updates,
            runner,
        }
    }

    /// Stop the network runner. Safe to call more than once.
    pub fn shutdown(&self) {
        self.runner.abort();
    }
}

impl Drop for TelegramClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// One authenticated connection, owned by a single command.
pub struct SessionClient {
    inner: TelegramClient,
    // Keeps the decoded session on disk for the lifetime of the connection.
    _session_file: NamedTempFile,
}

impl SessionClient {
    /// Connect with the credential from `config` and check it is still valid.
    pub async fn connect(config: &Config) -> Result<Self> {
        let session_file = decode_session(&config.session_string)?;
        let session = open_session(session_file.path())?;
        let inner = TelegramClient::start(session, config.api_id);

        let authorized = inner
            .is_authorized()
            .await
            .map_err(|e| Error::ConnectionError(e.to_string()))?;
        if !authorized {
            inner.shutdown();
            return Err(Error::ConnectionError(
                "Session is not authorized (expired or revoked SESSION_STRING)".to_string(),
            ));
        }

        debug!("Telegram session connected");
        Ok(Self {
            inner,
            _session_file: session_file,
        })
    }

    pub fn client(&self) -> &Client {
        &self.inner
    }

    /// Release the connection. Consuming `self` makes a second call impossible.
    pub async fn disconnect(self) {
        self.inner.shutdown();
        info!("Telegram session released");
    }
}

impl MessageSource for SessionClient {
    type Target = Peer;
    type Messages = HistoryPages;

    async fn join_invite(&self, hash: &str) -> JoinOutcome {
        chat::join_invite(self.client(), hash).await
    }

    async fn resolve(&self, reference: &ChannelRef) -> Result<(Entity, Peer)> {
        let peer = chat::resolve_reference(self.client(), reference).await?;
        Ok((Entity::from_peer(&peer), peer))
    }

    fn messages(&self, target: &Peer, bounds: IdBounds) -> HistoryPages {
        HistoryPages::new(self.client().clone(), chat::peer_to_input(target), bounds)
    }
}
