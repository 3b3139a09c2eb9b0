//! Channel references and entity resolution

use once_cell::sync::Lazy;

use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_tl_types as tl;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

static TME_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:https?://)?(?i:www\.)?(?i:t\.me|telegram\.me|telegram\.dog)/(.+)$")
        .expect("t.me link pattern")
});

/// What the operator pointed us at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Public username, with or without `@`, or a public t.me link.
    Username(String),
    /// Private link `t.me/c/<id>` or a marked `-100<id>` identifier.
    PrivateChannel(i64),
    /// Invite link `t.me/+<hash>` or `t.me/joinchat/<hash>`.
    Invite(String),
}

impl ChannelRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::InvalidReference("empty reference".to_string()));
        }

        if let Some(caps) = TME_LINK.captures(reference) {
            return Self::parse_link_path(reference, &caps[1]);
        }

        if let Some(digits) = reference.strip_prefix("-100") {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return digits
                    .parse()
                    .map(ChannelRef::PrivateChannel)
                    .map_err(|_| Error::InvalidReference(reference.to_string()));
            }
        }

        let username = reference.trim_start_matches('@');
        if username.is_empty() {
            return Err(Error::InvalidReference(reference.to_string()));
        }
        Ok(ChannelRef::Username(username.to_string()))
    }

    fn parse_link_path(reference: &str, path: &str) -> Result<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments
            .next()
            .ok_or_else(|| Error::InvalidReference(reference.to_string()))?;

        if let Some(hash) = first.strip_prefix('+') {
            return Self::invite(reference, hash);
        }

        match first {
            "joinchat" => Self::invite(reference, segments.next().unwrap_or_default()),
            "c" => segments
                .next()
                .and_then(|id| id.parse::<i64>().ok())
                .map(ChannelRef::PrivateChannel)
                .ok_or_else(|| Error::InvalidReference(reference.to_string())),
            "s" => segments
                .next()
                .map(|name| ChannelRef::Username(name.to_string()))
                .ok_or_else(|| Error::InvalidReference(reference.to_string())),
            name => Ok(ChannelRef::Username(name.trim_start_matches('@').to_string())),
        }
    }

    fn invite(reference: &str, hash: &str) -> Result<Self> {
        if hash.is_empty() {
            return Err(Error::InvalidReference(reference.to_string()));
        }
        Ok(ChannelRef::Invite(hash.to_string()))
    }

    /// Invite token to join with before resolving, if any.
    pub fn invite_hash(&self) -> Option<&str> {
        match self {
            ChannelRef::Invite(hash) => Some(hash),
            _ => None,
        }
    }
}

/// Resolved chat, reduced to what the exporter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// Broadcast channel or supergroup.
    Channel {
        id: i64,
        username: Option<String>,
        title: String,
    },
    /// Basic group.
    Chat { id: i64, title: String },
    User {
        id: i64,
        username: Option<String>,
        first_name: Option<String>,
    },
}

impl Entity {
    pub fn id(&self) -> i64 {
        match self {
            Entity::Channel { id, .. } | Entity::Chat { id, .. } | Entity::User { id, .. } => *id,
        }
    }

    /// Public username, if the entity has a non-empty one.
    pub fn username(&self) -> Option<&str> {
        match self {
            Entity::Channel { username, .. } | Entity::User { username, .. } => {
                username.as_deref().filter(|u| !u.is_empty())
            }
            Entity::Chat { .. } => None,
        }
    }

    /// Title for channels and groups, first name for users.
    pub fn title(&self) -> &str {
        match self {
            Entity::Channel { title, .. } | Entity::Chat { title, .. } => title,
            Entity::User { first_name, .. } => first_name.as_deref().unwrap_or_default(),
        }
    }

    /// Channels and groups have `t.me/c/` permalinks; users don't.
    pub fn is_group_like(&self) -> bool {
        matches!(self, Entity::Channel { .. } | Entity::Chat { .. })
    }

    pub fn is_private(&self) -> bool {
        self.username().is_none()
    }

    pub fn from_peer(peer: &Peer) -> Self {
        match peer {
            Peer::Channel(channel) => Entity::Channel {
                id: channel.raw.id,
                username: channel.raw.username.clone(),
                title: channel.title().to_string(),
            },
            Peer::Group(group) => Self::from_raw_chat(&group.raw),
            Peer::User(user) => Entity::User {
                id: user.raw.id(),
                username: user.username().map(|u| u.to_string()),
                first_name: user.first_name().map(|n| n.to_string()),
            },
        }
    }

    fn from_raw_chat(chat: &tl::enums::Chat) -> Self {
        match chat {
            tl::enums::Chat::Channel(c) => Entity::Channel {
                id: c.id,
                username: c.username.clone(),
                title: c.title.clone(),
            },
            tl::enums::Chat::ChannelForbidden(c) => Entity::Channel {
                id: c.id,
                username: None,
                title: c.title.clone(),
            },
            tl::enums::Chat::Chat(c) => Entity::Chat {
                id: c.id,
                title: c.title.clone(),
            },
            tl::enums::Chat::Forbidden(c) => Entity::Chat {
                id: c.id,
                title: c.title.clone(),
            },
            tl::enums::Chat::Empty(c) => Entity::Chat {
                id: c.id,
                title: String::new(),
            },
        }
    }
}

/// Outcome of the best-effort invite join. Callers may ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Failed(String),
}

fn raw_chat_id(chat: &tl::enums::Chat) -> i64 {
    match chat {
        tl::enums::Chat::Empty(c) => c.id,
        tl::enums::Chat::Chat(c) => c.id,
        tl::enums::Chat::Forbidden(c) => c.id,
        tl::enums::Chat::Channel(c) => c.id,
        tl::enums::Chat::ChannelForbidden(c) => c.id,
    }
}

/// Bare id of a peer as used in `t.me/c/` links.
pub fn raw_peer_id(peer: &Peer) -> i64 {
    match peer {
        Peer::User(u) => u.raw.id(),
        Peer::Group(g) => raw_chat_id(&g.raw),
        Peer::Channel(c) => c.raw.id,
    }
}

/// Convert a Peer to InputPeer for API calls.
pub fn peer_to_input(peer: &Peer) -> tl::enums::InputPeer {
    match peer {
        Peer::User(user) => {
            let (user_id, access_hash) = match &user.raw {
                tl::enums::User::User(u) => (u.id, u.access_hash.unwrap_or(0)),
                tl::enums::User::Empty(u) => (u.id, 0),
            };
            tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id,
                access_hash,
            })
        }
        Peer::Channel(channel) => tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: channel.raw.id,
            access_hash: channel.raw.access_hash.unwrap_or(0),
        }),
        Peer::Group(group) => match &group.raw {
            tl::enums::Chat::Chat(c) => {
                tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: c.id })
            }
            tl::enums::Chat::Channel(c) => {
                tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                    channel_id: c.id,
                    access_hash: c.access_hash.unwrap_or(0),
                })
            }
            tl::enums::Chat::ChannelForbidden(c) => {
                tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                    channel_id: c.id,
                    access_hash: c.access_hash,
                })
            }
            _ => tl::enums::InputPeer::Empty,
        },
    }
}

/// Find a channel or group among the session's dialogs by bare id.
async fn find_in_dialogs(client: &Client, target_id: i64) -> Result<Peer> {
    let mut dialogs = client.iter_dialogs();

    while let Some(dialog) = dialogs.next().await? {
        if matches!(dialog.peer, Peer::Channel(_) | Peer::Group(_))
            && raw_peer_id(&dialog.peer) == target_id
        {
            return Ok(dialog.peer);
        }
    }

    Err(Error::ChatNotFound(format!(
        "Chat {} not found in dialogs (is the session a member?)",
        target_id
    )))
}

/// Try to join a chat through its invite token.
pub async fn join_invite(client: &Client, hash: &str) -> JoinOutcome {
    let request = tl::functions::messages::ImportChatInvite {
        hash: hash.to_string(),
    };
    match client.invoke(&request).await {
        Ok(_) => JoinOutcome::Joined,
        Err(e) => JoinOutcome::Failed(e.to_string()),
    }
}

/// Chat behind an invite, if the session can already see the chat.
async fn invited_chat(client: &Client, hash: &str) -> Result<tl::enums::Chat> {
    let request = tl::functions::messages::CheckChatInvite {
        hash: hash.to_string(),
    };
    match client.invoke(&request).await? {
        tl::enums::ChatInvite::Already(invite) => Ok(invite.chat),
        tl::enums::ChatInvite::Peek(invite) => Ok(invite.chat),
        tl::enums::ChatInvite::Invite(invite) => Err(Error::ChatNotFound(format!(
            "Not a member of invited chat '{}'",
            invite.title
        ))),
    }
}

/// Peer for an invited chat, when the invite carries enough to address it.
fn invite_peer(chat: tl::enums::Chat) -> Option<Peer> {
    let peer = Peer::from_raw(chat);
    match peer_to_input(&peer) {
        tl::enums::InputPeer::Empty => None,
        tl::enums::InputPeer::Channel(c) if c.access_hash == 0 => None,
        _ => Some(peer),
    }
}

/// Resolve a reference to a peer the session can read.
pub async fn resolve_reference(client: &Client, reference: &ChannelRef) -> Result<Peer> {
    debug!(?reference, "Resolving channel reference");
    match reference {
        ChannelRef::Username(username) => client
            .resolve_username(username)
            .await?
            .ok_or_else(|| Error::ChatNotFound(format!("Username @{} not found", username))),
        ChannelRef::PrivateChannel(id) => find_in_dialogs(client, *id).await,
        ChannelRef::Invite(hash) => {
            let chat = invited_chat(client, hash).await?;
            let chat_id = raw_chat_id(&chat);
            match invite_peer(chat) {
                Some(peer) => Ok(peer),
                None => {
                    debug!(chat_id, "Invite chat not addressable, scanning dialogs");
                    find_in_dialogs(client, chat_id).await
                }
            }
        }
    }
}
