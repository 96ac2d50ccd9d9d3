//! Events produced by a chat session and the routing of raw IRC lines onto
//! them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::irc::IrcMessage;

/// Notice id for a suspended channel.
pub const NOTICE_CHANNEL_SUSPENDED: &str = "msg_channel_suspended";
/// Notice id for a banned bot account.
pub const NOTICE_BANNED: &str = "msg_banned";
/// Notice id assigned to the server's login-failure notice.
pub const NOTICE_AUTHENTICATION_FAILED: &str = "authentication_failed";
/// Notice id for notices that carry no `msg-id` and are not recognised.
pub const NOTICE_UNKNOWN: &str = "unknown";

/// Notice ids that mean the session's credentials are no longer accepted.
pub const AUTH_FAILURE_NOTICES: [&str; 3] = [
    NOTICE_CHANNEL_SUSPENDED,
    NOTICE_BANNED,
    NOTICE_AUTHENTICATION_FAILED,
];

/// Whether `notice_id` signals an authentication failure.
pub fn is_auth_failure_notice(notice_id: &str) -> bool {
    AUTH_FAILURE_NOTICES.contains(&notice_id)
}

/// Identity of one chat session. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat-{}", self.0)
    }
}

/// Sender identity attached to a chat message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatTags {
    /// Login name of the sender.
    pub username: String,
    /// Display name, when the server supplied one.
    pub display_name: Option<String>,
    /// Badge name to version (`broadcaster` → `1`).
    pub badges: BTreeMap<String, String>,
}

impl ChatTags {
    /// Whether the sender owns the channel.
    pub fn is_broadcaster(&self) -> bool {
        self.badges.get("broadcaster").is_some_and(|v| v == "1")
    }

    fn from_irc(msg: &IrcMessage) -> Self {
        let badges = msg
            .tag("badges")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|b| b.split_once('/'))
                    .map(|(name, version)| (name.to_string(), version.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            username: msg.nick().unwrap_or_default().to_ascii_lowercase(),
            display_name: msg.tag("display-name").map(str::to_string),
            badges,
        }
    }
}

/// Something that happened on a chat session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// Login accepted by the server.
    Connected {
        /// Server host.
        address: String,
        /// Server port.
        port: u16,
    },
    /// The socket dropped; the session will try to reconnect.
    Disconnected {
        /// Why the socket closed.
        reason: String,
    },
    /// Server notice.
    Notice {
        /// Channel the notice refers to, `*` for server-wide notices.
        channel: String,
        /// Classified notice id.
        notice_id: String,
        /// Human-readable notice text.
        message: String,
    },
    /// Chat message in a joined channel.
    Message {
        /// Channel name without `#`.
        channel: String,
        /// Sender identity.
        tags: ChatTags,
        /// Message text.
        text: String,
        /// Whether this is a local echo of the bot's own `say`. The server
        /// never echoes a connection's own PRIVMSG, so every message read
        /// off the socket has this unset, even when the bot is logged in
        /// as the broadcaster.
        is_self: bool,
    },
}

/// A [`ChatEvent`] tagged with the session that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEvent {
    /// Originating session.
    pub session: SessionId,
    /// The event.
    pub event: ChatEvent,
}

/// What the socket task should do with one inbound line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    Welcome,
    Ping(String),
    Reconnect,
    Event(ChatEvent),
    Ignore,
}

pub(crate) fn route(msg: &IrcMessage) -> Inbound {
    match msg.command.as_str() {
        "001" => Inbound::Welcome,
        "PING" => Inbound::Ping(msg.trailing().unwrap_or("tmi.twitch.tv").to_string()),
        "RECONNECT" => Inbound::Reconnect,
        "NOTICE" => {
            let message = msg.trailing().unwrap_or_default().to_string();
            let notice_id = msg
                .tag("msg-id")
                .map_or_else(|| classify_notice_text(&message), str::to_string);
            Inbound::Event(ChatEvent::Notice {
                channel: msg.channel().unwrap_or("*").to_string(),
                notice_id,
                message,
            })
        }
        "PRIVMSG" => {
            Inbound::Event(ChatEvent::Message {
                channel: msg.channel().unwrap_or_default().to_string(),
                tags: ChatTags::from_irc(msg),
                text: msg.trailing().unwrap_or_default().to_string(),
                is_self: false,
            })
        }
        _ => Inbound::Ignore,
    }
}

fn classify_notice_text(message: &str) -> String {
    if message.contains("Login authentication failed")
        || message.contains("Improperly formatted auth")
    {
        NOTICE_AUTHENTICATION_FAILED.to_string()
    } else {
        NOTICE_UNKNOWN.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
