//! Chat command invocations.

use irlbot_chat::ChatTags;

/// Prefix marking a chat message as a command.
pub const COMMAND_PREFIX: char = '!';

/// Privilege of the user issuing a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owner of the channel.
    Broadcaster,
    /// Channel moderator.
    Moderator,
    /// Anyone else.
    Viewer,
}

impl Role {
    /// Derive the role from message badges.
    pub fn from_tags(tags: &ChatTags) -> Self {
        if tags.is_broadcaster() {
            Self::Broadcaster
        } else if tags.badges.get("moderator").is_some_and(|v| v == "1") {
            Self::Moderator
        } else {
            Self::Viewer
        }
    }
}

/// One command typed into chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Channel the command was typed in, without `#`.
    pub channel: String,
    /// Login name of the sender.
    pub username: String,
    /// Sender privilege.
    pub role: Role,
    /// Command name, lowercased, without the prefix.
    pub command_name: String,
    /// Whitespace-separated arguments.
    pub args: Vec<String>,
}

impl CommandInvocation {
    /// Parse `text` as a command. Returns `None` unless it starts with `!`
    /// followed by a name.
    pub fn parse(channel: &str, tags: &ChatTags, text: &str) -> Option<Self> {
        let body = text.trim().strip_prefix(COMMAND_PREFIX)?;
        let mut words = body.split_whitespace();
        let command_name = words.next()?.to_lowercase();
        Some(Self {
            channel: channel.trim_start_matches('#').to_string(),
            username: tags.username.clone(),
            role: Role::from_tags(tags),
            command_name,
            args: words.map(str::to_string).collect(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
