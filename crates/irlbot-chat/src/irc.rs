//! IRCv3 line parsing.
//!
//! Handles the subset Twitch emits: optional `@tags`, optional `:prefix`,
//! a command, middle params and a trailing param.

use std::collections::HashMap;

/// One parsed IRC line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IrcMessage {
    /// Unescaped IRCv3 message tags.
    pub tags: HashMap<String, String>,
    /// Source prefix without the leading `:`.
    pub prefix: Option<String>,
    /// Command or numeric reply.
    pub command: String,
    /// Middle params followed by the trailing param, if any.
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a single line. Returns `None` for empty or truncated input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw, tail) = stripped.split_once(' ')?;
            for pair in raw.split(';').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let _ = tags.insert(key.to_string(), unescape_tag(value));
            }
            rest = tail.trim_start();
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, tail) = stripped.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = tail.trim_start();
        }

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut parts = head.split_ascii_whitespace();
        let command = parts.next()?.to_string();
        let mut params: Vec<String> = parts.map(str::to_string).collect();
        if let Some(t) = trailing {
            params.push(t.to_string());
        }

        Some(Self {
            tags,
            prefix,
            command,
            params,
        })
    }

    /// Nickname portion of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split_once('!').map_or(p, |(nick, _)| nick))
    }

    /// Tag value, treating empty values as absent.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Last param, which carries the message text for most commands.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// First param with any leading `#` removed.
    pub fn channel(&self) -> Option<&str> {
        self.params.first().map(|c| c.trim_start_matches('#'))
    }
}

fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_privmsg() {
        let msg = IrcMessage::parse(
            "@badges=broadcaster/1,subscriber/0;display-name=Streamer;user-id=42 \
             :streamer!streamer@streamer.tmi.twitch.tv PRIVMSG #streamer :!startirl now",
        )
        .unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.nick(), Some("streamer"));
        assert_eq!(msg.channel(), Some("streamer"));
        assert_eq!(msg.trailing(), Some("!startirl now"));
        assert_eq!(msg.tag("badges"), Some("broadcaster/1,subscriber/0"));
        assert_eq!(msg.tag("display-name"), Some("Streamer"));
    }

    #[test]
    fn parses_ping_without_prefix() {
        let msg = IrcMessage::parse("PING :tmi.twitch.tv\r\n").unwrap();
        assert_eq!(msg.command, "PING");
        assert!(msg.prefix.is_none());
        assert_eq!(msg.params, vec!["tmi.twitch.tv"]);
    }

    #[test]
    fn parses_numeric_with_middle_params() {
        let msg = IrcMessage::parse(":tmi.twitch.tv 001 bot :Welcome, GLHF!").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["bot", "Welcome, GLHF!"]);
    }

    #[test]
    fn trailing_may_contain_colons() {
        let msg = IrcMessage::parse(":a!a@a PRIVMSG #c :time is 12:30 :)").unwrap();
        assert_eq!(msg.trailing(), Some("time is 12:30 :)"));
    }

    #[test]
    fn unescapes_tag_values() {
        let msg =
            IrcMessage::parse(r"@system-msg=hello\sworld\:\\done;empty= :tmi.twitch.tv USERNOTICE #c")
                .unwrap();
        assert_eq!(msg.tag("system-msg"), Some(r"hello world;\done"));
        assert_eq!(msg.tag("empty"), None);
        assert!(msg.tags.contains_key("empty"));
    }

    #[test]
    fn nick_without_user_part() {
        let msg = IrcMessage::parse(":tmi.twitch.tv NOTICE * :Login authentication failed").unwrap();
        assert_eq!(msg.nick(), Some("tmi.twitch.tv"));
        assert_eq!(msg.channel(), Some("*"));
    }

    #[test]
    fn rejects_empty_and_truncated_lines() {
        assert!(IrcMessage::parse("").is_none());
        assert!(IrcMessage::parse("@tags-without-command").is_none());
        assert!(IrcMessage::parse(":prefix-only").is_none());
    }
}
