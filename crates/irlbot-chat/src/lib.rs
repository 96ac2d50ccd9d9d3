//! # irlbot-chat
//!
//! Twitch chat over IRC-on-WebSocket.
//!
//! - [`ChatConnector`] / [`ChatSession`]: the seam the runtime depends on
//! - [`TwitchConnector`]: real transport with PING handling and reconnect
//! - [`ChatEvent`]: connected / disconnected / notice / message events
//! - [`irc::IrcMessage`]: IRCv3 line parser
//! - [`testing`]: in-memory doubles

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod irc;
pub mod session;
pub mod testing;

pub use errors::ChatError;
pub use events::{
    AUTH_FAILURE_NOTICES, ChatEvent, ChatTags, NOTICE_AUTHENTICATION_FAILED, NOTICE_BANNED,
    NOTICE_CHANNEL_SUSPENDED, SessionEvent, SessionId, is_auth_failure_notice,
};
pub use session::{ChatConnector, ChatSession, TwitchConnector, TwitchSession, reconnect_delay};
