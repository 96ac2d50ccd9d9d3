//! In-memory chat doubles for tests in this and downstream crates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::errors::ChatError;
use crate::events::{ChatEvent, SessionEvent, SessionId};
use crate::session::{ChatConnector, ChatSession};

/// Session that records what it was asked to say.
pub struct FakeChatSession {
    id: SessionId,
    token: String,
    events: mpsc::Sender<SessionEvent>,
    said: Mutex<Vec<(String, String)>>,
    disconnected: AtomicBool,
}

impl FakeChatSession {
    /// Token the session was opened with.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Every `(channel, text)` sent so far.
    pub fn said(&self) -> Vec<(String, String)> {
        self.said.lock().clone()
    }

    /// Whether the session has been torn down.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    /// Deliver `event` as if the server had produced it.
    pub async fn emit(&self, event: ChatEvent) {
        let _ = self
            .events
            .send(SessionEvent {
                session: self.id,
                event,
            })
            .await;
    }
}

#[async_trait]
impl ChatSession for FakeChatSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        if self.is_disconnected() {
            return Err(ChatError::Closed);
        }
        self.said.lock().push((channel.to_string(), text.to_string()));
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::Release);
    }
}

#[derive(Default)]
struct ConnectorState {
    sessions: Vec<Arc<FakeChatSession>>,
    failures_left: usize,
}

/// Connector handing out [`FakeChatSession`]s.
#[derive(Default)]
pub struct FakeChatConnector {
    state: Mutex<ConnectorState>,
}

impl FakeChatConnector {
    /// Connector whose connects all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connects fail.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().failures_left = n;
    }

    /// Every session opened so far, oldest first.
    pub fn sessions(&self) -> Vec<Arc<FakeChatSession>> {
        self.state.lock().sessions.clone()
    }

    /// Most recently opened session.
    pub fn latest(&self) -> Option<Arc<FakeChatSession>> {
        self.state.lock().sessions.last().cloned()
    }
}

#[async_trait]
impl ChatConnector for FakeChatConnector {
    async fn connect(
        &self,
        access_token: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn ChatSession>, ChatError> {
        let mut state = self.state.lock();
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(ChatError::Connect {
                url: "fake://chat".to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        let session = Arc::new(FakeChatSession {
            id: SessionId::next(),
            token: access_token.to_string(),
            events,
            said: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        });
        state.sessions.push(session.clone());
        Ok(session)
    }
}
