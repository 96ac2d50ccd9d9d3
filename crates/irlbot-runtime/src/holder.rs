//! Owner of the single live chat session.
//!
//! Readers always observe either the previous, still-live session or its
//! fully-built replacement. Once closed, the holder rejects new sessions so a
//! reauthentication racing shutdown cannot leak a connection.

use std::sync::Arc;

use irlbot_chat::{ChatSession, SessionId};
use parking_lot::RwLock;

#[derive(Default)]
struct Slot {
    current: Option<Arc<dyn ChatSession>>,
    closed: bool,
}

/// Atomic holder for the current chat session.
#[derive(Default)]
pub struct SessionHolder {
    slot: RwLock<Slot>,
}

impl SessionHolder {
    /// Empty, open holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live session, if any.
    pub fn current(&self) -> Option<Arc<dyn ChatSession>> {
        self.slot.read().current.clone()
    }

    /// Id of the live session, if any.
    pub fn current_id(&self) -> Option<SessionId> {
        self.slot.read().current.as_ref().map(|s| s.id())
    }

    /// Install `next`, returning the session it displaced so the caller can
    /// tear it down. When the holder is closed, `next` is handed back as the
    /// error.
    pub fn replace(
        &self,
        next: Arc<dyn ChatSession>,
    ) -> Result<Option<Arc<dyn ChatSession>>, Arc<dyn ChatSession>> {
        let mut slot = self.slot.write();
        if slot.closed {
            return Err(next);
        }
        Ok(slot.current.replace(next))
    }

    /// Close the holder and take the live session out of it.
    pub fn close(&self) -> Option<Arc<dyn ChatSession>> {
        let mut slot = self.slot.write();
        slot.closed = true;
        slot.current.take()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.slot.read().closed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use irlbot_chat::ChatConnector;
    use irlbot_chat::testing::FakeChatConnector;
    use tokio::sync::mpsc;

    async fn session(connector: &FakeChatConnector) -> Arc<dyn ChatSession> {
        let (tx, _rx) = mpsc::channel(1);
        connector.connect("tok", tx).await.unwrap()
    }

    #[tokio::test]
    async fn replace_returns_previous_session() {
        let connector = FakeChatConnector::new();
        let holder = SessionHolder::new();
        let first = session(&connector).await;
        let second = session(&connector).await;

        assert!(holder.replace(first.clone()).ok().unwrap().is_none());
        assert_eq!(holder.current_id(), Some(first.id()));

        let displaced = holder.replace(second.clone()).ok().flatten().unwrap();
        assert_eq!(displaced.id(), first.id());
        assert_eq!(holder.current_id(), Some(second.id()));
    }

    #[tokio::test]
    async fn closed_holder_rejects_new_sessions() {
        let connector = FakeChatConnector::new();
        let holder = SessionHolder::new();
        let first = session(&connector).await;
        assert!(holder.replace(first.clone()).is_ok());

        let taken = holder.close().unwrap();
        assert_eq!(taken.id(), first.id());
        assert!(holder.is_closed());
        assert!(holder.current().is_none());

        let late = session(&connector).await;
        let rejected = holder.replace(late.clone()).err().unwrap();
        assert_eq!(rejected.id(), late.id());
        assert!(holder.current().is_none());
    }
}
