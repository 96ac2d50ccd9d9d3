//! Chat session orchestration: startup, token renewal and session rebuild.
//!
//! State machine:
//!
//! ```text
//! Disconnected → Connecting → Connected → Reauthenticating → Connecting → Connected …
//! ```
//!
//! Reauthentication is single-flight. A trigger that arrives while one is
//! running returns [`ReauthOutcome::AlreadyInProgress`] without doing
//! anything. Within one sequence the renewed token is persisted before the
//! replacement session is built, and the replacement is installed before the
//! old session is torn down.

use std::fmt;
use std::sync::Arc;

use irlbot_auth::TokenLifecycleManager;
use irlbot_chat::{ChatConnector, ChatSession, SessionEvent, SessionId, is_auth_failure_notice};
use irlbot_settings::RenewalSettings;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::RuntimeError;
use crate::holder::SessionHolder;
use crate::scheduler::RenewalScheduler;

/// Where the orchestrator is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No session; initial and terminal state.
    Disconnected,
    /// Acquiring a token and opening a session.
    Connecting,
    /// A session bound to the current token is live.
    Connected,
    /// Renewing the token. Also the degraded state after a failed renewal.
    Reauthenticating,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reauthenticating => "reauthenticating",
        };
        f.write_str(s)
    }
}

/// Result of a renewal trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReauthOutcome {
    /// The token is not close to expiry or the notice is unrelated to auth.
    NotNeeded,
    /// The notice came from a session that has already been replaced.
    StaleSession,
    /// Another reauthentication is running; this trigger was dropped.
    AlreadyInProgress,
    /// A new session bound to the renewed token is live.
    Renewed {
        /// The replacement session.
        session: SessionId,
    },
}

/// Owns the chat session and keeps it bound to a valid token.
pub struct SessionOrchestrator {
    tokens: Arc<TokenLifecycleManager>,
    connector: Arc<dyn ChatConnector>,
    events_tx: mpsc::Sender<SessionEvent>,
    renewal: RenewalSettings,
    holder: SessionHolder,
    state: watch::Sender<SessionState>,
    reauth: tokio::sync::Mutex<()>,
    scheduler: Mutex<Option<RenewalScheduler>>,
    shutdown: CancellationToken,
}

impl SessionOrchestrator {
    /// Create an orchestrator. Sessions it builds deliver their events to
    /// `events_tx`.
    pub fn new(
        tokens: Arc<TokenLifecycleManager>,
        connector: Arc<dyn ChatConnector>,
        events_tx: mpsc::Sender<SessionEvent>,
        renewal: RenewalSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            tokens,
            connector,
            events_tx,
            renewal,
            holder: SessionHolder::new(),
            state,
            reauth: tokio::sync::Mutex::new(()),
            scheduler: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The live chat session, if any.
    pub fn current_session(&self) -> Option<Arc<dyn ChatSession>> {
        self.holder.current()
    }

    /// The holder of the live session. Command replies resolve through it so
    /// they always reach the session that is current when they are sent.
    pub fn sessions(&self) -> &SessionHolder {
        &self.holder
    }

    /// Id of the live chat session, if any.
    pub fn current_session_id(&self) -> Option<SessionId> {
        self.holder.current_id()
    }

    /// Whether the periodic renewal timer is running.
    pub fn renewal_running(&self) -> bool {
        self.scheduler.lock().as_ref().is_some_and(RenewalScheduler::is_running)
    }

    /// Acquire a valid token, open the first session and start the renewal
    /// timer.
    ///
    /// On failure the orchestrator returns to `Disconnected`; the caller
    /// decides whether that is fatal.
    #[tracing::instrument(skip_all)]
    pub async fn start(self: &Arc<Self>) -> Result<SessionId, RuntimeError> {
        self.set_state(SessionState::Connecting);
        match self.open_session().await {
            Ok(id) => {
                self.set_state(SessionState::Connected);
                self.start_renewal();
                Ok(id)
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Periodic check: renew when the persisted token expires within the
    /// lookahead window, or when an earlier reauthentication failed and left
    /// the machine degraded.
    pub async fn check_and_renew(&self) -> Result<ReauthOutcome, RuntimeError> {
        if self.state() == SessionState::Reauthenticating {
            info!("previous reauthentication failed, retrying");
            return self.reauthenticate("retrying failed reauthentication").await;
        }
        if !self.tokens.is_expiring_soon(self.renewal.lookahead()) {
            debug!("token not expiring soon");
            return Ok(ReauthOutcome::NotNeeded);
        }
        info!("token expiring soon, renewing");
        self.reauthenticate("token expiring soon").await
    }

    /// React to a chat notice. Authentication-failure notices from the live
    /// session force an immediate reauthentication.
    pub async fn handle_notice(
        &self,
        session: SessionId,
        notice_id: &str,
        message: &str,
    ) -> Result<ReauthOutcome, RuntimeError> {
        if !is_auth_failure_notice(notice_id) {
            return Ok(ReauthOutcome::NotNeeded);
        }
        if self.holder.current_id() != Some(session) {
            debug!(%session, %notice_id, "ignoring auth notice from a replaced session");
            return Ok(ReauthOutcome::StaleSession);
        }
        warn!(%notice_id, %message, "chat reported an authentication failure");
        self.reauthenticate(notice_id).await
    }

    /// Renew the token and rebuild the chat session around it.
    ///
    /// Failures leave the orchestrator in `Reauthenticating` with the old
    /// session still installed; the next tick or notice retries.
    #[tracing::instrument(skip(self))]
    pub async fn reauthenticate(&self, reason: &str) -> Result<ReauthOutcome, RuntimeError> {
        let Ok(_guard) = self.reauth.try_lock() else {
            info!("reauthentication already in progress");
            return Ok(ReauthOutcome::AlreadyInProgress);
        };
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::ShuttingDown);
        }

        self.set_state(SessionState::Reauthenticating);
        match self.renew_session().await {
            Ok(session) => {
                self.set_state(SessionState::Connected);
                info!(%session, "chat session rebuilt with renewed token");
                Ok(ReauthOutcome::Renewed { session })
            }
            Err(RuntimeError::ShuttingDown) => {
                self.set_state(SessionState::Disconnected);
                Err(RuntimeError::ShuttingDown)
            }
            Err(e) => {
                self.set_state(SessionState::Reauthenticating);
                error!(error = %e, "reauthentication failed; run `irlbot auth` if this persists");
                Err(e)
            }
        }
    }

    /// Stop the renewal timer and tear down the chat session. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }
        if let Some(session) = self.holder.close() {
            session.disconnect().await;
        }
        self.set_state(SessionState::Disconnected);
    }

    async fn open_session(&self) -> Result<SessionId, RuntimeError> {
        let access_token = self.tokens.get_valid_token().await?;
        self.install(&access_token).await
    }

    async fn renew_session(&self) -> Result<SessionId, RuntimeError> {
        let tokens = self.tokens.refresh_persisted().await?;
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::ShuttingDown);
        }
        self.set_state(SessionState::Connecting);
        self.install(&tokens.access_token).await
    }

    /// Build a session for `access_token`, swap it in, then tear down the one
    /// it replaced.
    async fn install(&self, access_token: &str) -> Result<SessionId, RuntimeError> {
        let session = self
            .connector
            .connect(access_token, self.events_tx.clone())
            .await?;
        let id = session.id();
        match self.holder.replace(session) {
            Ok(Some(old)) => {
                debug!(old = %old.id(), new = %id, "tearing down replaced chat session");
                old.disconnect().await;
            }
            Ok(None) => {}
            Err(rejected) => {
                rejected.disconnect().await;
                return Err(RuntimeError::ShuttingDown);
            }
        }
        Ok(id)
    }

    fn start_renewal(self: &Arc<Self>) {
        let mut slot = self.scheduler.lock();
        if slot.is_some() || self.shutdown.is_cancelled() {
            return;
        }
        let weak = Arc::downgrade(self);
        *slot = Some(RenewalScheduler::start(
            self.renewal.check_interval(),
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(this) = weak.upgrade() {
                        this.renewal_tick().await;
                    }
                }
            },
        ));
        info!(
            interval_secs = self.renewal.check_interval_secs,
            lookahead_secs = self.renewal.lookahead_secs,
            "token renewal check scheduled"
        );
    }

    async fn renewal_tick(&self) {
        match self.check_and_renew().await {
            Ok(outcome) => debug!(?outcome, "renewal check finished"),
            Err(RuntimeError::ShuttingDown) => {}
            Err(e) => error!(error = %e, "scheduled token renewal failed; retrying on next tick"),
        }
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "session state changed");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
