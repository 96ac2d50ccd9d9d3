//! Chat session seam and the Twitch IRC-over-WebSocket implementation.
//!
//! A [`TwitchSession`] is bound to exactly one access token. When the socket
//! drops unexpectedly the session reconnects with the same token and capped
//! exponential backoff; an explicit [`ChatSession::disconnect`] ends it for
//! good.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::errors::ChatError;
use crate::events::{ChatEvent, Inbound, SessionEvent, SessionId, route};
use crate::irc::IrcMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const RECONNECT_BASE_DELAY_MS: u64 = 1000;
const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// A live chat connection bound to one token.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Identity of this session.
    fn id(&self) -> SessionId;

    /// Send `text` to `channel` (name without `#`).
    async fn say(&self, channel: &str, text: &str) -> Result<(), ChatError>;

    /// Tear the session down. Idempotent; never reconnects afterwards.
    async fn disconnect(&self);
}

/// Builds chat sessions.
#[async_trait]
pub trait ChatConnector: Send + Sync {
    /// Open a session authenticated with `access_token`, delivering its
    /// events to `events`.
    async fn connect(
        &self,
        access_token: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn ChatSession>, ChatError>;
}

/// Exponential reconnect delay for the given attempt, capped at 30s.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exponential = RECONNECT_BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(31));
    Duration::from_millis(exponential.min(RECONNECT_MAX_DELAY_MS))
}

// ─── Connector ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Endpoint {
    url: String,
    address: String,
    port: u16,
    login: String,
    channel: String,
}

/// Connects to Twitch chat as `login` and joins one channel.
#[derive(Clone, Debug)]
pub struct TwitchConnector {
    endpoint: Arc<Endpoint>,
}

impl TwitchConnector {
    /// Connector for the server at `url`, logging in as `login` and joining
    /// `channel`.
    pub fn new(url: &str, login: &str, channel: &str) -> Result<Self, ChatError> {
        let invalid = |reason: &str| ChatError::Connect {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let uri: Uri = url.parse().map_err(|_| invalid("invalid URL"))?;
        let address = uri.host().ok_or_else(|| invalid("URL has no host"))?.to_string();
        let port = match (uri.port_u16(), uri.scheme_str()) {
            (Some(port), _) => port,
            (None, Some("wss")) => 443,
            (None, Some("ws")) => 80,
            _ => return Err(invalid("URL must use ws or wss")),
        };
        Ok(Self {
            endpoint: Arc::new(Endpoint {
                url: url.to_string(),
                address,
                port,
                login: login.to_ascii_lowercase(),
                channel: channel.trim_start_matches('#').to_ascii_lowercase(),
            }),
        })
    }
}

#[async_trait]
impl ChatConnector for TwitchConnector {
    #[tracing::instrument(skip_all, fields(url = %self.endpoint.url))]
    async fn connect(
        &self,
        access_token: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn ChatSession>, ChatError> {
        let ws = open(&self.endpoint, access_token).await?;

        let id = SessionId::next();
        let cancel = CancellationToken::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let task = SessionTask {
            id,
            endpoint: self.endpoint.clone(),
            access_token: access_token.to_string(),
            events,
            cancel: cancel.clone(),
            cmd_rx,
        };
        let handle = tokio::spawn(task.run(ws));
        info!(session = %id, channel = %self.endpoint.channel, "chat session opened");

        Ok(Arc::new(TwitchSession {
            id,
            cmd_tx,
            cancel,
            task: Mutex::new(Some(handle)),
        }))
    }
}

/// Open the socket and send the login sequence.
async fn open(endpoint: &Endpoint, access_token: &str) -> Result<WsStream, ChatError> {
    let connect_error = |reason: String| ChatError::Connect {
        url: endpoint.url.clone(),
        reason,
    };
    let (mut ws, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(endpoint.url.as_str()))
        .await
        .map_err(|_| connect_error("timed out".to_string()))?
        .map_err(|e| connect_error(e.to_string()))?;

    for line in login_lines(access_token, &endpoint.login, &endpoint.channel) {
        ws.send(Message::Text(line.into()))
            .await
            .map_err(|e| connect_error(e.to_string()))?;
    }
    Ok(ws)
}

fn login_lines(access_token: &str, login: &str, channel: &str) -> [String; 4] {
    [
        "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
        format!("PASS oauth:{access_token}"),
        format!("NICK {login}"),
        format!("JOIN #{channel}"),
    ]
}

// ─── Session handle ──────────────────────────────────────────────────────────

enum Outbound {
    Say {
        channel: String,
        text: String,
        done_tx: oneshot::Sender<Result<(), ChatError>>,
    },
}

/// Handle to a running Twitch chat session.
pub struct TwitchSession {
    id: SessionId,
    cmd_tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl ChatSession for TwitchSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::Closed);
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.cmd_tx
            .send(Outbound::Say {
                channel: channel.trim_start_matches('#').to_string(),
                text: text.replace(['\r', '\n'], " "),
                done_tx,
            })
            .await
            .map_err(|_| ChatError::Closed)?;
        tokio::time::timeout(SEND_TIMEOUT, done_rx)
            .await
            .map_err(|_| ChatError::Send("timed out waiting for the socket".to_string()))?
            .map_err(|_| ChatError::Closed)?
    }

    async fn disconnect(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(CLOSE_TIMEOUT, handle).await.is_err() {
                warn!(session = %self.id, "chat socket task did not stop in time");
            }
            info!(session = %self.id, "chat session closed");
        }
    }
}

impl Drop for TwitchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─── Socket task ─────────────────────────────────────────────────────────────

enum Exit {
    Cancelled,
    Lost(String),
}

struct SessionTask {
    id: SessionId,
    endpoint: Arc<Endpoint>,
    access_token: String,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
    cmd_rx: mpsc::Receiver<Outbound>,
}

impl SessionTask {
    async fn run(mut self, mut ws: WsStream) {
        let mut attempt: u32 = 0;
        loop {
            let reason = match self.pump(ws, &mut attempt).await {
                Exit::Cancelled => break,
                Exit::Lost(reason) => reason,
            };
            warn!(session = %self.id, %reason, "chat connection lost");
            self.emit(ChatEvent::Disconnected { reason }).await;

            ws = loop {
                let delay = reconnect_delay(attempt);
                attempt = attempt.saturating_add(1);
                debug!(session = %self.id, ?delay, "reconnecting to chat");
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        debug!(session = %self.id, "chat socket task finished");
                        return;
                    }
                    () = tokio::time::sleep(delay) => {}
                }
                match open(&self.endpoint, &self.access_token).await {
                    Ok(ws) => break ws,
                    Err(e) => warn!(session = %self.id, error = %e, "chat reconnect failed"),
                }
            };
        }
        debug!(session = %self.id, "chat socket task finished");
    }

    /// Drive one socket until it closes or the session is cancelled.
    async fn pump(&mut self, ws: WsStream, attempt: &mut u32) -> Exit {
        let (mut ws_tx, mut ws_rx) = ws.split();
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Exit::Cancelled;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(Outbound::Say { channel, text, done_tx }) = cmd else {
                        return Exit::Cancelled;
                    };
                    let line = format!("PRIVMSG #{channel} :{text}");
                    let result = ws_tx
                        .send(Message::Text(line.into()))
                        .await
                        .map_err(|e| ChatError::Send(e.to_string()));
                    let failed = result.is_err();
                    let _ = done_tx.send(result);
                    if failed {
                        return Exit::Lost("send failed".to_string());
                    }
                }
                msg = ws_rx.next() => {
                    let text = match msg {
                        None => return Exit::Lost("connection closed".to_string()),
                        Some(Err(e)) => return Exit::Lost(e.to_string()),
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map_or_else(
                                || "closed by server".to_string(),
                                |f| format!("closed by server: {}", f.reason.as_str()),
                            );
                            return Exit::Lost(reason);
                        }
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(_)) => continue,
                    };
                    for line in text.lines().filter(|l| !l.is_empty()) {
                        trace!(session = %self.id, %line, "chat line");
                        let Some(msg) = IrcMessage::parse(line) else {
                            continue;
                        };
                        match route(&msg) {
                            Inbound::Welcome => {
                                *attempt = 0;
                                self.emit(ChatEvent::Connected {
                                    address: self.endpoint.address.clone(),
                                    port: self.endpoint.port,
                                })
                                .await;
                            }
                            Inbound::Ping(payload) => {
                                let pong = Message::Text(format!("PONG :{payload}").into());
                                if ws_tx.send(pong).await.is_err() {
                                    return Exit::Lost("failed to answer PING".to_string());
                                }
                            }
                            Inbound::Reconnect => {
                                return Exit::Lost("server requested reconnect".to_string());
                            }
                            Inbound::Event(event) => self.emit(event).await,
                            Inbound::Ignore => {}
                        }
                    }
                }
            }
        }
    }

    async fn emit(&self, event: ChatEvent) {
        let _ = self
            .events
            .send(SessionEvent {
                session: self.id,
                event,
            })
            .await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
