//! OBS WebSocket session: a thin client over `tokio-tungstenite`.
//!
//! Performs the v5 `Hello`/`Identify` handshake, then hands the socket to a
//! background task that correlates responses with pending requests by id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::errors::ObsError;
use crate::protocol::{
    self, CLOSE_AUTHENTICATION_FAILED, Frame, Hello, Identify, RPC_VERSION, Request,
    RequestResponse, op,
};
use crate::rpc::ObsRpc;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pending request waiting for its response.
type PendingTx = oneshot::Sender<Result<Value, ObsError>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Internal message from the client handle to the socket task.
enum ClientCommand {
    Call {
        request_type: String,
        request_data: Option<Value>,
        response_tx: PendingTx,
    },
    Close {
        done_tx: oneshot::Sender<()>,
    },
}

/// A live, identified OBS WebSocket connection.
pub struct ObsClient {
    cmd_tx: mpsc::Sender<ClientCommand>,
    connected: Arc<AtomicBool>,
    _handler: JoinHandle<()>,
}

impl ObsClient {
    /// Connect to `url` and complete the identification handshake.
    #[tracing::instrument(skip(password))]
    pub async fn connect(url: &str, password: &str) -> Result<Self, ObsError> {
        let (mut ws, _) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| ObsError::Timeout {
                timeout_ms: duration_ms(HANDSHAKE_TIMEOUT),
                context: format!("connection to {url}"),
            })?
            .map_err(|e| ObsError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        identify(&mut ws, password).await?;
        info!(%url, "connected to OBS WebSocket");

        let connected = Arc::new(AtomicBool::new(true));
        let (cmd_tx, cmd_rx) = mpsc::channel::<ClientCommand>(32);
        let handler = tokio::spawn(handler_loop(ws, cmd_rx, connected.clone()));

        Ok(Self {
            cmd_tx,
            connected,
            _handler: handler,
        })
    }
}

#[async_trait]
impl ObsRpc for ObsClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    #[tracing::instrument(skip(self, request_data))]
    async fn call(
        &self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Value, ObsError> {
        if !self.is_connected() {
            return Err(ObsError::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(ClientCommand::Call {
                request_type: request_type.to_string(),
                request_data,
                response_tx: tx,
            })
            .await
            .map_err(|_| ObsError::NotConnected)?;

        tokio::time::timeout(REQUEST_TIMEOUT, rx)
            .await
            .map_err(|_| ObsError::Timeout {
                timeout_ms: duration_ms(REQUEST_TIMEOUT),
                context: request_type.to_string(),
            })?
            .map_err(|_| ObsError::NotConnected)?
    }

    async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(ClientCommand::Close { done_tx })
            .await
            .is_ok()
        {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, done_rx).await;
        }
        info!("disconnected from OBS");
    }
}

// ─── Handshake ───────────────────────────────────────────────────────────────

async fn identify(ws: &mut WsStream, password: &str) -> Result<(), ObsError> {
    let hello = expect_frame(ws, op::HELLO).await?;
    let hello: Hello = serde_json::from_value(hello.d)
        .map_err(|e| ObsError::Protocol(format!("malformed Hello: {e}")))?;
    debug!(version = ?hello.obs_web_socket_version, "received Hello");

    let authentication = hello
        .authentication
        .map(|c| protocol::authentication_string(password, &c.salt, &c.challenge));
    let identify = Identify {
        rpc_version: RPC_VERSION.min(hello.rpc_version),
        authentication,
        event_subscriptions: 0,
    };
    let text = protocol::encode(op::IDENTIFY, &identify)
        .map_err(|e| ObsError::Protocol(e.to_string()))?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| ObsError::Protocol(format!("failed to send Identify: {e}")))?;

    let _ = expect_frame(ws, op::IDENTIFIED).await?;
    Ok(())
}

/// Read frames until one arrives, failing unless it carries `opcode`.
async fn expect_frame(ws: &mut WsStream, opcode: u8) -> Result<Frame, ObsError> {
    let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, next_frame(ws))
        .await
        .map_err(|_| ObsError::Timeout {
            timeout_ms: duration_ms(HANDSHAKE_TIMEOUT),
            context: format!("handshake opcode {opcode}"),
        })??;
    if frame.op != opcode {
        return Err(ObsError::Protocol(format!(
            "expected opcode {opcode}, got {}",
            frame.op
        )));
    }
    Ok(frame)
}

async fn next_frame(ws: &mut WsStream) -> Result<Frame, ObsError> {
    while let Some(msg) = ws.next().await {
        match msg.map_err(|e| ObsError::Protocol(e.to_string()))? {
            Message::Text(text) => {
                return serde_json::from_str(&text)
                    .map_err(|e| ObsError::Protocol(format!("malformed frame: {e}")));
            }
            Message::Close(frame) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                    .unwrap_or_default();
                if code == CLOSE_AUTHENTICATION_FAILED {
                    return Err(ObsError::Authentication(reason));
                }
                return Err(ObsError::Protocol(format!(
                    "connection closed during handshake (code {code}): {reason}"
                )));
            }
            _ => {}
        }
    }
    Err(ObsError::Protocol(
        "connection closed during handshake".to_string(),
    ))
}

// ─── Socket task ─────────────────────────────────────────────────────────────

async fn handler_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
    connected: Arc<AtomicBool>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<String, PendingTx> = HashMap::new();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None => break,
                    Some(ClientCommand::Close { done_tx }) => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        let _ = done_tx.send(());
                        break;
                    }
                    Some(ClientCommand::Call { request_type, request_data, response_tx }) => {
                        let id = next_id.to_string();
                        next_id += 1;
                        let frame = protocol::encode(op::REQUEST, &Request {
                            request_type: &request_type,
                            request_id: &id,
                            request_data,
                        });
                        let text = match frame {
                            Ok(t) => t,
                            Err(e) => {
                                let _ = response_tx.send(Err(ObsError::Protocol(e.to_string())));
                                continue;
                            }
                        };
                        trace!(%request_type, %id, "sending request");
                        track(&mut pending, id, response_tx);
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => route_frame(&text, &mut pending),
                    Message::Close(frame) => {
                        warn!(?frame, "OBS closed the connection");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    // Dropping `pending` wakes every waiter with a closed channel.
    debug!(abandoned = pending.len(), "OBS socket task finished");
}

/// Register a waiter, first evicting waiters whose caller has timed out and
/// dropped its receiver.
fn track(pending: &mut HashMap<String, PendingTx>, id: String, tx: PendingTx) {
    pending.retain(|_, waiter| !waiter.is_closed());
    let _ = pending.insert(id, tx);
}

fn route_frame(text: &str, pending: &mut HashMap<String, PendingTx>) {
    let Ok(frame) = serde_json::from_str::<Frame>(text) else {
        warn!("ignoring malformed OBS frame");
        return;
    };
    match frame.op {
        op::REQUEST_RESPONSE => {
            let Ok(resp) = serde_json::from_value::<RequestResponse>(frame.d) else {
                warn!("ignoring malformed RequestResponse");
                return;
            };
            let Some(tx) = pending.remove(&resp.request_id) else {
                return;
            };
            let result = if resp.request_status.result {
                Ok(resp.response_data.unwrap_or(Value::Null))
            } else {
                Err(ObsError::Remote {
                    request: resp.request_type,
                    code: resp.request_status.code,
                    comment: resp.request_status.comment,
                })
            };
            let _ = tx.send(result);
        }
        op::EVENT => trace!("ignoring OBS event"),
        other => debug!(op = other, "ignoring unexpected opcode"),
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
