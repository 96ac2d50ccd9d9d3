//! OBS WebSocket v5 wire format.
//!
//! Every frame is `{"op": <opcode>, "d": <payload>}`. Only the opcodes the
//! bot needs are modelled: the identification handshake and request/response.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// RPC version the client negotiates.
pub const RPC_VERSION: u32 = 1;

/// Close code OBS sends when the identify payload fails authentication.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// Frame opcodes.
pub mod op {
    /// Server greeting with optional auth challenge.
    pub const HELLO: u8 = 0;
    /// Client identification.
    pub const IDENTIFY: u8 = 1;
    /// Server acknowledgement of identification.
    pub const IDENTIFIED: u8 = 2;
    /// Server event.
    pub const EVENT: u8 = 5;
    /// Client request.
    pub const REQUEST: u8 = 6;
    /// Server response to a request.
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// Generic frame envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    /// Opcode.
    pub op: u8,
    /// Opcode-specific payload.
    pub d: Value,
}

/// `Hello` payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    /// Server plugin version.
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    /// Latest RPC version the server speaks.
    pub rpc_version: u32,
    /// Present when the server requires a password.
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

/// Authentication challenge inside `Hello`.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthChallenge {
    /// Per-connection challenge.
    pub challenge: String,
    /// Per-password salt.
    pub salt: String,
}

/// `Identify` payload.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    /// Negotiated RPC version.
    pub rpc_version: u32,
    /// Challenge answer, when the server asked for one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    /// Event subscription bitmask; the bot subscribes to nothing.
    pub event_subscriptions: u32,
}

/// `Request` payload.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<'a> {
    /// Request type, e.g. `GetStreamStatus`.
    pub request_type: &'a str,
    /// Client-chosen correlation id.
    pub request_id: &'a str,
    /// Request arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

/// `RequestResponse` payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    /// Echoed request type.
    pub request_type: String,
    /// Echoed correlation id.
    pub request_id: String,
    /// Outcome.
    pub request_status: RequestStatus,
    /// Result data, if any.
    #[serde(default)]
    pub response_data: Option<Value>,
}

/// Outcome of a request.
#[derive(Clone, Debug, Deserialize)]
pub struct RequestStatus {
    /// Whether the request succeeded.
    pub result: bool,
    /// OBS status code (100 on success).
    pub code: u16,
    /// Failure description.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Wrap `payload` in a frame and serialize it.
pub fn encode<T: Serialize>(opcode: u8, payload: &T) -> Result<String, serde_json::Error> {
    let frame = Frame {
        op: opcode,
        d: serde_json::to_value(payload)?,
    };
    serde_json::to_string(&frame)
}

/// Compute the `Identify.authentication` string:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn authentication_string(password: &str, salt: &str, challenge: &str) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    BASE64.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
