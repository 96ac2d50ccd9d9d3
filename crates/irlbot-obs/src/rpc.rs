//! Request/response seam between stream control and the WebSocket client.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ObsError;

/// A connection that can carry OBS requests.
///
/// [`crate::ObsClient`] is the production implementation; stream control
/// only ever talks to this trait.
#[async_trait]
pub trait ObsRpc: Send + Sync {
    /// Whether the connection is currently usable.
    fn is_connected(&self) -> bool;

    /// Send `request_type` with optional arguments and wait for the result.
    ///
    /// Returns `Value::Null` when the response carries no data. A rejected
    /// request fails with [`ObsError::Remote`].
    async fn call(&self, request_type: &str, request_data: Option<Value>)
    -> Result<Value, ObsError>;

    /// Close the connection. Safe to call more than once.
    async fn disconnect(&self);
}
