//! Idempotent stream control on top of an [`ObsRpc`] connection.
//!
//! Stream state is never cached: every decision re-queries OBS, which is the
//! only authority on whether the output is live.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::errors::ObsError;
use crate::rpc::ObsRpc;

/// Live streaming status as reported by OBS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteStreamStatus {
    /// Whether the stream output is live.
    pub active: bool,
    /// Whether OBS is currently reconnecting to the ingest server.
    pub reconnecting: bool,
    /// Time the output has been live.
    pub elapsed: Duration,
    /// Bytes sent since the output started.
    pub bytes_sent: u64,
    /// Human-readable timecode (`HH:MM:SS.mmm`).
    pub timecode: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamStatusData {
    output_active: bool,
    #[serde(default)]
    output_reconnecting: bool,
    #[serde(default)]
    output_timecode: String,
    #[serde(default)]
    output_duration: u64,
    #[serde(default)]
    output_bytes: u64,
}

impl From<StreamStatusData> for RemoteStreamStatus {
    fn from(d: StreamStatusData) -> Self {
        Self {
            active: d.output_active,
            reconnecting: d.output_reconnecting,
            elapsed: Duration::from_millis(d.output_duration),
            bytes_sent: d.output_bytes,
            timecode: d.output_timecode,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneListData {
    scenes: Vec<SceneEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneEntry {
    scene_name: String,
}

/// Issues stream and scene operations against OBS.
pub struct StreamController {
    rpc: Arc<dyn ObsRpc>,
}

impl StreamController {
    /// Wrap a connection.
    pub fn new(rpc: Arc<dyn ObsRpc>) -> Self {
        Self { rpc }
    }

    /// Whether the underlying connection is live.
    pub fn is_connected(&self) -> bool {
        self.rpc.is_connected()
    }

    /// Query the current stream status.
    pub async fn get_status(&self) -> Result<RemoteStreamStatus, ObsError> {
        let data = self.call("GetStreamStatus", None).await?;
        let parsed: StreamStatusData = serde_json::from_value(data)
            .map_err(|e| ObsError::Protocol(format!("malformed GetStreamStatus: {e}")))?;
        Ok(parsed.into())
    }

    /// Make `name` the active program scene.
    pub async fn switch_scene(&self, name: &str) -> Result<(), ObsError> {
        let _ = self
            .call("SetCurrentProgramScene", Some(json!({ "sceneName": name })))
            .await?;
        info!(scene = name, "switched scene");
        Ok(())
    }

    /// Start streaming unless already live.
    ///
    /// Returns `false` without issuing a start request if the stream is
    /// already active.
    pub async fn start_streaming(&self) -> Result<bool, ObsError> {
        if self.get_status().await?.active {
            info!("stream already active");
            return Ok(false);
        }
        let _ = self.call("StartStream", None).await?;
        info!("stream started");
        Ok(true)
    }

    /// Stop streaming unless already stopped.
    ///
    /// Returns `false` without issuing a stop request if the stream is
    /// already inactive.
    pub async fn stop_streaming(&self) -> Result<bool, ObsError> {
        if !self.get_status().await?.active {
            info!("stream already stopped");
            return Ok(false);
        }
        let _ = self.call("StopStream", None).await?;
        info!("stream stopped");
        Ok(true)
    }

    /// Names of all configured scenes.
    pub async fn list_scenes(&self) -> Result<Vec<String>, ObsError> {
        let data = self.call("GetSceneList", None).await?;
        let parsed: SceneListData = serde_json::from_value(data)
            .map_err(|e| ObsError::Protocol(format!("malformed GetSceneList: {e}")))?;
        Ok(parsed.scenes.into_iter().map(|s| s.scene_name).collect())
    }

    /// Close the connection to OBS.
    pub async fn disconnect(&self) {
        self.rpc.disconnect().await;
    }

    async fn call(
        &self,
        request_type: &str,
        request_data: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ObsError> {
        if !self.rpc.is_connected() {
            return Err(ObsError::NotConnected);
        }
        self.rpc.call(request_type, request_data).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
