//! In-memory OBS double for tests in this and downstream crates.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::errors::ObsError;
use crate::rpc::ObsRpc;

#[derive(Default)]
struct FakeState {
    connected: bool,
    active: bool,
    current_scene: Option<String>,
    calls: Vec<String>,
}

/// Scripted [`ObsRpc`] that behaves like OBS for the requests the bot uses.
///
/// Starting and stopping flips the `active` flag; unknown scenes are
/// rejected with code 600 the way OBS does.
pub struct FakeObs {
    scenes: Vec<String>,
    state: Mutex<FakeState>,
}

impl FakeObs {
    /// A connected, idle OBS with the given scenes.
    pub fn new(scenes: &[&str]) -> Self {
        Self {
            scenes: scenes.iter().map(|s| (*s).to_string()).collect(),
            state: Mutex::new(FakeState {
                connected: true,
                ..FakeState::default()
            }),
        }
    }

    /// Force the stream output state.
    pub fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }

    /// Whether the stream output is live.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Current program scene, if one was set.
    pub fn current_scene(&self) -> Option<String> {
        self.state.lock().current_scene.clone()
    }

    /// Every request type received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// How many times `request_type` was received.
    pub fn count(&self, request_type: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.as_str() == request_type)
            .count()
    }
}

fn rejected(request: &str, code: u16, comment: &str) -> ObsError {
    ObsError::Remote {
        request: request.to_string(),
        code,
        comment: Some(comment.to_string()),
    }
}

#[async_trait]
impl ObsRpc for FakeObs {
    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn call(
        &self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Value, ObsError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(ObsError::NotConnected);
        }
        state.calls.push(request_type.to_string());

        match request_type {
            "GetStreamStatus" => Ok(json!({
                "outputActive": state.active,
                "outputReconnecting": false,
                "outputTimecode": "00:01:01.000",
                "outputDuration": 61_000,
                "outputCongestion": 0.0,
                "outputBytes": 1_048_576,
                "outputSkippedFrames": 0,
                "outputTotalFrames": 3660
            })),
            "StartStream" if state.active => {
                Err(rejected(request_type, 500, "The stream output is already running."))
            }
            "StartStream" => {
                state.active = true;
                Ok(Value::Null)
            }
            "StopStream" if !state.active => {
                Err(rejected(request_type, 501, "The stream output is not running."))
            }
            "StopStream" => {
                state.active = false;
                Ok(Value::Null)
            }
            "SetCurrentProgramScene" => {
                let name = request_data
                    .as_ref()
                    .and_then(|d| d.get("sceneName"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if self.scenes.contains(&name) {
                    state.current_scene = Some(name);
                    Ok(Value::Null)
                } else {
                    Err(rejected(
                        request_type,
                        600,
                        &format!("No source was found by the name of `{name}`."),
                    ))
                }
            }
            "GetSceneList" => Ok(json!({
                "currentProgramSceneName": state.current_scene,
                "scenes": self.scenes.iter().map(|s| json!({ "sceneName": s })).collect::<Vec<_>>()
            })),
            other => Err(rejected(other, 204, "Unknown request type.")),
        }
    }

    async fn disconnect(&self) {
        self.state.lock().connected = false;
    }
}
