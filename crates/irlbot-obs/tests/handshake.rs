//! End-to-end tests of the WebSocket client against an in-process server
//! speaking the obs-websocket v5 handshake.

use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use irlbot_obs::protocol::authentication_string;
use irlbot_obs::{ObsClient, ObsError, ObsRpc, StreamController};

const TIMEOUT: Duration = Duration::from_secs(5);
const PASSWORD: &str = "pw";
const SALT: &str = "salt";
const CHALLENGE: &str = "challenge";

/// Serve one connection: handshake, then answer requests until the client
/// closes. Reports the request types seen once the socket closes.
async fn boot_server(scenes: &'static [&'static str]) -> (String, oneshot::Receiver<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (done_tx, done_rx) = oneshot::channel();

    let _ = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let hello = json!({"op": 0, "d": {
            "obsWebSocketVersion": "5.4.2",
            "rpcVersion": 1,
            "authentication": {"challenge": CHALLENGE, "salt": SALT}
        }});
        ws.send(Message::Text(hello.to_string().into())).await.unwrap();

        let Some(Ok(Message::Text(identify))) = ws.next().await else {
            panic!("expected Identify");
        };
        let identify: Value = serde_json::from_str(&identify).unwrap();
        assert_eq!(identify["op"], 1);
        if identify["d"]["authentication"] != authentication_string(PASSWORD, SALT, CHALLENGE) {
            let frame = CloseFrame {
                code: CloseCode::from(4009),
                reason: "Authentication failed.".into(),
            };
            let _ = ws.send(Message::Close(Some(frame))).await;
            let _ = done_tx.send(Vec::new());
            return;
        }
        let identified = json!({"op": 2, "d": {"negotiatedRpcVersion": 1}});
        ws.send(Message::Text(identified.to_string().into())).await.unwrap();

        let mut seen = Vec::new();
        let mut active = false;
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { break };
            let req: Value = serde_json::from_str(&text).unwrap();
            let d = &req["d"];
            let request_type = d["requestType"].as_str().unwrap().to_string();
            seen.push(request_type.clone());

            let (ok, code, data) = match request_type.as_str() {
                "GetStreamStatus" => (true, 100, json!({
                    "outputActive": active,
                    "outputReconnecting": false,
                    "outputTimecode": "00:00:00.000",
                    "outputDuration": 0,
                    "outputBytes": 0
                })),
                "StartStream" => {
                    active = true;
                    (true, 100, Value::Null)
                }
                "GetSceneList" => (true, 100, json!({
                    "scenes": scenes.iter().map(|s| json!({"sceneName": s})).collect::<Vec<_>>()
                })),
                "SetCurrentProgramScene" => {
                    let name = d["requestData"]["sceneName"].as_str().unwrap_or_default();
                    (scenes.contains(&name), 600, Value::Null)
                }
                _ => (false, 204, Value::Null),
            };
            let mut resp = json!({"op": 7, "d": {
                "requestType": request_type,
                "requestId": d["requestId"],
                "requestStatus": {"result": ok, "code": if ok { 100 } else { code }}
            }});
            if !data.is_null() {
                resp["d"]["responseData"] = data;
            }
            ws.send(Message::Text(resp.to_string().into())).await.unwrap();
        }
        let _ = done_tx.send(seen);
    });

    (url, done_rx)
}

#[tokio::test]
async fn identifies_and_answers_requests() {
    let (url, done) = boot_server(&["Intro", "Main"]).await;
    let client = timeout(TIMEOUT, ObsClient::connect(&url, PASSWORD))
        .await
        .unwrap()
        .unwrap();
    assert!(client.is_connected());

    let controller = StreamController::new(std::sync::Arc::new(client));
    assert_eq!(
        controller.list_scenes().await.unwrap(),
        vec!["Intro".to_string(), "Main".to_string()]
    );
    assert!(!controller.get_status().await.unwrap().active);
    assert!(controller.start_streaming().await.unwrap());
    assert!(!controller.start_streaming().await.unwrap());

    controller.disconnect().await;
    assert!(!controller.is_connected());

    let seen = timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(
        seen,
        vec![
            "GetSceneList",
            "GetStreamStatus",
            "GetStreamStatus",
            "StartStream",
            "GetStreamStatus",
        ]
    );
}

#[tokio::test]
async fn unknown_scene_is_rejected_by_remote() {
    let (url, _done) = boot_server(&["Intro", "Main"]).await;
    let client = ObsClient::connect(&url, PASSWORD).await.unwrap();
    let controller = StreamController::new(std::sync::Arc::new(client));

    let err = controller.switch_scene("Nonexistent").await.unwrap_err();
    assert_matches!(err, ObsError::Remote { code: 600, .. });
}

#[tokio::test]
async fn wrong_password_fails_authentication() {
    let (url, _done) = boot_server(&["Intro"]).await;
    let result = timeout(TIMEOUT, ObsClient::connect(&url, "wrong"))
        .await
        .unwrap();
    assert_matches!(result.err(), Some(ObsError::Authentication(_)));
}

#[tokio::test]
async fn connection_refused_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = ObsClient::connect(&url, PASSWORD).await;
    assert_matches!(result.err(), Some(ObsError::Connect { .. }));
}
