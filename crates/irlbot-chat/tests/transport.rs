//! Drives the real Twitch transport against an in-process WebSocket server.

use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use irlbot_chat::{
    ChatConnector, ChatError, ChatEvent, ChatSession, SessionEvent, TwitchConnector,
};

const TIMEOUT: Duration = Duration::from_secs(10);

async fn read_line(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return text.to_string(),
            Some(Ok(Message::Close(_))) | None => return "<close>".to_string(),
            Some(Ok(_)) => {}
            Some(Err(e)) => panic!("server read failed: {e}"),
        }
    }
}

async fn send(ws: &mut WebSocketStream<TcpStream>, line: &str) {
    ws.send(Message::Text(line.to_string().into())).await.unwrap();
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> ChatEvent {
    timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap().event
}

#[tokio::test]
async fn logs_in_answers_ping_and_reconnects_after_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("ws://127.0.0.1:{port}");
    let (lines_tx, mut lines_rx) = mpsc::unbounded_channel::<String>();

    let _server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        for _ in 0..4 {
            lines_tx.send(read_line(&mut ws).await).unwrap();
        }
        send(&mut ws, "PING :tmi.twitch.tv").await;
        lines_tx.send(read_line(&mut ws).await).unwrap();
        send(&mut ws, ":tmi.twitch.tv 001 streamer :Welcome, GLHF!").await;
        send(
            &mut ws,
            "@badges=broadcaster/1;display-name=Streamer \
             :streamer!streamer@streamer.tmi.twitch.tv PRIVMSG #streamer :!startirl",
        )
        .await;
        lines_tx.send(read_line(&mut ws).await).unwrap();
        ws.close(None).await.unwrap();
        drop(ws);

        let mut ws = accept(&listener).await;
        for _ in 0..4 {
            lines_tx.send(read_line(&mut ws).await).unwrap();
        }
        send(&mut ws, ":tmi.twitch.tv 001 streamer :Welcome, GLHF!").await;
        lines_tx.send(read_line(&mut ws).await).unwrap();
    });

    // Same account for login and channel, as the binary configures it.
    let connector = TwitchConnector::new(&url, "streamer", "streamer").unwrap();
    let (events_tx, mut events_rx) = mpsc::channel(16);
    let session = connector.connect("tok123", events_tx).await.unwrap();

    let mut login = Vec::new();
    for _ in 0..4 {
        login.push(timeout(TIMEOUT, lines_rx.recv()).await.unwrap().unwrap());
    }
    assert_eq!(
        login,
        vec![
            "CAP REQ :twitch.tv/tags twitch.tv/commands",
            "PASS oauth:tok123",
            "NICK streamer",
            "JOIN #streamer",
        ]
    );
    assert_eq!(lines_rx.recv().await.unwrap(), "PONG :tmi.twitch.tv");

    assert_eq!(
        next_event(&mut events_rx).await,
        ChatEvent::Connected {
            address: "127.0.0.1".to_string(),
            port,
        }
    );
    assert_matches!(
        next_event(&mut events_rx).await,
        ChatEvent::Message { channel, tags, text, is_self: false } => {
            assert_eq!(channel, "streamer");
            assert_eq!(text, "!startirl");
            assert!(tags.is_broadcaster());
        }
    );

    session.say("streamer", "hello\r\nJOIN #other").await.unwrap();
    assert_eq!(
        lines_rx.recv().await.unwrap(),
        "PRIVMSG #streamer :hello  JOIN #other"
    );

    assert_matches!(next_event(&mut events_rx).await, ChatEvent::Disconnected { .. });
    for _ in 0..4 {
        let _ = timeout(TIMEOUT, lines_rx.recv()).await.unwrap().unwrap();
    }
    assert_matches!(next_event(&mut events_rx).await, ChatEvent::Connected { .. });

    session.disconnect().await;
    assert_eq!(
        timeout(TIMEOUT, lines_rx.recv()).await.unwrap().unwrap(),
        "<close>"
    );
    assert_matches!(session.say("streamer", "late").await, Err(ChatError::Closed));
}

#[tokio::test]
async fn login_failure_notice_is_classified() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let _server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        for _ in 0..4 {
            let _ = read_line(&mut ws).await;
        }
        send(&mut ws, ":tmi.twitch.tv NOTICE * :Login authentication failed").await;
        let _ = read_line(&mut ws).await;
    });

    let connector = TwitchConnector::new(&url, "irlbot", "streamer").unwrap();
    let (events_tx, mut events_rx) = mpsc::channel(16);
    let session = connector.connect("expired", events_tx).await.unwrap();

    assert_matches!(
        next_event(&mut events_rx).await,
        ChatEvent::Notice { notice_id, .. } => {
            assert!(irlbot_chat::is_auth_failure_notice(&notice_id));
        }
    );
    session.disconnect().await;
}

#[tokio::test]
async fn unreachable_server_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let connector = TwitchConnector::new(&url, "irlbot", "streamer").unwrap();
    let (events_tx, _events_rx) = mpsc::channel(16);
    let result = connector.connect("tok", events_tx).await;
    assert_matches!(result.err(), Some(ChatError::Connect { .. }));
}
