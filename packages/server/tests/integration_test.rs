//! Integration tests: the real axum server on an ephemeral port, driven over
//! WebSocket and HTTP.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpListener, net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};
use voltroom_server::{
    config::{ChallengeSettings, RuntimeSettings},
    ui::{AppState, Server},
};
use voltroom_shared::time::SystemClock;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper struct to manage the in-process server lifecycle
struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start(settings: ChallengeSettings) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(settings, RuntimeSettings::default(), Arc::new(SystemClock));
        let task = tokio::spawn(async move {
            let _ = Server::new(state).serve(listener).await;
        });
        TestServer { addr, task }
    }

    fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    async fn connect(&self, path: &str) -> Socket {
        let (socket, _response) = connect_async(self.ws(path)).await.unwrap();
        socket
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn send(socket: &mut Socket, message: Value) {
    socket
        .send(Message::text(message.to_string()))
        .await
        .unwrap();
}

/// Read frames until one of type `kind` arrives.
async fn next_of_type(socket: &mut Socket, kind: &str) -> Value {
    let wait = async {
        loop {
            let frame = socket.next().await.unwrap().unwrap();
            if let Message::Text(text) = frame {
                let message: Value = serde_json::from_str(text.as_str()).unwrap();
                if message["type"] == kind {
                    return message;
                }
            }
        }
    };
    tokio::time::timeout(RECV_TIMEOUT, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for '{kind}'"))
}

#[tokio::test]
async fn test_health_and_empty_room_list() {
    // テスト項目: ヘルスチェックと、起動直後のルーム一覧が空であること
    // given (前提条件):
    let server = TestServer::start(ChallengeSettings::default()).await;

    // when (操作):
    let health: Value = reqwest::get(server.http("/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rooms: Value = reqwest::get(server.http("/api/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(health, json!({"status": "ok"}));
    assert_eq!(rooms, json!([]));
}

#[tokio::test]
async fn test_document_room_end_to_end() {
    // テスト項目: 2 接続での追加・削除・同期が全員に届き、バージョンが進む
    // given (前提条件):
    let server = TestServer::start(ChallengeSettings::default()).await;
    let mut alice = server
        .connect("/rooms/circuits/circuit-e2e?user_id=alice&username=Alice")
        .await;
    let init = next_of_type(&mut alice, "init").await;
    assert_eq!(init["data"]["state"]["version"], 0);
    let mut bob = server.connect("/rooms/circuits/circuit-e2e?user_id=bob").await;
    next_of_type(&mut bob, "init").await;
    let joined = next_of_type(&mut alice, "user_joined").await;
    assert_eq!(joined["data"]["userId"], "bob");
    assert_eq!(joined["data"]["username"], "bob");

    // when (操作):
    send(
        &mut alice,
        json!({"type": "add_component", "data": {"id": "c1", "kind": "led"}}),
    )
    .await;

    // then (期待する結果):
    for socket in [&mut alice, &mut bob] {
        let added = next_of_type(socket, "component_added").await;
        assert_eq!(added["data"]["id"], "c1");
        assert_eq!(added["data"]["kind"], "led");
        assert_eq!(added["data"]["version"], 1);
        assert_eq!(added["data"]["by"], "alice");
    }

    // when (操作):
    send(
        &mut bob,
        json!({"type": "remove_component", "data": {"id": "c1"}}),
    )
    .await;

    // then (期待する結果):
    for socket in [&mut alice, &mut bob] {
        let removed = next_of_type(socket, "component_removed").await;
        assert_eq!(removed["data"]["id"], "c1");
        assert_eq!(removed["data"]["version"], 2);
    }

    // when (操作):
    send(&mut alice, json!({"type": "sync_request", "data": {}})).await;

    // then (期待する結果):
    let sync = next_of_type(&mut alice, "sync_response").await;
    assert_eq!(sync["data"]["state"]["components"], json!([]));
    assert_eq!(sync["data"]["state"]["wires"], json!([]));
    assert_eq!(sync["data"]["state"]["version"], 2);

    let snapshot: Value = reqwest::get(server.http("/rooms/circuits/circuit-e2e"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["participantCount"], 2);
    assert_eq!(snapshot["version"], 2);
    let rooms: Value = reqwest::get(server.http("/api/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms, json!([{"key": "circuit-e2e", "kind": "circuit"}]));
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    // テスト項目: 不正なフレームを送っても接続は維持される
    // given (前提条件):
    let server = TestServer::start(ChallengeSettings::default()).await;
    let mut alice = server.connect("/rooms/circuits/circuit-bad?user_id=alice").await;
    next_of_type(&mut alice, "init").await;

    // when (操作):
    alice.send(Message::text("definitely not json")).await.unwrap();
    send(&mut alice, json!({"type": "update_component", "data": {"id": "c1"}})).await;
    send(&mut alice, json!({"type": "sync_request"})).await;

    // then (期待する結果):
    let sync = next_of_type(&mut alice, "sync_response").await;
    assert_eq!(sync["data"]["state"]["version"], 0);
}

#[tokio::test]
async fn test_cursor_move_skips_sender() {
    // テスト項目: cursor_move は送信者以外にだけ届く
    // given (前提条件):
    let server = TestServer::start(ChallengeSettings::default()).await;
    let mut alice = server.connect("/rooms/circuits/circuit-cur?user_id=alice").await;
    next_of_type(&mut alice, "init").await;
    let mut bob = server.connect("/rooms/circuits/circuit-cur?user_id=bob").await;
    next_of_type(&mut bob, "init").await;
    next_of_type(&mut alice, "user_joined").await;

    // when (操作):
    send(&mut alice, json!({"type": "cursor_move", "data": {"x": 3, "y": 4}})).await;
    send(&mut alice, json!({"type": "sync_request"})).await;

    // then (期待する結果):
    let update = next_of_type(&mut bob, "cursor_update").await;
    assert_eq!(update["data"]["userId"], "alice");
    assert_eq!(update["data"]["cursor"], json!({"x": 3.0, "y": 4.0}));
    // alice の次のフレームは自分の cursor_update ではなく sync_response
    let frame = tokio::time::timeout(RECV_TIMEOUT, alice.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let message: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(message["type"], "sync_response");
}

#[tokio::test]
async fn test_full_challenge_room_rejects_connection() {
    // テスト項目: 定員に達したチャレンジルームへの接続は 503 で拒否される
    // given (前提条件):
    let settings = ChallengeSettings {
        max_participants: 1,
        ..ChallengeSettings::default()
    };
    let server = TestServer::start(settings).await;
    let mut alice = server
        .connect("/rooms/challenges/session-full?user_id=alice&challenge_id=ch-1")
        .await;
    let init = next_of_type(&mut alice, "init").await;
    assert_eq!(init["data"]["roomState"]["challengeId"], "ch-1");
    assert_eq!(init["data"]["roomState"]["maxParticipants"], 1);

    // when (操作):
    let result = connect_async(server.ws("/rooms/challenges/session-full?user_id=bob")).await;

    // then (期待する結果):
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 503),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("connection should have been rejected"),
    }
    let snapshot: Value = reqwest::get(server.http("/rooms/challenges/session-full"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["participantCount"], 1);
    assert_eq!(snapshot["participants"][0]["userId"], "alice");
}

#[tokio::test]
async fn test_admin_start_and_conflict() {
    // テスト項目: 管理者 start は 1 回目が 200、2 回目が 409、存在しないルームは 404
    // given (前提条件):
    let server = TestServer::start(ChallengeSettings::default()).await;
    let client = reqwest::Client::new();
    let mut alice = server
        .connect("/rooms/challenges/session-admin?user_id=alice")
        .await;
    next_of_type(&mut alice, "init").await;

    // when (操作):
    let missing = client
        .post(server.http("/rooms/challenges/session-nobody/start"))
        .send()
        .await
        .unwrap();
    let first = client
        .post(server.http("/rooms/challenges/session-admin/start"))
        .send()
        .await
        .unwrap();
    let first_status = first.status().as_u16();
    let first_body: Value = first.json().await.unwrap();
    let second = client
        .post(server.http("/rooms/challenges/session-admin/start"))
        .send()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(missing.status().as_u16(), 404);
    assert_eq!(first_status, 200);
    assert_eq!(first_body, json!({"status": "countdown"}));
    assert_eq!(second.status().as_u16(), 409);
    let countdown = next_of_type(&mut alice, "countdown").await;
    assert_eq!(countdown["data"]["seconds"], 3);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    // テスト項目: user_id の無い接続は 400、存在しないルームのスナップショットは 404
    // given (前提条件):
    let server = TestServer::start(ChallengeSettings::default()).await;

    // when (操作):
    let no_identity = connect_async(server.ws("/rooms/circuits/circuit-x")).await;
    let bad_key = reqwest::get(server.http("/rooms/circuits/bad%20key"))
        .await
        .unwrap();
    let unknown = reqwest::get(server.http("/rooms/challenges/session-unknown"))
        .await
        .unwrap();

    // then (期待する結果):
    match no_identity {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 400),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("connection should have been rejected"),
    }
    assert_eq!(bad_key.status().as_u16(), 400);
    assert_eq!(unknown.status().as_u16(), 404);
}
