use futures_util::{SinkExt, StreamExt};
use inkroom_core::{ElementKind, ElementStore, ServerMessage};
use inkroom_server::auth::TokenSessions;
use inkroom_server::store::{DurableStore, MemoryStore};
use inkroom_server::{AppState, app};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> (SocketAddr, Arc<AppState>) {
    let sessions = TokenSessions::new([
        ("token-a".to_string(), "alice".to_string()),
        ("token-b".to_string(), "bob".to_string()),
        ("token-c".to_string(), "carol".to_string()),
    ]);
    let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), Arc::new(sessions), 500));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, token: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?token={token}")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, frame: &Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn recv(ws: &mut Client) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for frame")
        .unwrap()
        .unwrap();
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

async fn join(ws: &mut Client, room: &str) -> Value {
    send(ws, &json!({"type": "join_room", "roomId": room})).await;
    let snapshot = recv(ws).await;
    assert_eq!(snapshot["type"], "room_snapshot");
    snapshot
}

#[tokio::test]
async fn create_is_forwarded_to_peer() {
    let (addr, state) = spawn_server().await;
    let mut a = connect(addr, "token-a").await;
    let mut b = connect(addr, "token-b").await;
    join(&mut a, "r1").await;
    join(&mut b, "r1").await;

    let create = json!({
        "type": "create_element",
        "id": "e1",
        "roomId": "r1",
        "elementType": "rectangle",
        "path": {"x": 10, "y": 10, "w": 50, "h": 50}
    });
    send(&mut a, &create).await;

    let forwarded = recv(&mut b).await;
    assert_eq!(forwarded, create);

    let mut store = ElementStore::new();
    let message = ServerMessage::parse(&forwarded.to_string()).unwrap();
    let ServerMessage::CreateElement { id, element_type, path, .. } = message else {
        panic!("expected create_element");
    };
    store.add(path.into_element(id, element_type).unwrap());
    let element = store.get("e1").unwrap();
    assert_eq!(element.kind(), ElementKind::Rectangle);
    let bounds = element.bounds();
    assert_eq!((bounds.x0, bounds.y0, bounds.width(), bounds.height()), (10.0, 10.0, 50.0, 50.0));

    let stored = state.store.list_elements("r1", 10).await.unwrap();
    assert_eq!(stored[0].author_id, "alice");
}

#[tokio::test]
async fn concurrent_updates_resolve_last_write_wins() {
    let (addr, state) = spawn_server().await;
    let mut a = connect(addr, "token-a").await;
    let mut b = connect(addr, "token-b").await;
    let mut c = connect(addr, "token-c").await;
    for ws in [&mut a, &mut b, &mut c] {
        join(ws, "r1").await;
    }

    send(
        &mut a,
        &json!({
            "type": "create_element",
            "id": "e1",
            "roomId": "r1",
            "elementType": "rectangle",
            "path": {"x": 10, "y": 10, "w": 50, "h": 50}
        }),
    )
    .await;
    assert_eq!(recv(&mut b).await["type"], "create_element");
    assert_eq!(recv(&mut c).await["type"], "create_element");

    let update = |x: f64| {
        json!({
            "type": "update_element",
            "id": "e1",
            "roomId": "r1",
            "path": {"x": x, "y": x, "w": 50, "h": 50}
        })
    };
    send(&mut a, &update(20.0)).await;
    assert_eq!(recv(&mut b).await["path"]["x"], 20.0);
    assert_eq!(recv(&mut c).await["path"]["x"], 20.0);

    send(&mut c, &update(99.0)).await;
    assert_eq!(recv(&mut a).await["path"]["x"], 99.0);
    assert_eq!(recv(&mut b).await["path"]["x"], 99.0);

    let stored = state.store.list_elements("r1", 10).await.unwrap();
    assert_eq!((stored[0].path.x, stored[0].path.y), (99.0, 99.0));

    // A late joiner hydrates with the winning geometry.
    let mut late = connect(addr, "token-b").await;
    let snapshot = join(&mut late, "r1").await;
    assert_eq!(snapshot["elements"][0]["path"]["x"], 99.0);
}

#[tokio::test]
async fn invalid_credential_is_rejected_before_upgrade() {
    let (addr, state) = spawn_server().await;
    let err = connect_async(format!("ws://{addr}/ws?token=nope")).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => assert_eq!(response.status(), 401),
        other => panic!("expected http rejection, got {other:?}"),
    }
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn malformed_join_closes_connection() {
    let (addr, _state) = spawn_server().await;
    let mut a = connect(addr, "token-a").await;
    send(&mut a, &json!({"type": "join_room", "roomId": ""})).await;
    let error = recv(&mut a).await;
    assert_eq!(error["type"], "error");

    let next = tokio::time::timeout(Duration::from_secs(5), a.next()).await.unwrap();
    assert!(matches!(next, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
}
