//! Relay behaviour over real WebSockets

use std::time::Duration;

use axum::body::Body;
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use shared::http::{Request, StatusCode};
use shared::models::{DeviceId, Role};
use shared::{AppState, Frame, RemoteCommand, RoomCode};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;
use vitrine_relay::{Config, RelayState, api};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> (String, RelayState) {
    let state = RelayState::new(&Config::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(vitrine_relay::serve(listener, state.clone()));
    (format!("ws://{addr}/ws"), state)
}

async fn connect(url: &str) -> Ws {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, frame: &Frame) {
    ws.send(Message::text(frame.to_text().unwrap())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> Frame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return Frame::parse(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(ws: &mut Ws) {
    let res = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(res.is_err(), "expected no frame");
}

fn room() -> RoomCode {
    RoomCode::new("ABC123").unwrap()
}

fn renamed(name: &str) -> AppState {
    let mut state = AppState::sample();
    state.store_name = name.into();
    state
}

/// Join and wait until the hub has registered the member
async fn join(ws: &mut Ws, state: &RelayState, id: &str, revision: Option<u64>) {
    let before = state.hub.member_count(&room());
    send(ws, &Frame::join(room(), DeviceId::new(id), revision)).await;
    for _ in 0..50 {
        if state.hub.member_count(&room()) > before {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("join not registered");
}

#[tokio::test]
async fn store_name_reaches_other_device() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;
    join(&mut b, &state, "DEV-B", None).await;

    send(
        &mut a,
        &Frame::propose(room(), DeviceId::new("DEV-A"), AppState::sample(), None),
    )
    .await;
    assert!(matches!(recv(&mut a).await, Frame::StateAccepted { revision: 1, .. }));
    match recv(&mut b).await {
        Frame::UpdateState { payload, .. } => assert_eq!(payload.store_name, "FABIO FCELL"),
        other => panic!("unexpected {}", other.kind()),
    }

    send(
        &mut a,
        &Frame::propose(room(), DeviceId::new("DEV-A"), renamed("NOVO AÇOUGUE"), Some(1)),
    )
    .await;
    assert!(matches!(recv(&mut a).await, Frame::StateAccepted { revision: 2, .. }));
    match recv(&mut b).await {
        Frame::UpdateState {
            payload, revision, ..
        } => {
            assert_eq!(payload.store_name, "NOVO AÇOUGUE");
            assert_eq!(revision, Some(2));
        }
        other => panic!("unexpected {}", other.kind()),
    }
}

#[tokio::test]
async fn concurrent_edit_loser_gets_canonical_back() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;
    join(&mut b, &state, "DEV-B", None).await;

    send(&mut a, &Frame::propose(room(), DeviceId::new("DEV-A"), AppState::sample(), None)).await;
    recv(&mut a).await;
    recv(&mut b).await;

    // Both edit revision 1
    send(&mut a, &Frame::propose(room(), DeviceId::new("DEV-A"), renamed("EDIT A"), Some(1))).await;
    assert!(matches!(recv(&mut a).await, Frame::StateAccepted { revision: 2, .. }));
    recv(&mut b).await;

    send(&mut b, &Frame::propose(room(), DeviceId::new("DEV-B"), renamed("EDIT B"), Some(1))).await;
    match recv(&mut b).await {
        Frame::StateRejected {
            revision, payload, ..
        } => {
            assert_eq!(revision, 2);
            assert_eq!(payload.store_name, "EDIT A");
        }
        other => panic!("unexpected {}", other.kind()),
    }
    // The loser's edit never reaches A
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn late_joiner_receives_canonical_snapshot() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;
    send(&mut a, &Frame::propose(room(), DeviceId::new("DEV-A"), renamed("SNAP"), None)).await;
    recv(&mut a).await;

    let mut late = connect(&url).await;
    send(&mut late, &Frame::join(room(), DeviceId::new("DEV-L"), None)).await;
    match recv(&mut late).await {
        Frame::UpdateState {
            payload, revision, ..
        } => {
            assert_eq!(payload.store_name, "SNAP");
            assert_eq!(revision, Some(1));
        }
        other => panic!("unexpected {}", other.kind()),
    }

    // Up to date: nothing to send
    let mut current = connect(&url).await;
    join(&mut current, &state, "DEV-C", Some(1)).await;
    assert_silent(&mut current).await;
}

#[tokio::test]
async fn commands_forwarded_to_others_only() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;
    join(&mut b, &state, "DEV-B", None).await;

    let cmd = Frame::command(
        room(),
        DeviceId::new("DEV-A"),
        RemoteCommand::SwitchMode {
            mode: Role::Display,
            target_device_id: Some(DeviceId::new("DEV-B")),
        },
    );
    send(&mut a, &cmd).await;
    assert_eq!(recv(&mut b).await, cmd);
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn other_room_and_garbage_ignored() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;
    join(&mut b, &state, "DEV-B", None).await;

    a.send(Message::text("{not json")).await.unwrap();
    let foreign = Frame::command(
        RoomCode::new("OTHER").unwrap(),
        DeviceId::new("DEV-A"),
        RemoteCommand::RequestPresence,
    );
    send(&mut a, &foreign).await;
    assert_silent(&mut b).await;

    // Connection still usable after garbage
    let ping = Frame::command(room(), DeviceId::new("DEV-A"), RemoteCommand::RequestPresence);
    send(&mut a, &ping).await;
    assert_eq!(recv(&mut b).await, ping);
}

#[tokio::test]
async fn force_push_commits_over_stale_revision() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;
    join(&mut b, &state, "DEV-B", None).await;

    send(&mut a, &Frame::propose(room(), DeviceId::new("DEV-A"), AppState::sample(), None)).await;
    recv(&mut a).await;
    recv(&mut b).await;

    let push = Frame::command(
        room(),
        DeviceId::new("DEV-B"),
        RemoteCommand::ForcePush(Box::new(renamed("FORCED"))),
    );
    send(&mut b, &push).await;
    assert!(matches!(recv(&mut b).await, Frame::StateAccepted { revision: 2, .. }));
    match recv(&mut a).await {
        Frame::UpdateState { payload, .. } => assert_eq!(payload.store_name, "FORCED"),
        other => panic!("unexpected {}", other.kind()),
    }
}

#[tokio::test]
async fn room_route_reports_canonical_state() {
    let state = RelayState::new(&Config::default());
    let app = api::create_router(state.clone());

    let res = app
        .clone()
        .oneshot(Request::get("/api/rooms/ABC123").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let conn = uuid_like();
    state.hub.join(&room(), conn, None);
    state.hub.propose(&room(), conn, None, renamed("HTTP"), None);

    let res = app
        .clone()
        .oneshot(Request::get("/api/rooms/abc123").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["revision"], 1);
    assert_eq!(json["data"]["members"], 1);
    assert_eq!(json["data"]["state"]["storeName"], "HTTP");

    let res = app
        .oneshot(Request::get("/api/rooms/bad%20room").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

fn uuid_like() -> vitrine_relay::hub::ConnId {
    vitrine_relay::hub::ConnId::new_v4()
}

#[tokio::test]
async fn ping_answered_exactly_once() {
    let (url, _state) = start_relay().await;
    let mut a = connect(&url).await;

    a.send(Message::Ping("hb".into())).await.unwrap();
    let msg = tokio::time::timeout(Duration::from_secs(2), a.next())
        .await
        .expect("timed out waiting for pong")
        .expect("socket closed")
        .unwrap();
    match msg {
        Message::Pong(data) => assert_eq!(&data[..], b"hb"),
        other => panic!("expected pong, got {other:?}"),
    }
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn invalid_proposal_in_empty_room_is_answered() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;
    join(&mut b, &state, "DEV-B", None).await;

    let mut bad = AppState::sample();
    bad.promo_interval_secs = 0;
    send(&mut a, &Frame::propose(room(), DeviceId::new("DEV-A"), bad, None)).await;

    match recv(&mut a).await {
        Frame::StateInvalid { room: r, code, .. } => {
            assert_eq!(r, room());
            assert_eq!(code, shared::error::ErrorCode::ValidationFailed);
        }
        other => panic!("unexpected {}", other.kind()),
    }
    assert_silent(&mut b).await;
    assert!(state.hub.snapshot(&room()).is_err());
}

#[tokio::test]
async fn second_connection_of_last_writer_must_rebase() {
    let (url, state) = start_relay().await;
    let mut a = connect(&url).await;
    join(&mut a, &state, "DEV-A", None).await;

    send(&mut a, &Frame::propose(room(), DeviceId::new("DEV-A"), AppState::sample(), None)).await;
    assert!(matches!(recv(&mut a).await, Frame::StateAccepted { revision: 1, .. }));
    send(&mut a, &Frame::propose(room(), DeviceId::new("DEV-A"), renamed("TWO"), Some(1))).await;
    assert!(matches!(recv(&mut a).await, Frame::StateAccepted { revision: 2, .. }));

    // Same device back on a new socket, still at revision 1
    let mut a2 = connect(&url).await;
    join(&mut a2, &state, "DEV-A", Some(1)).await;
    match recv(&mut a2).await {
        Frame::UpdateState {
            payload, revision, ..
        } => {
            assert_eq!(revision, Some(2));
            assert_eq!(payload.store_name, "TWO");
        }
        other => panic!("unexpected {}", other.kind()),
    }

    send(&mut a2, &Frame::propose(room(), DeviceId::new("DEV-A"), renamed("THREE"), Some(1))).await;
    match recv(&mut a2).await {
        Frame::StateRejected {
            revision, payload, ..
        } => {
            assert_eq!(revision, 2);
            assert_eq!(payload.store_name, "TWO");
        }
        other => panic!("unexpected {}", other.kind()),
    }
    assert_eq!(state.hub.snapshot(&room()).unwrap().state.store_name, "TWO");
}
