//! End-to-end broadcast tests: a real server on an ephemeral port and real
//! WebSocket clients.

use clap::Parser;
use domain::location::{self, NewLocation};
use domain::user::{NewUser, Role, User};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use service::config::Config;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use web::AppState;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

async fn start_server() -> TestServer {
    let config = Config::try_parse_from(["qroket"])
        .unwrap()
        .set_jwt_secret("integration-secret".to_string());
    let state = AppState::new(config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(web::serve(state.clone(), listener, async move {
        let _ = shutdown_rx.await;
    }));

    TestServer {
        addr,
        state,
        shutdown: Some(shutdown_tx),
        handle,
    }
}

fn seed(state: &AppState, email: &str, role: Role) -> (User, String) {
    let user = state
        .directory
        .create(NewUser {
            email: email.to_string(),
            password: "password123".to_string(),
            display_name: email.to_string(),
            role: Some(role),
        })
        .unwrap();
    let token = state.auth_gate.codec().issue(user.id, role).unwrap().token;
    (user, token)
}

async fn connect_with_query(addr: SocketAddr, token: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws?token={token}"))
        .await
        .unwrap();
    socket
}

async fn connect_with_header(addr: SocketAddr, token: &str) -> Socket {
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let (socket, _) = connect_async(request).await.unwrap();
    socket
}

async fn wait_for_connections(state: &AppState, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while state.ws_manager.connection_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {expected} connection(s), have {}",
            state.ws_manager.connection_count()
        )
    });
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn round_trip(socket: &mut Socket) {
    socket.send(Message::Ping(b"sync".to_vec().into())).await.unwrap();
    loop {
        let message = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for the pong")
            .expect("stream ended")
            .unwrap();
        match message {
            Message::Pong(payload) if payload[..] == b"sync"[..] => return,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn broadcasts_reach_exactly_the_open_connections() {
    let server = start_server().await;
    let (_, u1_token) = seed(&server.state, "u1@qroket.ch", Role::User);
    let (_, u2_token) = seed(&server.state, "u2@qroket.ch", Role::User);

    let mut u1 = connect_with_query(server.addr, &u1_token).await;
    let mut u2 = connect_with_header(server.addr, &u2_token).await;
    wait_for_connections(&server.state, 2).await;

    let report = server.state.ws_manager.broadcast_all(&json!({"kind": "ping"}));
    assert_eq!(report.targeted, 2);
    assert_eq!(next_json(&mut u1).await, json!({"kind": "ping"}));
    assert_eq!(next_json(&mut u2).await, json!({"kind": "ping"}));

    u1.close(None).await.unwrap();
    wait_for_connections(&server.state, 1).await;

    let report = server.state.ws_manager.broadcast_all(&json!({"kind": "pong"}));
    assert_eq!(report.targeted, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(next_json(&mut u2).await, json!({"kind": "pong"}));
}

#[tokio::test]
async fn invalid_client_frames_are_discarded() {
    let server = start_server().await;
    let (_, token) = seed(&server.state, "u1@qroket.ch", Role::User);

    let mut socket = connect_with_query(server.addr, &token).await;
    wait_for_connections(&server.state, 1).await;

    socket.send(Message::text("this is not json")).await.unwrap();
    socket.send(Message::text(r#"{"hello": "server"}"#)).await.unwrap();
    // Frames are read in order, so the pong proves both texts were consumed.
    round_trip(&mut socket).await;

    server.state.ws_manager.broadcast_all(&json!({"kind": "still_here"}));
    assert_eq!(next_json(&mut socket).await, json!({"kind": "still_here"}));
    assert_eq!(server.state.ws_manager.connection_count(), 1);
}

#[tokio::test]
async fn dropped_sockets_are_unregistered() {
    let server = start_server().await;
    let (_, u1_token) = seed(&server.state, "u1@qroket.ch", Role::User);
    let (_, u2_token) = seed(&server.state, "u2@qroket.ch", Role::User);

    let gone = connect_with_query(server.addr, &u1_token).await;
    let mut stays = connect_with_query(server.addr, &u2_token).await;
    wait_for_connections(&server.state, 2).await;

    // No close frame, the TCP stream just goes away.
    drop(gone.into_inner());
    wait_for_connections(&server.state, 1).await;

    let report = server.state.ws_manager.broadcast_all(&json!({"kind": "after_drop"}));
    assert_eq!(report.targeted, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(next_json(&mut stays).await, json!({"kind": "after_drop"}));
}

#[tokio::test]
async fn upgrades_with_bad_credentials_are_refused() {
    let server = start_server().await;

    for url in [
        format!("ws://{}/ws", server.addr),
        format!("ws://{}/ws?token=garbage", server.addr),
    ] {
        match connect_async(url).await {
            Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("upgrade should have been refused"),
        }
    }
    assert_eq!(server.state.ws_manager.connection_count(), 0);
}

#[tokio::test]
async fn domain_events_reach_their_audience() {
    let server = start_server().await;
    let (_, admin_token) = seed(&server.state, "admin@qroket.ch", Role::Admin);
    let (member, member_token) = seed(&server.state, "member@qroket.ch", Role::User);

    let mut admin = connect_with_query(server.addr, &admin_token).await;
    let mut member_socket = connect_with_query(server.addr, &member_token).await;
    wait_for_connections(&server.state, 2).await;

    let identity = server.state.auth_gate.codec().verify(&member_token).unwrap();
    let created = location::create(
        &server.state.locations,
        &server.state.event_publisher,
        &identity,
        NewLocation {
            npa: 1200,
            city: "Genève".to_string(),
        },
    )
    .unwrap();

    for socket in [&mut admin, &mut member_socket] {
        let frame = next_json(socket).await;
        assert_eq!(frame["kind"], "location_created");
        assert_eq!(frame["data"]["owner_id"], json!(member.id));
        assert_eq!(frame["data"]["location"]["id"], json!(created.id));
    }

    // Promoted in the directory: role broadcasts reach the member from now on.
    domain::user::change_role(
        &server.state.directory,
        &server.state.event_publisher,
        member.id,
        Role::Admin,
    )
    .unwrap();

    for socket in [&mut admin, &mut member_socket] {
        let frame = next_json(socket).await;
        assert_eq!(frame["kind"], "user_role_changed");
        assert_eq!(frame["data"]["user_id"], json!(member.id));
        assert_eq!(frame["data"]["role"], "admin");
    }
}

#[tokio::test]
async fn shutdown_closes_every_connection() {
    let mut server = start_server().await;
    let (_, token) = seed(&server.state, "u1@qroket.ch", Role::User);

    let mut socket = connect_with_query(server.addr, &token).await;
    wait_for_connections(&server.state, 1).await;

    server.shutdown.take().unwrap().send(()).unwrap();

    let closing = loop {
        match tokio::time::timeout(WAIT, socket.next()).await.unwrap() {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            other => break other,
        }
    };
    assert!(
        matches!(closing, Some(Ok(Message::Close(_)))),
        "expected a close frame, got {closing:?}"
    );

    tokio::time::timeout(WAIT, server.handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(server.state.ws_manager.connection_count(), 0);
}
