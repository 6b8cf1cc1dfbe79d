//! End-to-end scenario S6: a client connects through the reverse proxy
//! rather than directly to a backend, and state propagation still
//! holds through the multiplexed link.

use std::time::Duration;

use backend::state::AppState as BackendState;
use rb_protocol::message::{
    Authority, ClientMessage, PlaybackStateWire, PlaybackStatus, StateUpdatePayload,
};
use rb_protocol::rest::RoomCreatedMsg;
use rb_registry::Registry;
use rb_test_utils::{free_port, MockClient};

async fn spawn_backend() -> String {
    let port = free_port().await;
    let addr = format!("127.0.0.1:{port}");
    let state = BackendState::new(Duration::from_secs(5 * 60));
    let router = backend::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    addr
}

async fn spawn_proxy(registry: Registry) -> String {
    use std::net::SocketAddr;

    let port = free_port().await;
    let addr = format!("127.0.0.1:{port}");
    let state = proxy::AppState::new(registry);
    let router = proxy::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    addr
}

async fn expect_hello_and_initial_state(client: &mut MockClient, want: Authority) {
    let mut saw_hello = false;
    let mut saw_initial_state = false;
    for _ in 0..2 {
        match client.recv().await.unwrap() {
            ClientMessage::Hello(h) => {
                assert_eq!(h.authority, want);
                saw_hello = true;
            }
            ClientMessage::StateBroadcast(_) => saw_initial_state = true,
            other => panic!("unexpected initial frame: {other:?}"),
        }
    }
    assert!(saw_hello && saw_initial_state, "expected both a Hello and an initial state broadcast");
}

#[tokio::test]
async fn s6_state_propagates_through_proxy_multiplex() {
    let backend_addr = spawn_backend().await;

    let http = reqwest::Client::new();
    let created: RoomCreatedMsg = http
        .post(format!("http://{backend_addr}/room"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let registry = Registry::in_memory();
    registry.set(&created.room_id, &backend_addr).await.unwrap();

    let proxy_addr = spawn_proxy(registry).await;

    let master_url = format!(
        "ws://{proxy_addr}/ws?rid={}&token={}",
        created.room_id, created.master_token
    );
    let guest_url = format!(
        "ws://{proxy_addr}/ws?rid={}&token={}",
        created.room_id, created.guest_token
    );

    let mut master = MockClient::connect(&master_url).await.unwrap();
    let mut guest = MockClient::connect(&guest_url).await.unwrap();

    // The Hello and the initial state broadcast are queued as independent
    // jobs on the shared worker pool, so their relative wire order isn't
    // guaranteed — drain both and check each showed up.
    expect_hello_and_initial_state(&mut master, Authority::Master).await;
    expect_hello_and_initial_state(&mut guest, Authority::Guest).await;

    master
        .send(&ClientMessage::StateUpdate(StateUpdatePayload {
            state: PlaybackStateWire {
                source: "u".into(),
                status: PlaybackStatus::Playing,
                position: 10.0,
                speed: 1.0,
                duration: 60.0,
            },
            rtt: 0.2,
        }))
        .await
        .unwrap();

    let broadcast = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            if let ClientMessage::StateBroadcast(state) = guest.recv().await.unwrap() {
                return state;
            }
        }
    })
    .await
    .expect("guest should see a state broadcast through the proxy");

    assert_eq!(broadcast.status, PlaybackStatus::Playing);
    assert!(broadcast.position >= 10.0 && broadcast.position < 10.5);
}
