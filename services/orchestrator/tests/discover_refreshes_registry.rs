use std::time::Duration;

use backend::state::AppState as BackendState;
use orchestrator::discovery::discover_once;
use orchestrator::membership::StaticList;
use rb_registry::{MemoryScheduleChannel, Registry, ScheduleChannel};

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    tokio::time::sleep(Duration::from_millis(10)).await;
    port
}

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

#[tokio::test]
async fn discovers_rooms_and_publishes_schedule_info() {
    let backend_addr = spawn_backend().await;

    let http = reqwest::Client::new();
    let created: rb_protocol::rest::RoomCreatedMsg = http
        .post(format!("http://{backend_addr}/room"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let registry = Registry::in_memory();
    let schedule = ScheduleChannel::Memory(MemoryScheduleChannel::new());
    let mut rx = schedule.subscribe().await.unwrap();
    let membership = StaticList::new(vec![backend_addr.clone()]);

    discover_once(&membership, &registry, &schedule, &http)
        .await
        .unwrap();

    assert_eq!(
        registry.get(&created.room_id).await.unwrap(),
        Some(backend_addr.clone())
    );

    let info = rx.recv().await.unwrap();
    assert_eq!(info.backends.get(&backend_addr), Some(&1.0));
}

#[tokio::test]
async fn unreachable_backend_does_not_abort_the_round() {
    let registry = Registry::in_memory();
    let schedule = ScheduleChannel::Memory(MemoryScheduleChannel::new());
    let mut rx = schedule.subscribe().await.unwrap();
    let http = reqwest::Client::new();
    // Port 1 is reserved and will refuse the connection immediately.
    let membership = StaticList::new(vec!["127.0.0.1:1".to_string()]);

    discover_once(&membership, &registry, &schedule, &http)
        .await
        .expect("a single unreachable backend must not be fatal");

    let info = rx.recv().await.unwrap();
    assert_eq!(info.backends.len(), 1);
}
