use std::collections::HashMap;
use std::time::Duration;

use backend::state::AppState as BackendState;
use rb_protocol::rest::{RoomCreatedMsg, SchedulingStrategy, ScheduleInfo};
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
async fn creates_room_on_scheduled_backend_and_registers_it() {
    let backend_addr = spawn_backend().await;

    let registry = Registry::in_memory();
    let schedule = ScheduleChannel::Memory(MemoryScheduleChannel::new());
    schedule.publish(ScheduleInfo {
        backends: HashMap::from([(backend_addr.clone(), 1.0)]),
        strategy: SchedulingStrategy::Balance,
    });

    let state = scheduler::AppState::new(registry.clone(), schedule).await;
    // Let the subscription task observe the publish before serving.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let router = scheduler::build_router(state);

    let port = free_port().await;
    let sched_addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&sched_addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let http = reqwest::Client::new();
    let created: RoomCreatedMsg = http
        .post(format!("http://{sched_addr}/room"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(created.ok);

    let registered = registry.get(&created.room_id).await.unwrap();
    assert_eq!(registered, Some(backend_addr));
}

#[tokio::test]
async fn no_backends_yields_service_unavailable() {
    let registry = Registry::in_memory();
    let schedule = ScheduleChannel::Memory(MemoryScheduleChannel::new());
    let state = scheduler::AppState::new(registry, schedule).await;
    let router = scheduler::build_router(state);

    let port = free_port().await;
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let http = reqwest::Client::new();
    let resp = http.post(format!("http://{addr}/room")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}
