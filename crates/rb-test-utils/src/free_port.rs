use tokio::net::TcpListener;

/// Pick a free TCP port by binding to port 0, reading it back, then
/// releasing it. There's a small window where another process could
/// grab it before the caller rebinds; the short sleep after drop is
/// enough in practice for this workspace's test suite.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    port
}
