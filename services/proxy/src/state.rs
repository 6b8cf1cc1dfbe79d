//! The reverse proxy is stateless at request time: its only state is
//! the `backendHost -> live BackendConnection` table (one physical
//! multiplexed WebSocket per backend the proxy has ever talked to) and
//! a read-only handle onto the shared Registry.

use std::collections::HashMap;
use std::sync::Arc;

use rb_protocol::message::ClientMessage;
use rb_protocol::multiplex::MultiplexFrame;
use rb_registry::Registry;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::warn;

use crate::error::ProxyError;
use crate::mux_link;

pub const MULTIPLEX_SEND_QUEUE_SIZE: usize = 256;
pub const EDGE_SEND_QUEUE_SIZE: usize = 32;

/// One physical `/rev` WebSocket to a single backend, fanning out to
/// every edge client the proxy has attached to it.
pub struct BackendConnection {
    pub host: String,
    pub proxy_id: String,
    out_tx: mpsc::Sender<MultiplexFrame>,
    clients: Mutex<HashMap<String, mpsc::Sender<ClientMessage>>>,
}

impl BackendConnection {
    pub fn new(host: String, proxy_id: String, out_tx: mpsc::Sender<MultiplexFrame>) -> Self {
        Self {
            host,
            proxy_id,
            out_tx,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn send_frame(&self, frame: MultiplexFrame) {
        if self.out_tx.try_send(frame).is_err() {
            warn!(host = %self.host, "backend send queue full or closed, dropping frame");
        }
    }

    pub async fn register_client(&self, client_id: String, tx: mpsc::Sender<ClientMessage>) {
        self.clients.lock().await.insert(client_id, tx);
    }

    pub async fn remove_client(&self, client_id: &str) {
        self.clients.lock().await.remove(client_id);
    }

    /// Delivers a message the backend sent for `client_id`. Returns
    /// `false` if no such client is attached (stale/unknown), in which
    /// case the caller must tell the backend to clean up.
    pub async fn deliver(&self, client_id: &str, msg: ClientMessage) -> bool {
        let clients = self.clients.lock().await;
        match clients.get(client_id) {
            Some(tx) => {
                if tx.try_send(msg).is_err() {
                    warn!(client_id, "edge client send queue full, message dropped");
                }
                true
            }
            None => false,
        }
    }

    /// Tears down every edge client attached to this connection by
    /// dropping its sender (the edge writer loop sees the channel
    /// close and ends, taking the edge socket down with it).
    pub async fn teardown(&self) {
        self.clients.lock().await.clear();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub http: reqwest::Client,
    backends: Arc<RwLock<HashMap<String, Arc<BackendConnection>>>>,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            http: reqwest::Client::new(),
            backends: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the existing multiplex connection to `host`, or dials a
    /// fresh one. Double-checked under the write lock so two
    /// concurrent callers for the same never-seen backend don't dial
    /// twice.
    pub async fn get_or_connect(&self, host: &str) -> Result<Arc<BackendConnection>, ProxyError> {
        if let Some(conn) = self.backends.read().await.get(host) {
            return Ok(conn.clone());
        }
        let mut backends = self.backends.write().await;
        if let Some(conn) = backends.get(host) {
            return Ok(conn.clone());
        }
        let conn = mux_link::dial(host.to_string(), self.backends.clone()).await?;
        backends.insert(host.to_string(), conn.clone());
        Ok(conn)
    }

    pub async fn drop_backend(&self, host: &str) {
        self.backends.write().await.remove(host);
    }
}
