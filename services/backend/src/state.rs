//! Server-level state: the rooms map and the pending-join table that
//! hands a multiplexed client's `Connected` frame back to the room it
//! was authorised against during `/join`. Both are guarded by a
//! reader/writer lock per the concurrency model: lookups (far more
//! common than room creation/teardown) never block each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

use crate::multiplex::Job;
use crate::room::{spawn_room, ClientRole, RoomHandle};
use crate::tokens::generate_token;
use crate::workers;

pub struct RoomEntry {
    pub handle: RoomHandle,
    pub master_token: String,
    pub guest_token: String,
}

#[derive(Clone)]
pub struct PendingJoin {
    pub room: RoomHandle,
    pub role: ClientRole,
}

pub enum Authorisation {
    Ok(RoomHandle, ClientRole),
    RoomNotFound,
    BadToken,
}

/// Keyed by client ID, populated by `/join` and consumed by the first
/// multiplex `Connected` frame (or by the direct `/ws` upgrade) for
/// that client. A plain `std::sync::Mutex` is enough: every access is
/// a single map operation with no `.await` held across the lock.
#[derive(Clone, Default)]
pub struct PendingJoins(Arc<Mutex<HashMap<String, PendingJoin>>>);

impl PendingJoins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client_id: String, join: PendingJoin) {
        self.0.lock().expect("pending joins lock poisoned").insert(client_id, join);
    }

    pub fn take(&self, client_id: &str) -> Option<PendingJoin> {
        self.0.lock().expect("pending joins lock poisoned").remove(client_id)
    }
}

#[derive(Clone)]
pub struct AppState {
    rooms: Arc<RwLock<HashMap<String, RoomEntry>>>,
    pub pending_joins: PendingJoins,
    pub masterless_timeout: Duration,
    /// Shared multiplexor decode/dispatch queue, drained by the worker
    /// pool spawned alongside it.
    pub work_tx: mpsc::Sender<Job>,
    /// Set by `DELETE /server`. Once true, `create_room` refuses new
    /// rooms; existing rooms keep running until they tear down on
    /// their own (masterless timeout, or process exit).
    draining: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(masterless_timeout: Duration) -> Self {
        let (work_tx, work_rx) = mpsc::channel(workers::WORK_QUEUE_SIZE);
        workers::spawn_workers(workers::worker_count(), work_rx);
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            pending_joins: PendingJoins::new(),
            masterless_timeout,
            work_tx,
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops the server from accepting new rooms. Idempotent.
    pub fn begin_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Creates a room with a fresh ID and token pair, spawns its actor,
    /// and arranges for it to be dropped from the map once the actor
    /// exits (masterless timeout, or an explicit future teardown path).
    /// Returns `None` once the server is draining.
    pub async fn create_room(&self) -> Option<(String, String, String)> {
        if self.is_draining() {
            return None;
        }
        let room_id = uuid::Uuid::now_v7().to_string();
        let master_token = generate_token();
        let guest_token = generate_token();
        let (handle, shutdown) = spawn_room(room_id.clone(), self.masterless_timeout);

        self.rooms.write().await.insert(
            room_id.clone(),
            RoomEntry {
                handle,
                master_token: master_token.clone(),
                guest_token: guest_token.clone(),
            },
        );

        let rooms = self.rooms.clone();
        let reap_id = room_id.clone();
        tokio::spawn(async move {
            let _ = shutdown.0.await;
            rooms.write().await.remove(&reap_id);
        });

        Some((room_id, master_token, guest_token))
    }

    pub async fn room_handle(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).map(|e| e.handle.clone())
    }

    /// Resolves a room token to the role it grants. Distinguishes an
    /// unknown room from a known room with a bad token, since those are
    /// two different HTTP outcomes (400 vs 401) at every call site.
    pub async fn authorise(&self, room_id: &str, token: &str) -> Authorisation {
        let rooms = self.rooms.read().await;
        let Some(entry) = rooms.get(room_id) else {
            return Authorisation::RoomNotFound;
        };
        if token == entry.master_token {
            Authorisation::Ok(entry.handle.clone(), ClientRole::Master)
        } else if token == entry.guest_token {
            Authorisation::Ok(entry.handle.clone(), ClientRole::Guest)
        } else {
            Authorisation::BadToken
        }
    }

    pub async fn room_ids(&self) -> Vec<String> {
        self.rooms.read().await.keys().cloned().collect()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn all_rooms(&self) -> Vec<(String, String, String)> {
        self.rooms
            .read()
            .await
            .iter()
            .map(|(id, e)| (id.clone(), e.master_token.clone(), e.guest_token.clone()))
            .collect()
    }
}
