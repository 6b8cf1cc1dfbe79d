//! The backend's REST surface: room lifecycle and the `/join` handshake
//! a reverse proxy performs on a client's behalf before attaching it to
//! the multiplexed `/rev` connection.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tokio::time::{timeout, Duration};
use tracing::info;

use rb_protocol::rest::{AllRoomEntry, JoinResponse, RoomCreatedMsg, ServerInfoMsg};

use crate::error::BackendError;
use crate::state::{Authorisation, AppState, PendingJoin};

const ROOM_CREATION_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn create_room(State(state): State<AppState>) -> Result<Json<RoomCreatedMsg>, BackendError> {
    let created = timeout(ROOM_CREATION_TIMEOUT, state.create_room())
        .await
        .map_err(|_| BackendError::CreationTimedOut)?;
    let (room_id, master_token, guest_token) = created.ok_or(BackendError::ServerDraining)?;
    info!(room_id, "room created");
    Ok(Json(RoomCreatedMsg {
        ok: true,
        room_id,
        master_token,
        guest_token,
    }))
}

pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfoMsg> {
    let rooms = state.room_ids().await;
    Json(ServerInfoMsg {
        ok: true,
        nroom: rooms.len(),
        rooms,
    })
}

/// Marks the server as shutting down: `create_room` refuses new rooms
/// from this point on. Actual process exit is still driven by the
/// signal handler in `main`; this endpoint lets an orchestrator stop
/// steering new rooms here before it sends that signal.
pub async fn begin_shutdown(State(state): State<AppState>) -> StatusCode {
    state.begin_draining();
    info!("shutdown requested via REST, no longer accepting new rooms");
    StatusCode::ACCEPTED
}

pub async fn all_rooms(State(state): State<AppState>) -> Json<Vec<AllRoomEntry>> {
    let rooms = state
        .all_rooms()
        .await
        .into_iter()
        .map(|(room_id, master_token, guest_token)| AllRoomEntry {
            room_id,
            master_token,
            guest_token,
        })
        .collect();
    Json(rooms)
}

#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    pub rid: String,
    pub token: String,
    /// Accepted for parity with the wire contract; the backend itself
    /// has no use for the proxy's view of the client's remote address.
    #[serde(default)]
    pub remote: Option<String>,
    pub proxyid: String,
}

/// A reverse proxy calls this once per logical client before attaching
/// it to the shared `/rev` multiplex connection. Authorising here
/// (rather than inside the multiplexor) means a bad token never costs
/// a round trip through the shared connection at all.
pub async fn join(
    State(state): State<AppState>,
    Query(query): Query<JoinQuery>,
) -> Result<Json<JoinResponse>, BackendError> {
    let (room, role) = match state.authorise(&query.rid, &query.token).await {
        Authorisation::Ok(room, role) => (room, role),
        Authorisation::RoomNotFound => return Err(BackendError::RoomNotFound(query.rid)),
        Authorisation::BadToken => return Err(BackendError::InvalidToken),
    };

    let client_id = uuid::Uuid::now_v7().to_string();
    state
        .pending_joins
        .insert(client_id.clone(), PendingJoin { room, role });

    info!(client_id, room_id = %query.rid, proxy_id = %query.proxyid, "client authorised to join");
    Ok(Json(JoinResponse { cid: client_id }))
}
