//! WebSocket upgrade handlers: `/ws` for a client connecting directly,
//! `/rev` for a reverse proxy's shared multiplex link.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use crate::client_session::run_direct_client;
use crate::error::BackendError;
use crate::multiplex::run_multiplexor;
use crate::state::{Authorisation, AppState};

pub const SUBPROTOCOL: &str = "vchamber_v1";

fn has_subprotocol(headers: &HeaderMap) -> bool {
    headers
        .get("sec-websocket-protocol")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|p| p.trim() == SUBPROTOCOL))
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub rid: String,
    pub token: String,
}

pub async fn ws_client(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, BackendError> {
    let (room, role) = match state.authorise(&query.rid, &query.token).await {
        Authorisation::Ok(room, role) => (room, role),
        Authorisation::RoomNotFound => return Err(BackendError::RoomNotFound(query.rid)),
        Authorisation::BadToken => return Err(BackendError::InvalidToken),
    };
    if !has_subprotocol(&headers) {
        return Err(BackendError::BadSubprotocol);
    }

    let client_id = uuid::Uuid::now_v7().to_string();
    info!(client_id, room_id = %query.rid, ?role, "direct client connecting");

    Ok(ws
        .protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| run_direct_client(socket, client_id, role, room)))
}

pub async fn ws_rev_proxy(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let proxy_id = uuid::Uuid::now_v7().to_string();
    ws.on_upgrade(move |socket| {
        run_multiplexor(socket, proxy_id, state.pending_joins, state.work_tx)
    })
}
