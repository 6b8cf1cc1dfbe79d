//! The scheduler's only HTTP endpoint: `POST /room` behaves like a
//! reverse proxy, picking a backend off the host pool, forwarding the
//! creation request, and pinning the resulting room in the Registry.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use rb_protocol::rest::RoomCreatedMsg;

use crate::error::SchedulerError;
use crate::state::AppState;

pub async fn create_room(
    State(state): State<AppState>,
) -> Result<Json<RoomCreatedMsg>, SchedulerError> {
    let host = state.pool.next_backend().await.ok_or(SchedulerError::NoBackends)?;

    let resp = state
        .http
        .post(format!("http://{host}/room"))
        .send()
        .await
        .map_err(|_| SchedulerError::BackendUnreachable)?;

    if !resp.status().is_success() {
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return Err(SchedulerError::BackendError(status));
    }

    let created: RoomCreatedMsg = resp.json().await.map_err(|_| SchedulerError::BackendUnreachable)?;
    state.registry.set(&created.room_id, &host).await?;

    info!(room_id = %created.room_id, backend = %host, "room scheduled");
    Ok(Json(created))
}
