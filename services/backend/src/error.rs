use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rb_protocol::rest::ErrorEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("invalid room token")]
    InvalidToken,
    #[error("unsupported websocket subprotocol")]
    BadSubprotocol,
    #[error("room creation timed out")]
    CreationTimedOut,
    #[error("server is shutting down, not accepting new rooms")]
    ServerDraining,
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = match self {
            BackendError::RoomNotFound(_) => StatusCode::BAD_REQUEST,
            BackendError::InvalidToken => StatusCode::UNAUTHORIZED,
            BackendError::BadSubprotocol => StatusCode::BAD_REQUEST,
            BackendError::CreationTimedOut => StatusCode::REQUEST_TIMEOUT,
            BackendError::ServerDraining => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = axum::Json(ErrorEnvelope::new(self.to_string()));
        (status, body).into_response()
    }
}
