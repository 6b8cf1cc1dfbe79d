use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rb_protocol::rest::ErrorEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("unknown room ID")]
    UnknownRoom,
    #[error("backend unreachable")]
    BackendUnreachable,
    #[error("backend rejected join: {0}")]
    JoinRejected(StatusCode),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::UnknownRoom => StatusCode::BAD_REQUEST,
            ProxyError::BackendUnreachable => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::JoinRejected(status) => status,
        };
        let body = axum::Json(ErrorEnvelope::new(self.to_string()));
        (status, body).into_response()
    }
}
