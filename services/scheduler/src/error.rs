use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rb_protocol::rest::ErrorEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("no backends available to schedule onto")]
    NoBackends,
    #[error("backend unreachable")]
    BackendUnreachable,
    #[error("backend rejected room creation: {0}")]
    BackendError(StatusCode),
    #[error("registry error: {0}")]
    Registry(#[from] rb_registry::RegistryError),
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let status = match self {
            SchedulerError::NoBackends | SchedulerError::BackendUnreachable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SchedulerError::BackendError(status) => status,
            SchedulerError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(ErrorEnvelope::new(self.to_string()));
        (status, body).into_response()
    }
}
