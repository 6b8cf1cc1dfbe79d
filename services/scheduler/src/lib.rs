pub mod config;
pub mod error;
pub mod host_pool;
pub mod rest;
pub mod state;

use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/room", post(rest::create_room))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
