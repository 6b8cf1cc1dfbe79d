pub mod config;
pub mod edge;
pub mod error;
pub mod mux_link;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(edge::ws_client))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
