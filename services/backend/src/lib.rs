pub mod client_session;
pub mod config;
pub mod error;
pub mod multiplex;
pub mod protocol_logic;
pub mod rest;
pub mod room;
pub mod state;
pub mod tokens;
pub mod workers;
pub mod ws_handlers;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/room", axum::routing::post(rest::create_room))
        .route(
            "/server",
            get(rest::server_info).delete(rest::begin_shutdown),
        )
        .route("/allroom", get(rest::all_rooms))
        .route("/join", get(rest::join))
        .route("/ws", get(ws_handlers::ws_client))
        .route("/rev", get(ws_handlers::ws_rev_proxy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
