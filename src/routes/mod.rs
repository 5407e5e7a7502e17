//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API, the auth flow and the canvas websocket
//! under one Axum router. Everything else falls through to the static
//! frontend bundle; unknown paths get `index.html` so the client-side router
//! can render `/`, `/login` and `/drawings/{id}`.

pub mod auth;
pub mod drawings;
pub mod ws;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// API, auth and websocket routes.
fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/github", get(auth::github_redirect))
        .route("/auth/github/callback", get(auth::github_callback))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/dev/login", post(auth::dev_login))
        .route("/api/drawings", get(drawings::list_drawings).post(drawings::create_drawing))
        .route(
            "/api/drawings/{id}",
            get(drawings::get_drawing)
                .patch(drawings::update_drawing)
                .delete(drawings::delete_drawing),
        )
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Full application: API routes plus the static frontend fallback.
pub fn app(state: AppState, config: &ServerConfig) -> Router {
    let index = config.static_dir.join("index.html");
    let frontend = ServeDir::new(&config.static_dir).fallback(ServeFile::new(index));

    api_routes(state)
        .fallback_service(frontend)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
