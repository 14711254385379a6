use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
};

pub mod auth;
pub mod extract;
pub mod music;
pub mod playlists;
pub mod preferences;
pub mod rankings;
pub mod recommendations;
pub mod search;
pub mod state;
pub mod stats;

pub use extract::{AppJson, AppPath, AppQuery};
pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.media.root());
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes())
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(Arc::new(state))
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/change-username", post(auth::change_username))
        .route("/auth/change-password", post(auth::change_password))
        // Catalog
        .route("/music/list", get(music::list_songs))
        .route("/music/create", post(music::create_song))
        .route("/music/upload", post(music::upload_audio))
        .route("/music/upload-cover", post(music::upload_cover))
        .route(
            "/music/:music_id",
            get(music::get_song).put(music::update_song),
        )
        .route(
            "/music/:music_id/comments",
            get(music::list_comments).post(music::add_comment),
        )
        .route(
            "/music/:music_id/ratings",
            get(music::get_ratings).post(music::submit_rating),
        )
        .route("/music/:music_id/play", post(music::record_play))
        .route("/music/play-history/:userid", get(music::play_history))
        // Playlists
        .route("/playlist", post(playlists::create_playlist))
        .route("/playlist/", post(playlists::create_playlist))
        .route("/playlist/user/:userid", get(playlists::user_playlists))
        .route(
            "/playlist/:playlist_id",
            get(playlists::playlist_detail).delete(playlists::delete_playlist),
        )
        .route("/playlist/:playlist_id/songs", post(playlists::add_song))
        .route(
            "/playlist/:playlist_id/songs/:music_id",
            delete(playlists::remove_song),
        )
        // Listener profile
        .route(
            "/preferences/preferences",
            get(preferences::get_preferences).post(preferences::update_preferences),
        )
        .route("/user_stats/stats/music", get(stats::music_stats))
        .route("/user_stats/stats/recent", get(stats::recent_plays))
        // Discovery
        .route("/recommendations", get(recommendations::recommend))
        .route("/rankings", get(rankings::rankings))
        .route("/search", get(search::search))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Unwraps a field that must be present and non-empty
pub(crate) fn required(value: Option<String>, message: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(message.to_string())),
    }
}
