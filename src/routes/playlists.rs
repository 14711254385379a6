use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{NewPlaylist, Playlist, PlaylistDetail, PlaylistView, SongSummary},
    routes::{required, AppJson, AppPath, AppState},
};

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    userid: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddSongRequest {
    music_id: Option<i32>,
}

async fn existing_playlist(state: &AppState, playlist_id: i32) -> AppResult<Playlist> {
    state
        .store
        .get_playlist(playlist_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))
}

pub async fn user_playlists(
    State(state): State<Arc<AppState>>,
    AppPath(userid): AppPath<String>,
) -> AppResult<Json<Value>> {
    let playlists = state.store.playlists_for_user(&userid).await?;
    let data: Vec<PlaylistView> = playlists
        .iter()
        .map(|p| PlaylistView::new(p, state.display_offset_hours))
        .collect();
    Ok(Json(json!({ "success": true, "data": data })))
}

pub async fn create_playlist(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<CreatePlaylistRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    const MISSING: &str = "User id and title are required";
    let userid = required(request.userid, MISSING)?;
    let title = required(request.title, MISSING)?;

    let playlist = state
        .store
        .create_playlist(NewPlaylist {
            userid,
            title,
            description: request.description.unwrap_or_default(),
        })
        .await?;
    tracing::info!(playlist_id = playlist.id, user_id = %playlist.userid, "Playlist created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": PlaylistView::new(&playlist, state.display_offset_hours),
        })),
    ))
}

pub async fn delete_playlist(
    State(state): State<Arc<AppState>>,
    AppPath(playlist_id): AppPath<i32>,
) -> AppResult<Json<Value>> {
    if !state.store.delete_playlist(playlist_id).await? {
        return Err(AppError::NotFound("Playlist not found".to_string()));
    }
    tracing::info!(playlist_id, "Playlist deleted");
    Ok(Json(json!({ "success": true })))
}

pub async fn playlist_detail(
    State(state): State<Arc<AppState>>,
    AppPath(playlist_id): AppPath<i32>,
) -> AppResult<Json<Value>> {
    let playlist = existing_playlist(&state, playlist_id).await?;
    let songs = state.store.playlist_songs(playlist_id).await?;

    let detail = PlaylistDetail {
        playlist: PlaylistView::new(&playlist, state.display_offset_hours),
        songs: songs.iter().map(SongSummary::from).collect(),
    };
    Ok(Json(json!({ "success": true, "data": detail })))
}

pub async fn add_song(
    State(state): State<Arc<AppState>>,
    AppPath(playlist_id): AppPath<i32>,
    AppJson(request): AppJson<AddSongRequest>,
) -> AppResult<Json<Value>> {
    let music_id = request
        .music_id
        .ok_or_else(|| AppError::InvalidInput("Song id is required".to_string()))?;

    existing_playlist(&state, playlist_id).await?;
    if state.store.get_song(music_id).await?.is_none() {
        return Err(AppError::NotFound("Song not found".to_string()));
    }

    if !state.store.add_playlist_song(playlist_id, music_id).await? {
        return Err(AppError::Conflict(
            "Song is already in the playlist".to_string(),
        ));
    }
    Ok(Json(json!({ "success": true })))
}

pub async fn remove_song(
    State(state): State<Arc<AppState>>,
    AppPath((playlist_id, music_id)): AppPath<(i32, i32)>,
) -> AppResult<Json<Value>> {
    state
        .store
        .remove_playlist_song(playlist_id, music_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
