use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{
        CommentView, HistoryEntry, NewComment, NewSong, Song, SongSummary, SongUpdate,
        RATING_RANGE,
    },
    routes::{required, AppJson, AppPath, AppState},
};

/// Plays returned by the history endpoint
const PLAY_HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct CreateSongRequest {
    title: Option<String>,
    artist_name: Option<String>,
    genre: Option<String>,
    cover_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSongRequest {
    title: Option<String>,
    artist_name: Option<String>,
    genre: Option<String>,
    cover_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    userid: Option<String>,
    comment_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    userid: Option<String>,
    /// Kept loose so that floats, strings and booleans are rejected with a message
    rating_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    userid: Option<String>,
}

fn song_not_found() -> AppError {
    AppError::NotFound("Song not found".to_string())
}

async fn existing_song(state: &AppState, music_id: i32) -> AppResult<Song> {
    state.store.get_song(music_id).await?.ok_or_else(song_not_found)
}

pub async fn list_songs(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let songs = state.store.list_songs().await?;
    let data: Vec<SongSummary> = songs.iter().map(SongSummary::from).collect();
    Ok(Json(json!({ "success": true, "data": data })))
}

pub async fn get_song(
    State(state): State<Arc<AppState>>,
    AppPath(music_id): AppPath<i32>,
) -> AppResult<Json<Value>> {
    let song = existing_song(&state, music_id).await?;
    Ok(Json(json!({ "success": true, "data": song })))
}

pub async fn create_song(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<CreateSongRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    const MISSING: &str = "Title and artist name are required";
    let title = required(request.title, MISSING)?;
    let artist_name = required(request.artist_name, MISSING)?;

    let cover_url = match request.cover_url {
        Some(url) => Some(state.media.promote_cover(&url).await?.unwrap_or(url)),
        None => None,
    };

    let song = state
        .store
        .create_song(NewSong::new(title, artist_name, request.genre, cover_url))
        .await?;
    tracing::info!(song_id = song.id, title = %song.title, "Song created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Song created",
            "data": song,
        })),
    ))
}

pub async fn update_song(
    State(state): State<Arc<AppState>>,
    AppPath(music_id): AppPath<i32>,
    AppJson(request): AppJson<UpdateSongRequest>,
) -> AppResult<Json<Value>> {
    existing_song(&state, music_id).await?;

    if [&request.title, &request.artist_name]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| v.trim().is_empty()))
    {
        return Err(AppError::InvalidInput(
            "Title and artist name cannot be blank".to_string(),
        ));
    }

    // Only covers sitting in the temp upload area are applied
    let cover_url = match request.cover_url.as_deref() {
        Some(url) => state.media.promote_cover(url).await?,
        None => None,
    };

    let update = SongUpdate {
        title: request.title,
        artist_name: request.artist_name,
        genre: request.genre,
        cover_url,
    };

    let song = state
        .store
        .update_song(music_id, update)
        .await?
        .ok_or_else(song_not_found)?;

    Ok(Json(json!({ "success": true, "data": SongSummary::from(&song) })))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    AppPath(music_id): AppPath<i32>,
) -> AppResult<Json<Value>> {
    let comments = state.store.list_comments(music_id).await?;
    let data: Vec<CommentView> = comments
        .iter()
        .map(|c| CommentView::new(c, state.display_offset_hours))
        .collect();
    Ok(Json(json!({ "success": true, "data": data })))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    AppPath(music_id): AppPath<i32>,
    AppJson(request): AppJson<CommentRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    const MISSING: &str = "User id and comment text are required";
    let userid = required(request.userid, MISSING)?;
    let comment_text = required(request.comment_text, MISSING)?;
    if comment_text.trim().is_empty() {
        return Err(AppError::InvalidInput(MISSING.to_string()));
    }

    existing_song(&state, music_id).await?;

    let comment = state
        .store
        .add_comment(NewComment {
            userid,
            music_id,
            comment_text,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": CommentView::new(&comment, state.display_offset_hours),
        })),
    ))
}

pub async fn get_ratings(
    State(state): State<Arc<AppState>>,
    AppPath(music_id): AppPath<i32>,
) -> AppResult<Json<Value>> {
    let summary = state.store.rating_summary(music_id).await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "average_rating": summary.average,
            "rating_count": summary.count,
        },
    })))
}

pub async fn submit_rating(
    State(state): State<Arc<AppState>>,
    AppPath(music_id): AppPath<i32>,
    AppJson(request): AppJson<RatingRequest>,
) -> AppResult<Json<Value>> {
    let userid = required(request.userid, "User id is required")?;
    let rating_value = request
        .rating_value
        .as_ref()
        .and_then(Value::as_i64)
        .filter(|v| RATING_RANGE.contains(v))
        .ok_or_else(|| {
            AppError::InvalidInput("Rating must be a whole number from 1 to 5".to_string())
        })?;

    existing_song(&state, music_id).await?;

    let summary = state
        .store
        .upsert_rating(&userid, music_id, rating_value as i32)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "new_average": summary.average,
            "new_count": summary.count,
        },
    })))
}

pub async fn record_play(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    AppPath(music_id): AppPath<i32>,
    AppJson(request): AppJson<PlayRequest>,
) -> AppResult<Json<Value>> {
    let userid = request
        .userid
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Unauthorized("User is not logged in".to_string()))?;

    let play_count = state
        .store
        .record_play(&userid, music_id)
        .await?
        .ok_or_else(song_not_found)?;

    tracing::debug!(
        request_id = %request_id,
        user_id = %userid,
        song_id = music_id,
        play_count,
        "Play recorded"
    );

    Ok(Json(json!({
        "success": true,
        "data": { "play_count": play_count },
    })))
}

pub async fn play_history(
    State(state): State<Arc<AppState>>,
    AppPath(userid): AppPath<String>,
) -> AppResult<Json<Value>> {
    let plays = state.store.recent_plays(&userid, PLAY_HISTORY_LIMIT).await?;
    let data: Vec<HistoryEntry> = plays
        .into_iter()
        .map(|play| HistoryEntry {
            id: play.music_id,
            title: play.title,
            artist_name: play.artist_name,
            played_at: state.timestamp(play.played_at),
        })
        .collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

/// Fields of an upload form
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Bytes)>,
    artist_name: Option<String>,
    title: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    form.file = Some((file_name, field.bytes().await?));
                }
                Some("artist_name") => form.artist_name = Some(field.text().await?),
                Some("title") => form.title = Some(field.text().await?),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Returns (artist, title, bytes) once every part is present
    fn into_parts(self) -> AppResult<(String, String, Bytes)> {
        let (file_name, bytes) = self
            .file
            .ok_or_else(|| AppError::InvalidInput("No file in request".to_string()))?;
        if file_name.is_empty() {
            return Err(AppError::InvalidInput("No file selected".to_string()));
        }

        const MISSING: &str = "Artist name and title are required";
        let artist = required(self.artist_name, MISSING)?;
        let title = required(self.title, MISSING)?;
        Ok((artist, title, bytes))
    }
}

pub async fn upload_cover(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Value>> {
    let (artist, title, bytes) = UploadForm::read(multipart?).await?.into_parts()?;
    let stored = state.media.save_cover(&artist, &title, &bytes).await?;

    Ok(Json(json!({
        "success": true,
        "url": stored.url,
        "filename": stored.filename,
    })))
}

pub async fn upload_audio(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Value>> {
    let (artist, title, bytes) = UploadForm::read(multipart?).await?.into_parts()?;
    let stored = state.media.save_audio(&artist, &title, &bytes).await?;

    Ok(Json(json!({ "success": true, "file_path": stored.url })))
}
