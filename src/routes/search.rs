use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::SongCard,
    routes::{AppQuery, AppState},
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    query: Option<String>,
}

/// Handler for song search by title or artist
pub async fn search(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SearchQuery>,
) -> AppResult<Json<Value>> {
    let query = params
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Search query is required".to_string()))?;

    let songs = state.store.search_songs(&query).await?;
    let results: Vec<SongCard> = songs.iter().map(SongCard::from).collect();

    tracing::debug!(query = %query, hits = results.len(), "Search completed");
    Ok(Json(json!({ "success": true, "results": results })))
}
