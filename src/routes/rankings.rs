use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{error::AppResult, models::Rankings, routes::AppState};

const RANKING_SIZE: i64 = 10;

/// Handler for the charts: most played artists and songs
pub async fn rankings(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let rankings = Rankings {
        artists: state
            .store
            .artist_rankings(RANKING_SIZE)
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
        hot_songs: state.store.hot_songs(RANKING_SIZE).await?,
    };

    Ok(Json(json!({ "success": true, "rankings": rankings })))
}
