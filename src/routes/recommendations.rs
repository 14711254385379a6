use axum::{
    extract::State,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::SongCard,
    routes::{required, AppQuery, AppState},
    services::recommendations,
};

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    userid: Option<String>,
}

/// Handler for recommendations endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    AppQuery(query): AppQuery<RecommendationQuery>,
) -> AppResult<Json<Value>> {
    let userid = required(query.userid, "User id is required")?;

    tracing::info!(
        request_id = %request_id,
        user_id = %userid,
        "Processing recommendation request"
    );

    let songs =
        recommendations::recommend_for_user(state.store.as_ref(), &userid, state.recommender)
            .await?;
    let collaborative: Vec<SongCard> = songs.iter().map(SongCard::from).collect();

    tracing::info!(
        request_id = %request_id,
        count = collaborative.len(),
        "Recommendations completed"
    );

    Ok(Json(json!({
        "success": true,
        "recommendations": { "collaborative": collaborative },
    })))
}
