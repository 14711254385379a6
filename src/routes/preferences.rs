use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::UserPreferences,
    routes::{required, AppJson, AppQuery, AppState},
};

const MISSING_USER: &str = "User id is required";

#[derive(Debug, Deserialize)]
pub struct PreferencesQuery {
    userid: Option<String>,
}

/// List fields stay untyped so a malformed value gets a 400 with a message
#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    userid: Option<String>,
    favorite_genres: Option<Value>,
    favorite_artists: Option<Value>,
    listening_times: Option<Value>,
}

/// Reads an optional JSON array of strings; absent means empty
fn string_list(value: Option<Value>, field: &str) -> AppResult<Vec<String>> {
    let invalid = || AppError::InvalidInput(format!("{} must be a list of strings", field));

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(invalid()),
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<PreferencesRequest>,
) -> AppResult<Json<Value>> {
    let userid = required(request.userid, MISSING_USER)?;

    let preferences = UserPreferences::new(
        string_list(request.favorite_genres, "favorite_genres")?,
        string_list(request.favorite_artists, "favorite_artists")?,
        string_list(request.listening_times, "listening_times")?,
    );

    if state.store.find_user(&userid).await?.is_none() {
        return Err(AppError::NotFound("User does not exist".to_string()));
    }

    state
        .store
        .save_preferences(&userid, preferences.clone())
        .await?;
    tracing::info!(user_id = %userid, "Preferences updated");

    Ok(Json(json!({
        "success": true,
        "message": "Preferences updated",
        "data": preferences,
    })))
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<PreferencesQuery>,
) -> AppResult<Json<Value>> {
    let userid = required(query.userid, MISSING_USER)?;
    let preferences = state
        .store
        .get_preferences(&userid)
        .await?
        .unwrap_or_default();

    Ok(Json(json!({ "success": true, "preferences": preferences })))
}
