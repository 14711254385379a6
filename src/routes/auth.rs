use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::UserProfile,
    routes::{required, AppJson, AppState},
    services::auth,
};

const ALL_FIELDS_REQUIRED: &str = "All fields are required";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    login_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    login_id: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeUsernameRequest {
    userid: Option<String>,
    new_username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    userid: Option<String>,
    old_password: Option<String>,
    new_password: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let login_id = required(request.login_id, ALL_FIELDS_REQUIRED)?;
    let username = required(request.username, ALL_FIELDS_REQUIRED)?;
    let password = required(request.password, ALL_FIELDS_REQUIRED)?;

    auth::register(state.store.as_ref(), &login_id, &username, &password).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Registration successful" })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<Value>> {
    const MISSING: &str = "Please enter login id and password";
    let login_id = required(request.login_id, MISSING)?;
    let password = required(request.password, MISSING)?;

    let user = auth::login(state.store.as_ref(), &login_id, &password).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "user": UserProfile::from(&user),
    })))
}

pub async fn change_username(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<ChangeUsernameRequest>,
) -> AppResult<Json<Value>> {
    let userid = required(request.userid, ALL_FIELDS_REQUIRED)?;
    let new_username = required(request.new_username, ALL_FIELDS_REQUIRED)?;

    let user = auth::change_username(state.store.as_ref(), &userid, &new_username).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Username updated",
        "user": UserProfile::from(&user),
    })))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    let userid = required(request.userid, ALL_FIELDS_REQUIRED)?;
    let old_password = required(request.old_password, ALL_FIELDS_REQUIRED)?;
    let new_password = required(request.new_password, ALL_FIELDS_REQUIRED)?;

    auth::change_password(state.store.as_ref(), &userid, &old_password, &new_password).await?;

    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}
