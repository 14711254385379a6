use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{ListeningStats, RecentPlay},
    routes::{required, AppQuery, AppState},
};

/// Trailing window covered by the listening summary
const STATS_WINDOW_DAYS: i64 = 30;
const TOP_ENTRIES: i64 = 5;
const RECENT_PLAYS_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    userid: Option<String>,
}

pub async fn music_stats(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<StatsQuery>,
) -> AppResult<Json<Value>> {
    let userid = required(query.userid, "User id is required")?;
    let since = Utc::now() - Duration::days(STATS_WINDOW_DAYS);

    let stats = ListeningStats {
        genre_stats: state.store.top_genres(&userid, since, TOP_ENTRIES).await?,
        artist_stats: state.store.top_artists(&userid, since, TOP_ENTRIES).await?,
        total_plays: state.store.total_plays(&userid, since).await?,
    };

    Ok(Json(json!({ "success": true, "stats": stats })))
}

pub async fn recent_plays(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<StatsQuery>,
) -> AppResult<Json<Value>> {
    let userid = required(query.userid, "User id is required")?;
    let plays = state.store.recent_plays(&userid, RECENT_PLAYS_LIMIT).await?;

    let recent: Vec<RecentPlay> = plays
        .into_iter()
        .map(|play| RecentPlay {
            title: play.title,
            artist: play.artist_name,
            played_at: state.timestamp(play.played_at),
        })
        .collect();

    Ok(Json(json!({ "success": true, "recent_plays": recent })))
}
