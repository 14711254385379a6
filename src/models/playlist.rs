use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{format_timestamp, SongSummary};

/// A user-owned, named list of songs
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Playlist {
    pub id: i32,
    pub userid: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlaylist {
    pub userid: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlaylistView {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub created_at: String,
}

impl PlaylistView {
    pub fn new(playlist: &Playlist, offset_hours: i32) -> Self {
        Self {
            id: playlist.id,
            title: playlist.title.clone(),
            description: playlist.description.clone(),
            created_at: format_timestamp(playlist.created_at, offset_hours),
        }
    }
}

/// Playlist with its songs, for the detail page
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: PlaylistView,
    pub songs: Vec<SongSummary>,
}
