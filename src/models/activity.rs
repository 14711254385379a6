use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of times a user played a song
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PlayCount {
    pub userid: String,
    pub music_id: i32,
    pub play_count: i64,
}

/// A play event joined with the song that was played
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PlayRecord {
    pub music_id: i32,
    pub title: String,
    pub artist_name: String,
    pub played_at: DateTime<Utc>,
}

/// Play-history entry as returned by `/music/play-history`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryEntry {
    pub id: i32,
    pub title: String,
    pub artist_name: String,
    pub played_at: String,
}

/// Recent-activity entry as returned by `/user_stats/stats/recent`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentPlay {
    pub title: String,
    pub artist: String,
    pub played_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct GenreCount {
    pub genre: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct ArtistCount {
    pub artist: String,
    pub count: i64,
}

/// Listening summary for one user over a trailing window
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListeningStats {
    pub genre_stats: Vec<GenreCount>,
    pub artist_stats: Vec<ArtistCount>,
    pub total_plays: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArtistRanking {
    pub name: String,
    pub popularity: i64,
}

impl From<ArtistCount> for ArtistRanking {
    fn from(count: ArtistCount) -> Self {
        Self {
            name: count.artist,
            popularity: count.count,
        }
    }
}

/// Song ranked by total play events
#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct HotSong {
    pub id: i32,
    pub title: String,
    pub artist: String,
    pub genre: Option<String>,
    pub popularity: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Rankings {
    pub artists: Vec<ArtistRanking>,
    #[serde(rename = "hotSongs")]
    pub hot_songs: Vec<HotSong>,
}
