use serde::{Deserialize, Serialize};

/// Cover shown for songs that were created without artwork
pub const DEFAULT_COVER_URL: &str = "/static/music_img/default_cover.jpg";

/// A song in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Song {
    pub id: i32,
    pub title: String,
    pub artist_name: String,
    pub genre: Option<String>,
    /// Number of recorded plays, never negative
    pub play_count: i32,
    pub cover_url: String,
}

/// Catalog listing entry, omits the play counter
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SongSummary {
    pub id: i32,
    pub title: String,
    pub artist_name: String,
    pub genre: Option<String>,
    pub cover_url: String,
}

impl From<&Song> for SongSummary {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artist_name: song.artist_name.clone(),
            genre: song.genre.clone(),
            cover_url: song.cover_url.clone(),
        }
    }
}

/// Compact form used by search results and recommendations
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SongCard {
    pub id: i32,
    pub title: String,
    pub artist: String,
    pub cover: String,
}

impl From<&Song> for SongCard {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artist: song.artist_name.clone(),
            cover: song.cover_url.clone(),
        }
    }
}

/// Validated input for inserting a song
#[derive(Debug, Clone, PartialEq)]
pub struct NewSong {
    pub title: String,
    pub artist_name: String,
    pub genre: Option<String>,
    pub cover_url: String,
}

impl NewSong {
    /// Builds a new song, falling back to the default cover when none is given
    pub fn new(
        title: impl Into<String>,
        artist_name: impl Into<String>,
        genre: Option<String>,
        cover_url: Option<String>,
    ) -> Self {
        let cover_url = cover_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COVER_URL.to_string());

        Self {
            title: title.into(),
            artist_name: artist_name.into(),
            genre,
            cover_url,
        }
    }
}

/// Partial update of a song's descriptive fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
}

impl SongUpdate {
    pub fn apply(self, song: &mut Song) {
        if let Some(title) = self.title {
            song.title = title;
        }
        if let Some(artist_name) = self.artist_name {
            song.artist_name = artist_name;
        }
        if let Some(genre) = self.genre {
            song.genre = Some(genre);
        }
        if let Some(cover_url) = self.cover_url {
            song.cover_url = cover_url;
        }
    }
}
