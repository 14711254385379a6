use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        ArtistCount, CommentRecord, GenreCount, HotSong, NewComment, NewPlaylist, NewSong,
        PlayCount, PlayRecord, Playlist, RatingEntry, RatingSummary, Song, SongUpdate, User,
        UserPreferenceRecord, UserPreferences,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Persistence boundary for every route
///
/// Implementations must make each method atomic: a failed call leaves no
/// partial writes behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // Accounts

    /// Inserts a user, failing with `Conflict` when the login id is taken
    async fn create_user(&self, user: User) -> AppResult<()>;
    async fn find_user(&self, userid: &str) -> AppResult<Option<User>>;
    async fn find_user_by_login(&self, login_id: &str) -> AppResult<Option<User>>;
    async fn update_username(&self, userid: &str, username: &str) -> AppResult<Option<User>>;
    /// Returns false when no such user exists
    async fn update_password(&self, userid: &str, password_hash: &str) -> AppResult<bool>;

    // Catalog

    async fn list_songs(&self) -> AppResult<Vec<Song>>;
    async fn get_song(&self, id: i32) -> AppResult<Option<Song>>;
    async fn songs_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Song>>;
    async fn create_song(&self, song: NewSong) -> AppResult<Song>;
    async fn update_song(&self, id: i32, update: SongUpdate) -> AppResult<Option<Song>>;
    /// Case-insensitive substring match on title or artist
    async fn search_songs(&self, query: &str) -> AppResult<Vec<Song>>;

    // Comments and ratings

    /// Comments on a song, newest first
    async fn list_comments(&self, music_id: i32) -> AppResult<Vec<CommentRecord>>;
    async fn add_comment(&self, comment: NewComment) -> AppResult<CommentRecord>;
    /// Inserts or replaces the user's rating and returns the song's new summary
    async fn upsert_rating(
        &self,
        userid: &str,
        music_id: i32,
        rating_value: i32,
    ) -> AppResult<RatingSummary>;
    async fn rating_summary(&self, music_id: i32) -> AppResult<RatingSummary>;
    async fn all_ratings(&self) -> AppResult<Vec<RatingEntry>>;

    // Play history

    /// Bumps the song's play counter and logs the event; `None` if the song is unknown
    async fn record_play(&self, userid: &str, music_id: i32) -> AppResult<Option<i32>>;
    /// Most recent plays of existing songs, newest first
    async fn recent_plays(&self, userid: &str, limit: i64) -> AppResult<Vec<PlayRecord>>;
    /// Play events grouped by (user, song)
    async fn play_counts(&self) -> AppResult<Vec<PlayCount>>;
    async fn top_genres(
        &self,
        userid: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<GenreCount>>;
    async fn top_artists(
        &self,
        userid: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ArtistCount>>;
    async fn total_plays(&self, userid: &str, since: DateTime<Utc>) -> AppResult<i64>;
    async fn artist_rankings(&self, limit: i64) -> AppResult<Vec<ArtistCount>>;
    /// Songs with at least one play event, most played first
    async fn hot_songs(&self, limit: i64) -> AppResult<Vec<HotSong>>;
    /// All songs by play-event count (then id), skipping `exclude`
    async fn popular_song_ids(&self, exclude: &[i32], limit: i64) -> AppResult<Vec<i32>>;

    // Playlists

    async fn playlists_for_user(&self, userid: &str) -> AppResult<Vec<Playlist>>;
    async fn create_playlist(&self, playlist: NewPlaylist) -> AppResult<Playlist>;
    async fn get_playlist(&self, id: i32) -> AppResult<Option<Playlist>>;
    /// Removes the playlist and its song links; false when it did not exist
    async fn delete_playlist(&self, id: i32) -> AppResult<bool>;
    async fn playlist_songs(&self, playlist_id: i32) -> AppResult<Vec<Song>>;
    /// False when the song was already in the playlist
    async fn add_playlist_song(&self, playlist_id: i32, music_id: i32) -> AppResult<bool>;
    async fn remove_playlist_song(&self, playlist_id: i32, music_id: i32) -> AppResult<()>;

    // Preferences

    async fn get_preferences(&self, userid: &str) -> AppResult<Option<UserPreferences>>;
    async fn save_preferences(&self, userid: &str, preferences: UserPreferences)
        -> AppResult<()>;
    async fn all_preferences(&self) -> AppResult<Vec<UserPreferenceRecord>>;
}
