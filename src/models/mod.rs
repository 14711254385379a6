use chrono::{DateTime, FixedOffset, Offset, Utc};

pub mod activity;
pub mod feedback;
pub mod playlist;
pub mod song;
pub mod user;
pub mod user_preferences;

pub use activity::{
    ArtistCount, ArtistRanking, GenreCount, HistoryEntry, HotSong, ListeningStats, PlayCount,
    PlayRecord, Rankings, RecentPlay,
};
pub use feedback::{
    CommentRecord, CommentView, NewComment, RatingEntry, RatingSummary, RATING_RANGE,
};
pub use playlist::{NewPlaylist, Playlist, PlaylistDetail, PlaylistView};
pub use song::{NewSong, Song, SongCard, SongSummary, SongUpdate, DEFAULT_COVER_URL};
pub use user::{User, UserProfile};
pub use user_preferences::{UserPreferenceRecord, UserPreferences};

/// Wire format for every timestamp handed to clients
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders a stored UTC timestamp in the configured display offset
pub fn format_timestamp(ts: DateTime<Utc>, offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap_or_else(|| Utc.fix());
    ts.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string()
}
