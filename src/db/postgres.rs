use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::Store;
use crate::{
    error::{AppError, AppResult},
    models::{
        ArtistCount, CommentRecord, GenreCount, HotSong, NewComment, NewPlaylist, NewSong,
        PlayCount, PlayRecord, Playlist, RatingEntry, RatingSummary, Song, SongUpdate, User,
        UserPreferenceRecord, UserPreferences,
    },
};

/// Creates a PostgreSQL connection pool and brings the schema up to date
pub async fn create_pool(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// `Store` backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    userid: String,
    favorite_genres: Vec<String>,
    favorite_artists: Vec<String>,
    listening_times: Vec<String>,
}

impl From<PreferenceRow> for UserPreferenceRecord {
    fn from(row: PreferenceRow) -> Self {
        Self {
            userid: row.userid,
            preferences: UserPreferences {
                favorite_genres: row.favorite_genres,
                favorite_artists: row.favorite_artists,
                listening_times: row.listening_times,
            },
        }
    }
}

/// Escapes LIKE wildcards so user input only matches literally
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: User) -> AppResult<()> {
        let result = sqlx::query(
            "INSERT INTO users (userid, username, login_id, password, user_identity) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&user.userid)
        .bind(&user.username)
        .bind(&user.login_id)
        .bind(&user.password)
        .bind(user.user_identity)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                "This login id is already in use".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, userid: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT userid, username, login_id, password, user_identity \
             FROM users WHERE userid = $1",
        )
        .bind(userid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_login(&self, login_id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT userid, username, login_id, password, user_identity \
             FROM users WHERE login_id = $1",
        )
        .bind(login_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_username(&self, userid: &str, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET username = $2 WHERE userid = $1 \
             RETURNING userid, username, login_id, password, user_identity",
        )
        .bind(userid)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_password(&self, userid: &str, password_hash: &str) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET password = $2 WHERE userid = $1")
            .bind(userid)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_songs(&self) -> AppResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            "SELECT id, title, artist_name, genre, play_count, cover_url FROM music ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(songs)
    }

    async fn get_song(&self, id: i32) -> AppResult<Option<Song>> {
        let song = sqlx::query_as::<_, Song>(
            "SELECT id, title, artist_name, genre, play_count, cover_url FROM music WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(song)
    }

    async fn songs_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            "SELECT id, title, artist_name, genre, play_count, cover_url \
             FROM music WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(songs)
    }

    async fn create_song(&self, song: NewSong) -> AppResult<Song> {
        let song = sqlx::query_as::<_, Song>(
            "INSERT INTO music (title, artist_name, genre, cover_url) VALUES ($1, $2, $3, $4) \
             RETURNING id, title, artist_name, genre, play_count, cover_url",
        )
        .bind(&song.title)
        .bind(&song.artist_name)
        .bind(&song.genre)
        .bind(&song.cover_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(song)
    }

    async fn update_song(&self, id: i32, update: SongUpdate) -> AppResult<Option<Song>> {
        let song = sqlx::query_as::<_, Song>(
            "UPDATE music SET \
                 title = COALESCE($2, title), \
                 artist_name = COALESCE($3, artist_name), \
                 genre = COALESCE($4, genre), \
                 cover_url = COALESCE($5, cover_url) \
             WHERE id = $1 \
             RETURNING id, title, artist_name, genre, play_count, cover_url",
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.artist_name)
        .bind(&update.genre)
        .bind(&update.cover_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(song)
    }

    async fn search_songs(&self, query: &str) -> AppResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            "SELECT id, title, artist_name, genre, play_count, cover_url FROM music \
             WHERE title ILIKE $1 OR artist_name ILIKE $1 ORDER BY id",
        )
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?;
        Ok(songs)
    }

    async fn list_comments(&self, music_id: i32) -> AppResult<Vec<CommentRecord>> {
        let comments = sqlx::query_as::<_, CommentRecord>(
            "SELECT c.id, c.userid, c.music_id, u.username, c.comment_text, c.created_at \
             FROM comments c LEFT JOIN users u ON u.userid = c.userid \
             WHERE c.music_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(music_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn add_comment(&self, comment: NewComment) -> AppResult<CommentRecord> {
        let record = sqlx::query_as::<_, CommentRecord>(
            "WITH inserted AS ( \
                 INSERT INTO comments (userid, music_id, comment_text) VALUES ($1, $2, $3) \
                 RETURNING id, userid, music_id, comment_text, created_at \
             ) \
             SELECT i.id, i.userid, i.music_id, u.username, i.comment_text, i.created_at \
             FROM inserted i LEFT JOIN users u ON u.userid = i.userid",
        )
        .bind(&comment.userid)
        .bind(comment.music_id)
        .bind(&comment.comment_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert_rating(
        &self,
        userid: &str,
        music_id: i32,
        rating_value: i32,
    ) -> AppResult<RatingSummary> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO ratings (userid, music_id, rating_value) VALUES ($1, $2, $3) \
             ON CONFLICT (userid, music_id) DO UPDATE SET rating_value = EXCLUDED.rating_value",
        )
        .bind(userid)
        .bind(music_id)
        .bind(rating_value)
        .execute(&mut *tx)
        .await?;

        let summary = sqlx::query_as::<_, RatingSummary>(
            "SELECT COALESCE(AVG(rating_value)::float8, 0) AS average, COUNT(*) AS count \
             FROM ratings WHERE music_id = $1",
        )
        .bind(music_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(summary)
    }

    async fn rating_summary(&self, music_id: i32) -> AppResult<RatingSummary> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            "SELECT COALESCE(AVG(rating_value)::float8, 0) AS average, COUNT(*) AS count \
             FROM ratings WHERE music_id = $1",
        )
        .bind(music_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn all_ratings(&self) -> AppResult<Vec<RatingEntry>> {
        let ratings = sqlx::query_as::<_, RatingEntry>(
            "SELECT userid, music_id, rating_value FROM ratings",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    async fn record_play(&self, userid: &str, music_id: i32) -> AppResult<Option<i32>> {
        let mut tx = self.pool.begin().await?;

        let play_count: Option<i32> = sqlx::query_scalar(
            "UPDATE music SET play_count = play_count + 1 WHERE id = $1 RETURNING play_count",
        )
        .bind(music_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(play_count) = play_count else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("INSERT INTO user_play_history (userid, music_id, played_at) VALUES ($1, $2, $3)")
            .bind(userid)
            .bind(music_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(play_count))
    }

    async fn recent_plays(&self, userid: &str, limit: i64) -> AppResult<Vec<PlayRecord>> {
        let plays = sqlx::query_as::<_, PlayRecord>(
            "SELECT h.music_id, m.title, m.artist_name, h.played_at \
             FROM user_play_history h JOIN music m ON m.id = h.music_id \
             WHERE h.userid = $1 \
             ORDER BY h.played_at DESC, h.id DESC \
             LIMIT $2",
        )
        .bind(userid)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(plays)
    }

    async fn play_counts(&self) -> AppResult<Vec<PlayCount>> {
        let counts = sqlx::query_as::<_, PlayCount>(
            "SELECT userid, music_id, COUNT(*) AS play_count \
             FROM user_play_history GROUP BY userid, music_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn top_genres(
        &self,
        userid: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<GenreCount>> {
        let genres = sqlx::query_as::<_, GenreCount>(
            "SELECT m.genre, COUNT(h.id) AS count \
             FROM user_play_history h JOIN music m ON m.id = h.music_id \
             WHERE h.userid = $1 AND h.played_at >= $2 \
             GROUP BY m.genre \
             ORDER BY count DESC, m.genre \
             LIMIT $3",
        )
        .bind(userid)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn top_artists(
        &self,
        userid: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ArtistCount>> {
        let artists = sqlx::query_as::<_, ArtistCount>(
            "SELECT m.artist_name AS artist, COUNT(h.id) AS count \
             FROM user_play_history h JOIN music m ON m.id = h.music_id \
             WHERE h.userid = $1 AND h.played_at >= $2 \
             GROUP BY m.artist_name \
             ORDER BY count DESC, m.artist_name \
             LIMIT $3",
        )
        .bind(userid)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(artists)
    }

    async fn total_plays(&self, userid: &str, since: DateTime<Utc>) -> AppResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_play_history WHERE userid = $1 AND played_at >= $2",
        )
        .bind(userid)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn artist_rankings(&self, limit: i64) -> AppResult<Vec<ArtistCount>> {
        let artists = sqlx::query_as::<_, ArtistCount>(
            "SELECT m.artist_name AS artist, COUNT(h.id) AS count \
             FROM music m JOIN user_play_history h ON h.music_id = m.id \
             GROUP BY m.artist_name \
             ORDER BY count DESC, m.artist_name \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(artists)
    }

    async fn hot_songs(&self, limit: i64) -> AppResult<Vec<HotSong>> {
        let songs = sqlx::query_as::<_, HotSong>(
            "SELECT m.id, m.title, m.artist_name AS artist, m.genre, COUNT(h.id) AS popularity \
             FROM music m JOIN user_play_history h ON h.music_id = m.id \
             GROUP BY m.id, m.title, m.artist_name, m.genre \
             ORDER BY popularity DESC, m.id \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(songs)
    }

    async fn popular_song_ids(&self, exclude: &[i32], limit: i64) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT m.id FROM music m \
             LEFT JOIN user_play_history h ON h.music_id = m.id \
             WHERE NOT (m.id = ANY($1)) \
             GROUP BY m.id \
             ORDER BY COUNT(h.id) DESC, m.id \
             LIMIT $2",
        )
        .bind(exclude)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn playlists_for_user(&self, userid: &str) -> AppResult<Vec<Playlist>> {
        let playlists = sqlx::query_as::<_, Playlist>(
            "SELECT id, userid, title, description, created_at FROM playlists \
             WHERE userid = $1 ORDER BY created_at, id",
        )
        .bind(userid)
        .fetch_all(&self.pool)
        .await?;
        Ok(playlists)
    }

    async fn create_playlist(&self, playlist: NewPlaylist) -> AppResult<Playlist> {
        let playlist = sqlx::query_as::<_, Playlist>(
            "INSERT INTO playlists (userid, title, description, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, userid, title, description, created_at",
        )
        .bind(&playlist.userid)
        .bind(&playlist.title)
        .bind(&playlist.description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(playlist)
    }

    async fn get_playlist(&self, id: i32) -> AppResult<Option<Playlist>> {
        let playlist = sqlx::query_as::<_, Playlist>(
            "SELECT id, userid, title, description, created_at FROM playlists WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(playlist)
    }

    async fn delete_playlist(&self, id: i32) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM playlists WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn playlist_songs(&self, playlist_id: i32) -> AppResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            "SELECT m.id, m.title, m.artist_name, m.genre, m.play_count, m.cover_url \
             FROM music m JOIN playlist_songs ps ON ps.music_id = m.id \
             WHERE ps.playlist_id = $1 ORDER BY m.id",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(songs)
    }

    async fn add_playlist_song(&self, playlist_id: i32, music_id: i32) -> AppResult<bool> {
        let inserted = sqlx::query(
            "INSERT INTO playlist_songs (playlist_id, music_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(playlist_id)
        .bind(music_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }

    async fn remove_playlist_song(&self, playlist_id: i32, music_id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = $1 AND music_id = $2")
            .bind(playlist_id)
            .bind(music_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_preferences(&self, userid: &str) -> AppResult<Option<UserPreferences>> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            "SELECT userid, favorite_genres, favorite_artists, listening_times \
             FROM user_preferences WHERE userid = $1",
        )
        .bind(userid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserPreferenceRecord::from(r).preferences))
    }

    async fn save_preferences(
        &self,
        userid: &str,
        preferences: UserPreferences,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_preferences (userid, favorite_genres, favorite_artists, listening_times) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (userid) DO UPDATE SET \
                 favorite_genres = EXCLUDED.favorite_genres, \
                 favorite_artists = EXCLUDED.favorite_artists, \
                 listening_times = EXCLUDED.listening_times",
        )
        .bind(userid)
        .bind(&preferences.favorite_genres)
        .bind(&preferences.favorite_artists)
        .bind(&preferences.listening_times)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all_preferences(&self) -> AppResult<Vec<UserPreferenceRecord>> {
        let rows = sqlx::query_as::<_, PreferenceRow>(
            "SELECT userid, favorite_genres, favorite_artists, listening_times \
             FROM user_preferences",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserPreferenceRecord::from).collect())
    }
}
