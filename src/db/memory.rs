use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::Store;
use crate::{
    error::{AppError, AppResult},
    models::{
        ArtistCount, CommentRecord, GenreCount, HotSong, NewComment, NewPlaylist, NewSong,
        PlayCount, PlayRecord, Playlist, RatingEntry, RatingSummary, Song, SongUpdate, User,
        UserPreferenceRecord, UserPreferences,
    },
};

struct StoredComment {
    id: i32,
    userid: String,
    music_id: i32,
    comment_text: String,
    created_at: DateTime<Utc>,
}

struct PlayEvent {
    id: i32,
    userid: String,
    music_id: i32,
    played_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    songs: BTreeMap<i32, Song>,
    playlists: BTreeMap<i32, Playlist>,
    playlist_songs: BTreeSet<(i32, i32)>,
    comments: Vec<StoredComment>,
    /// (userid, music_id) -> rating value
    ratings: BTreeMap<(String, i32), i32>,
    plays: Vec<PlayEvent>,
    preferences: BTreeMap<String, UserPreferences>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn username(&self, userid: &str) -> Option<String> {
        self.users.get(userid).map(|u| u.username.clone())
    }

    fn comment_record(&self, comment: &StoredComment) -> CommentRecord {
        CommentRecord {
            id: comment.id,
            userid: comment.userid.clone(),
            music_id: comment.music_id,
            username: self.username(&comment.userid),
            comment_text: comment.comment_text.clone(),
            created_at: comment.created_at,
        }
    }

    fn rating_summary(&self, music_id: i32) -> RatingSummary {
        RatingSummary::from_values(
            self.ratings
                .iter()
                .filter(|((_, id), _)| *id == music_id)
                .map(|(_, value)| *value),
        )
    }

    /// Play events of `userid` since `since`, joined with their songs
    fn user_plays_since<'a>(
        &'a self,
        userid: &'a str,
        since: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a Song> + 'a {
        self.plays
            .iter()
            .filter(move |p| p.userid == userid && p.played_at >= since)
            .filter_map(move |p| self.songs.get(&p.music_id))
    }

    fn plays_per_song(&self) -> HashMap<i32, i64> {
        let mut counts = HashMap::new();
        for play in &self.plays {
            *counts.entry(play.music_id).or_insert(0) += 1;
        }
        counts
    }
}

/// Sorts (key, count) pairs by count desc then key asc and keeps `limit`
fn top_counts<K: Ord>(counts: HashMap<K, i64>, limit: i64) -> Vec<(K, i64)> {
    let mut counts: Vec<(K, i64)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(limit.max(0) as usize);
    counts
}

/// `Store` kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a play event with an explicit timestamp
    pub async fn record_play_at(
        &self,
        userid: &str,
        music_id: i32,
        played_at: DateTime<Utc>,
    ) -> Option<i32> {
        let mut tables = self.inner.write().await;
        let play_count = {
            let song = tables.songs.get_mut(&music_id)?;
            song.play_count += 1;
            song.play_count
        };
        let id = tables.next_id();
        tables.plays.push(PlayEvent {
            id,
            userid: userid.to_string(),
            music_id,
            played_at,
        });
        Some(play_count)
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> AppResult<()> {
        let mut tables = self.inner.write().await;
        if tables.users.values().any(|u| u.login_id == user.login_id) {
            return Err(AppError::Conflict(
                "This login id is already in use".to_string(),
            ));
        }
        tables.users.insert(user.userid.clone(), user);
        Ok(())
    }

    async fn find_user(&self, userid: &str) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(userid).cloned())
    }

    async fn find_user_by_login(&self, login_id: &str) -> AppResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.login_id == login_id)
            .cloned())
    }

    async fn update_username(&self, userid: &str, username: &str) -> AppResult<Option<User>> {
        let mut tables = self.inner.write().await;
        Ok(tables.users.get_mut(userid).map(|user| {
            user.username = username.to_string();
            user.clone()
        }))
    }

    async fn update_password(&self, userid: &str, password_hash: &str) -> AppResult<bool> {
        let mut tables = self.inner.write().await;
        match tables.users.get_mut(userid) {
            Some(user) => {
                user.password = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_songs(&self) -> AppResult<Vec<Song>> {
        Ok(self.inner.read().await.songs.values().cloned().collect())
    }

    async fn get_song(&self, id: i32) -> AppResult<Option<Song>> {
        Ok(self.inner.read().await.songs.get(&id).cloned())
    }

    async fn songs_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Song>> {
        let tables = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.songs.get(id).cloned())
            .collect())
    }

    async fn create_song(&self, song: NewSong) -> AppResult<Song> {
        let mut tables = self.inner.write().await;
        let id = tables.next_id();
        let song = Song {
            id,
            title: song.title,
            artist_name: song.artist_name,
            genre: song.genre,
            play_count: 0,
            cover_url: song.cover_url,
        };
        tables.songs.insert(id, song.clone());
        Ok(song)
    }

    async fn update_song(&self, id: i32, update: SongUpdate) -> AppResult<Option<Song>> {
        let mut tables = self.inner.write().await;
        Ok(tables.songs.get_mut(&id).map(|song| {
            update.apply(song);
            song.clone()
        }))
    }

    async fn search_songs(&self, query: &str) -> AppResult<Vec<Song>> {
        let needle = query.to_lowercase();
        let tables = self.inner.read().await;
        Ok(tables
            .songs
            .values()
            .filter(|s| {
                s.title.to_lowercase().contains(&needle)
                    || s.artist_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn list_comments(&self, music_id: i32) -> AppResult<Vec<CommentRecord>> {
        let tables = self.inner.read().await;
        let mut comments: Vec<CommentRecord> = tables
            .comments
            .iter()
            .filter(|c| c.music_id == music_id)
            .map(|c| tables.comment_record(c))
            .collect();
        comments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(comments)
    }

    async fn add_comment(&self, comment: NewComment) -> AppResult<CommentRecord> {
        let mut tables = self.inner.write().await;
        let stored = StoredComment {
            id: tables.next_id(),
            userid: comment.userid,
            music_id: comment.music_id,
            comment_text: comment.comment_text,
            created_at: Utc::now(),
        };
        let record = tables.comment_record(&stored);
        tables.comments.push(stored);
        Ok(record)
    }

    async fn upsert_rating(
        &self,
        userid: &str,
        music_id: i32,
        rating_value: i32,
    ) -> AppResult<RatingSummary> {
        let mut tables = self.inner.write().await;
        tables
            .ratings
            .insert((userid.to_string(), music_id), rating_value);
        Ok(tables.rating_summary(music_id))
    }

    async fn rating_summary(&self, music_id: i32) -> AppResult<RatingSummary> {
        Ok(self.inner.read().await.rating_summary(music_id))
    }

    async fn all_ratings(&self) -> AppResult<Vec<RatingEntry>> {
        let tables = self.inner.read().await;
        Ok(tables
            .ratings
            .iter()
            .map(|((userid, music_id), value)| RatingEntry {
                userid: userid.clone(),
                music_id: *music_id,
                rating_value: *value,
            })
            .collect())
    }

    async fn record_play(&self, userid: &str, music_id: i32) -> AppResult<Option<i32>> {
        Ok(self.record_play_at(userid, music_id, Utc::now()).await)
    }

    async fn recent_plays(&self, userid: &str, limit: i64) -> AppResult<Vec<PlayRecord>> {
        let tables = self.inner.read().await;
        let mut plays: Vec<&PlayEvent> = tables.plays.iter().filter(|p| p.userid == userid).collect();
        plays.sort_by(|a, b| b.played_at.cmp(&a.played_at).then_with(|| b.id.cmp(&a.id)));

        Ok(plays
            .into_iter()
            .filter_map(|p| {
                tables.songs.get(&p.music_id).map(|song| PlayRecord {
                    music_id: song.id,
                    title: song.title.clone(),
                    artist_name: song.artist_name.clone(),
                    played_at: p.played_at,
                })
            })
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn play_counts(&self) -> AppResult<Vec<PlayCount>> {
        let tables = self.inner.read().await;
        let mut counts: BTreeMap<(String, i32), i64> = BTreeMap::new();
        for play in &tables.plays {
            *counts
                .entry((play.userid.clone(), play.music_id))
                .or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((userid, music_id), play_count)| PlayCount {
                userid,
                music_id,
                play_count,
            })
            .collect())
    }

    async fn top_genres(
        &self,
        userid: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<GenreCount>> {
        let tables = self.inner.read().await;
        // Keyed with a missing-genre flag so untagged plays sort after named genres
        let mut counts: HashMap<(bool, Option<String>), i64> = HashMap::new();
        for song in tables.user_plays_since(userid, since) {
            *counts
                .entry((song.genre.is_none(), song.genre.clone()))
                .or_insert(0) += 1;
        }
        Ok(top_counts(counts, limit)
            .into_iter()
            .map(|((_, genre), count)| GenreCount { genre, count })
            .collect())
    }

    async fn top_artists(
        &self,
        userid: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ArtistCount>> {
        let tables = self.inner.read().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for song in tables.user_plays_since(userid, since) {
            *counts.entry(song.artist_name.clone()).or_insert(0) += 1;
        }
        Ok(top_counts(counts, limit)
            .into_iter()
            .map(|(artist, count)| ArtistCount { artist, count })
            .collect())
    }

    async fn total_plays(&self, userid: &str, since: DateTime<Utc>) -> AppResult<i64> {
        let tables = self.inner.read().await;
        Ok(tables
            .plays
            .iter()
            .filter(|p| p.userid == userid && p.played_at >= since)
            .count() as i64)
    }

    async fn artist_rankings(&self, limit: i64) -> AppResult<Vec<ArtistCount>> {
        let tables = self.inner.read().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for (music_id, plays) in tables.plays_per_song() {
            if let Some(song) = tables.songs.get(&music_id) {
                *counts.entry(song.artist_name.clone()).or_insert(0) += plays;
            }
        }
        Ok(top_counts(counts, limit)
            .into_iter()
            .map(|(artist, count)| ArtistCount { artist, count })
            .collect())
    }

    async fn hot_songs(&self, limit: i64) -> AppResult<Vec<HotSong>> {
        let tables = self.inner.read().await;
        let counts: HashMap<i32, i64> = tables
            .plays_per_song()
            .into_iter()
            .filter(|(id, _)| tables.songs.contains_key(id))
            .collect();

        Ok(top_counts(counts, limit)
            .into_iter()
            .filter_map(|(id, popularity)| {
                tables.songs.get(&id).map(|song| HotSong {
                    id,
                    title: song.title.clone(),
                    artist: song.artist_name.clone(),
                    genre: song.genre.clone(),
                    popularity,
                })
            })
            .collect())
    }

    async fn popular_song_ids(&self, exclude: &[i32], limit: i64) -> AppResult<Vec<i32>> {
        let tables = self.inner.read().await;
        let plays = tables.plays_per_song();
        let counts: HashMap<i32, i64> = tables
            .songs
            .keys()
            .filter(|id| !exclude.contains(*id))
            .map(|id| (*id, plays.get(id).copied().unwrap_or(0)))
            .collect();
        Ok(top_counts(counts, limit)
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    async fn playlists_for_user(&self, userid: &str) -> AppResult<Vec<Playlist>> {
        let tables = self.inner.read().await;
        Ok(tables
            .playlists
            .values()
            .filter(|p| p.userid == userid)
            .cloned()
            .collect())
    }

    async fn create_playlist(&self, playlist: NewPlaylist) -> AppResult<Playlist> {
        let mut tables = self.inner.write().await;
        let playlist = Playlist {
            id: tables.next_id(),
            userid: playlist.userid,
            title: playlist.title,
            description: playlist.description,
            created_at: Utc::now(),
        };
        tables.playlists.insert(playlist.id, playlist.clone());
        Ok(playlist)
    }

    async fn get_playlist(&self, id: i32) -> AppResult<Option<Playlist>> {
        Ok(self.inner.read().await.playlists.get(&id).cloned())
    }

    async fn delete_playlist(&self, id: i32) -> AppResult<bool> {
        let mut tables = self.inner.write().await;
        if tables.playlists.remove(&id).is_none() {
            return Ok(false);
        }
        tables.playlist_songs.retain(|(playlist_id, _)| *playlist_id != id);
        Ok(true)
    }

    async fn playlist_songs(&self, playlist_id: i32) -> AppResult<Vec<Song>> {
        let tables = self.inner.read().await;
        Ok(tables
            .playlist_songs
            .range((playlist_id, i32::MIN)..=(playlist_id, i32::MAX))
            .filter_map(|(_, music_id)| tables.songs.get(music_id).cloned())
            .collect())
    }

    async fn add_playlist_song(&self, playlist_id: i32, music_id: i32) -> AppResult<bool> {
        let mut tables = self.inner.write().await;
        Ok(tables.playlist_songs.insert((playlist_id, music_id)))
    }

    async fn remove_playlist_song(&self, playlist_id: i32, music_id: i32) -> AppResult<()> {
        let mut tables = self.inner.write().await;
        tables.playlist_songs.remove(&(playlist_id, music_id));
        Ok(())
    }

    async fn get_preferences(&self, userid: &str) -> AppResult<Option<UserPreferences>> {
        Ok(self.inner.read().await.preferences.get(userid).cloned())
    }

    async fn save_preferences(
        &self,
        userid: &str,
        preferences: UserPreferences,
    ) -> AppResult<()> {
        let mut tables = self.inner.write().await;
        tables.preferences.insert(userid.to_string(), preferences);
        Ok(())
    }

    async fn all_preferences(&self) -> AppResult<Vec<UserPreferenceRecord>> {
        let tables = self.inner.read().await;
        Ok(tables
            .preferences
            .iter()
            .map(|(userid, preferences)| UserPreferenceRecord {
                userid: userid.clone(),
                preferences: preferences.clone(),
            })
            .collect())
    }
}
