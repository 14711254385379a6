use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    db::Store,
    error::AppResult,
    models::{PlayCount, RatingEntry, Song, UserPreferenceRecord, UserPreferences},
};

/// Highest implicit score a play count can reach
const MAX_IMPLICIT_SCORE: i64 = 5;

const RATING_WEIGHT: f64 = 0.6;
const PREFERENCE_WEIGHT: f64 = 0.4;
const GENRE_WEIGHT: f64 = 0.4;
const ARTIST_WEIGHT: f64 = 0.4;
const TIME_WEIGHT: f64 = 0.2;

/// Tuning knobs for a recommendation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommenderSettings {
    /// Similar users consulted
    pub neighbours: usize,
    /// Songs returned
    pub limit: usize,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            neighbours: 5,
            limit: 15,
        }
    }
}

/// Everything the engine reads, pulled fresh for each request
#[derive(Debug, Clone, Default)]
pub struct ListeningData {
    pub ratings: Vec<RatingEntry>,
    pub play_counts: Vec<PlayCount>,
    pub preferences: Vec<UserPreferenceRecord>,
}

/// User-based collaborative filter over explicit ratings and implicit plays
///
/// Each user's score for a song is their rating when one exists, otherwise
/// their play count capped at 5. Users are compared with a blend of cosine
/// similarity over co-scored songs and Jaccard overlap of declared
/// preferences.
pub struct Recommender {
    scores: BTreeMap<String, BTreeMap<i32, f64>>,
    preferences: HashMap<String, UserPreferences>,
    settings: RecommenderSettings,
}

/// Jaccard index of two sets; empty sets compare as 0
fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count().max(1);
    a.intersection(b).count() as f64 / union as f64
}

/// Cosine similarity of two equally long vectors; 0 if either has zero norm
fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Orders by score descending, then by key ascending
fn by_score_desc<K: Ord>(a: &(K, f64), b: &(K, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

impl Recommender {
    pub fn new(data: ListeningData, settings: RecommenderSettings) -> Self {
        let mut scores: BTreeMap<String, BTreeMap<i32, f64>> = BTreeMap::new();

        for rating in data.ratings {
            scores
                .entry(rating.userid)
                .or_default()
                .insert(rating.music_id, rating.rating_value as f64);
        }

        for play in data.play_counts {
            let implicit = play.play_count.min(MAX_IMPLICIT_SCORE) as f64;
            scores
                .entry(play.userid)
                .or_default()
                .entry(play.music_id)
                .or_insert(implicit);
        }

        let preferences = data
            .preferences
            .into_iter()
            .map(|record| (record.userid, record.preferences))
            .collect();

        Self {
            scores,
            preferences,
            settings,
        }
    }

    fn rating_similarity(&self, a: &str, b: &str) -> f64 {
        let (Some(songs_a), Some(songs_b)) = (self.scores.get(a), self.scores.get(b)) else {
            return 0.0;
        };

        let (vec_a, vec_b): (Vec<f64>, Vec<f64>) = songs_a
            .iter()
            .filter_map(|(song, score)| songs_b.get(song).map(|other| (*score, *other)))
            .unzip();

        if vec_a.is_empty() {
            return 0.0;
        }
        cosine(&vec_a, &vec_b)
    }

    fn preference_similarity(&self, a: &str, b: &str) -> f64 {
        let (Some(prefs_a), Some(prefs_b)) = (self.preferences.get(a), self.preferences.get(b))
        else {
            return 0.0;
        };

        GENRE_WEIGHT * jaccard(&prefs_a.genre_set(), &prefs_b.genre_set())
            + ARTIST_WEIGHT * jaccard(&prefs_a.artist_set(), &prefs_b.artist_set())
            + TIME_WEIGHT * jaccard(&prefs_a.time_set(), &prefs_b.time_set())
    }

    /// Hybrid similarity of two users
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        RATING_WEIGHT * self.rating_similarity(a, b)
            + PREFERENCE_WEIGHT * self.preference_similarity(a, b)
    }

    /// The most similar users who have scored anything, best first
    pub fn neighbours(&self, userid: &str) -> Vec<(&str, f64)> {
        let mut similarities: Vec<(&str, f64)> = self
            .scores
            .keys()
            .filter(|other| other.as_str() != userid)
            .map(|other| (other.as_str(), self.similarity(userid, other)))
            .collect();

        similarities.sort_by(by_score_desc);
        similarities.truncate(self.settings.neighbours);
        similarities
    }

    /// Songs the user has not scored, ranked by similarity-weighted neighbour scores
    pub fn collaborative(&self, userid: &str) -> Vec<i32> {
        let known = self.scores.get(userid);
        let mut candidates: HashMap<i32, f64> = HashMap::new();

        for (neighbour, similarity) in self.neighbours(userid) {
            let Some(songs) = self.scores.get(neighbour) else {
                continue;
            };
            for (song, score) in songs {
                if known.is_some_and(|k| k.contains_key(song)) {
                    continue;
                }
                *candidates.entry(*song).or_insert(0.0) += score * similarity;
            }
        }

        let mut ranked: Vec<(i32, f64)> = candidates.into_iter().collect();
        ranked.sort_by(by_score_desc);
        ranked.into_iter().map(|(song, _)| song).collect()
    }
}

/// Recommends up to `settings.limit` songs, topping up with popular songs
pub async fn recommend_for_user(
    store: &dyn Store,
    userid: &str,
    settings: RecommenderSettings,
) -> AppResult<Vec<Song>> {
    let data = ListeningData {
        ratings: store.all_ratings().await?,
        play_counts: store.play_counts().await?,
        preferences: store.all_preferences().await?,
    };

    tracing::debug!(
        user_id = %userid,
        ratings = data.ratings.len(),
        play_counts = data.play_counts.len(),
        preferences = data.preferences.len(),
        "Loaded listening data"
    );

    let recommender = Recommender::new(data, settings);
    let mut ranked = recommender.collaborative(userid);
    ranked.truncate(settings.limit);

    let mut songs = ordered_songs(store, &ranked).await?;
    let collaborative_count = songs.len();

    if songs.len() < settings.limit {
        let exclude: Vec<i32> = songs.iter().map(|s| s.id).collect();
        let missing = (settings.limit - songs.len()) as i64;
        let popular = store.popular_song_ids(&exclude, missing).await?;
        songs.extend(ordered_songs(store, &popular).await?);
        songs.truncate(settings.limit);
    }

    tracing::info!(
        user_id = %userid,
        collaborative = collaborative_count,
        backfilled = songs.len() - collaborative_count,
        "Recommendations computed"
    );

    Ok(songs)
}

/// Loads songs by id, keeping the order of `ids` and dropping unknown ids
async fn ordered_songs(store: &dyn Store, ids: &[i32]) -> AppResult<Vec<Song>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut by_id: HashMap<i32, Song> = store
        .songs_by_ids(ids)
        .await?
        .into_iter()
        .map(|song| (song.id, song))
        .collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}
