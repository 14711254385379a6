use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A user's declared listening tastes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    pub favorite_genres: Vec<String>,
    pub favorite_artists: Vec<String>,
    /// Free-form time-of-day labels such as "morning" or "late night"
    pub listening_times: Vec<String>,
}

/// Preferences together with the account they belong to
#[derive(Debug, Clone, PartialEq)]
pub struct UserPreferenceRecord {
    pub userid: String,
    pub preferences: UserPreferences,
}

impl UserPreferences {
    /// Creates preferences with blank entries dropped and whitespace trimmed
    pub fn new(
        favorite_genres: Vec<String>,
        favorite_artists: Vec<String>,
        listening_times: Vec<String>,
    ) -> Self {
        Self {
            favorite_genres: clean(favorite_genres),
            favorite_artists: clean(favorite_artists),
            listening_times: clean(listening_times),
        }
    }

    pub fn genre_set(&self) -> HashSet<&str> {
        self.favorite_genres.iter().map(String::as_str).collect()
    }

    pub fn artist_set(&self) -> HashSet<&str> {
        self.favorite_artists.iter().map(String::as_str).collect()
    }

    pub fn time_set(&self) -> HashSet<&str> {
        self.listening_times.iter().map(String::as_str).collect()
    }
}

fn clean(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
