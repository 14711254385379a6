use chrono::{DateTime, Utc};
use serde::Serialize;

use super::format_timestamp;

/// Shown in place of the author when the commenting account no longer exists
pub const UNKNOWN_AUTHOR: &str = "Unknown user";

/// Lowest and highest accepted rating values
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// A comment joined with its author's current display name
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CommentRecord {
    pub id: i32,
    pub userid: String,
    pub music_id: i32,
    pub username: Option<String>,
    pub comment_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub userid: String,
    pub music_id: i32,
    pub comment_text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommentView {
    pub id: i32,
    pub username: String,
    pub comment_text: String,
    pub created_at: String,
}

impl CommentView {
    pub fn new(comment: &CommentRecord, offset_hours: i32) -> Self {
        Self {
            id: comment.id,
            username: comment
                .username
                .clone()
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            comment_text: comment.comment_text.clone(),
            created_at: format_timestamp(comment.created_at, offset_hours),
        }
    }
}

/// Aggregate of all ratings a song received
#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
pub struct RatingSummary {
    /// Mean rating, 0 when unrated
    pub average: f64,
    pub count: i64,
}

impl RatingSummary {
    /// Computes the summary of a set of rating values
    pub fn from_values<I: IntoIterator<Item = i32>>(values: I) -> Self {
        let (sum, count) = values
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), v| (sum + v as i64, count + 1));

        if count == 0 {
            Self::default()
        } else {
            Self {
                average: sum as f64 / count as f64,
                count,
            }
        }
    }
}

/// One user's rating of one song
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RatingEntry {
    pub userid: String,
    pub music_id: i32,
    pub rating_value: i32,
}
