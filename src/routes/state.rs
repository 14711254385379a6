use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    db::{MemoryStore, Store},
    models::format_timestamp,
    services::{MediaLibrary, RecommenderSettings},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub media: MediaLibrary,
    pub recommender: RecommenderSettings,
    pub display_offset_hours: i32,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            media: MediaLibrary::new(config.static_dir.clone()),
            recommender: RecommenderSettings {
                neighbours: config.recommendation_neighbours,
                limit: config.recommendation_limit,
            },
            display_offset_hours: config.display_utc_offset_hours,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// State over a fresh in-memory store
    pub fn in_memory(config: &Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// Renders a timestamp for clients
    pub fn timestamp(&self, ts: DateTime<Utc>) -> String {
        format_timestamp(ts, self.display_offset_hours)
    }
}
