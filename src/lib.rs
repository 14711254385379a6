//! Encore music service: catalog, listening history, playlists and
//! collaborative-filtering recommendations over a JSON HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use config::{Config, StorageKind};
pub use error::{AppError, AppResult};
pub use routes::{create_router, AppState};
