pub mod auth;
pub mod library_import;
pub mod recommendations;
pub mod uploads;

pub use recommendations::{Recommender, RecommenderSettings};
pub use uploads::MediaLibrary;
