use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// URL prefix under which the static directory is served
pub const STATIC_URL_PREFIX: &str = "/static";

const COVER_DIR: &str = "music_img";
const TEMP_DIR: &str = "temp";
const AUDIO_DIR: &str = "music";

/// A file written into the static tree
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    pub filename: String,
    /// Public URL of the file
    pub url: String,
}

/// Where uploaded covers and audio live inside the static directory
///
/// Covers are first written to `music_img/temp/` and only moved to
/// `music_img/` once a song is saved with that cover.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

/// Strips anything that could escape the target directory from a name part
fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned.replace("..", "").trim().trim_start_matches('.').to_string()
}

/// Builds `<artist>-<title>.<ext>` from user-supplied parts
pub fn upload_file_name(artist: &str, title: &str, extension: &str) -> AppResult<String> {
    let artist = sanitize_component(artist);
    let title = sanitize_component(title);

    if artist.is_empty() || title.is_empty() {
        return Err(AppError::InvalidInput(
            "Artist name and title are required".to_string(),
        ));
    }

    Ok(format!("{}-{}.{}", artist, title, extension))
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn temp_cover_dir(&self) -> PathBuf {
        self.root.join(COVER_DIR).join(TEMP_DIR)
    }

    fn cover_dir(&self) -> PathBuf {
        self.root.join(COVER_DIR)
    }

    /// Directory holding uploaded audio files
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(AUDIO_DIR)
    }

    async fn write(dir: PathBuf, filename: &str, bytes: &[u8]) -> AppResult<()> {
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(filename), bytes).await?;
        Ok(())
    }

    /// Stores a cover image in the temporary area
    pub async fn save_cover(&self, artist: &str, title: &str, bytes: &[u8]) -> AppResult<StoredUpload> {
        let filename = upload_file_name(artist, title, "jpg")?;
        Self::write(self.temp_cover_dir(), &filename, bytes).await?;

        tracing::info!(filename = %filename, size = bytes.len(), "Cover uploaded to temp area");

        Ok(StoredUpload {
            url: format!("{}/{}/{}/{}", STATIC_URL_PREFIX, COVER_DIR, TEMP_DIR, filename),
            filename,
        })
    }

    /// Stores an audio file
    pub async fn save_audio(&self, artist: &str, title: &str, bytes: &[u8]) -> AppResult<StoredUpload> {
        let filename = upload_file_name(artist, title, "mp3")?;
        Self::write(self.audio_dir(), &filename, bytes).await?;

        tracing::info!(filename = %filename, size = bytes.len(), "Audio file uploaded");

        Ok(StoredUpload {
            url: format!("{}/{}/{}", STATIC_URL_PREFIX, AUDIO_DIR, filename),
            filename,
        })
    }

    /// Moves a temporary cover into the permanent cover directory
    ///
    /// Returns the permanent URL, or `None` when `cover_url` does not point at
    /// the temp area or the temp file is gone.
    pub async fn promote_cover(&self, cover_url: &str) -> AppResult<Option<String>> {
        let temp_prefix = format!("{}/{}/{}/", STATIC_URL_PREFIX, COVER_DIR, TEMP_DIR);
        let Some(filename) = cover_url.strip_prefix(&temp_prefix) else {
            return Ok(None);
        };

        if filename.is_empty() || sanitize_component(filename) != filename {
            return Err(AppError::InvalidInput(format!(
                "Invalid cover file name: {}",
                filename
            )));
        }

        let source = self.temp_cover_dir().join(filename);
        if !tokio::fs::try_exists(&source).await? {
            tracing::warn!(path = %source.display(), "Temp cover not found, keeping previous cover");
            return Ok(None);
        }

        let target_dir = self.cover_dir();
        tokio::fs::create_dir_all(&target_dir).await?;
        tokio::fs::rename(&source, target_dir.join(filename)).await?;

        let url = format!("{}/{}/{}", STATIC_URL_PREFIX, COVER_DIR, filename);
        tracing::info!(url = %url, "Cover promoted from temp area");
        Ok(Some(url))
    }
}
