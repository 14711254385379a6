use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{db::Store, error::AppResult, models::NewSong};

/// Audio extensions picked up by a scan
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wav"];

/// An audio file whose name follows `Artist-Title.ext`
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFile {
    pub path: PathBuf,
    pub artist: String,
    pub title: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub tracks: Vec<TrackFile>,
    /// Audio files whose names could not be split into artist and title
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub imported: usize,
    pub copied: usize,
}

/// Splits a file stem on its first `-` into (artist, title)
pub fn parse_track_name(stem: &str) -> Option<(String, String)> {
    let (artist, title) = stem.split_once('-')?;
    let (artist, title) = (artist.trim(), title.trim());
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist.to_string(), title.to_string()))
}

/// File name with every space removed, as served from the audio directory
pub fn compact_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.replace(' ', ""))
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively collects importable audio files under `dir`
pub fn scan_directory(dir: &Path) -> ScanReport {
    let mut report = ScanReport::default();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() || !is_supported(entry.path()) {
            continue;
        }

        let parsed = entry
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_track_name);

        match parsed {
            Some((artist, title)) => report.tracks.push(TrackFile {
                path: entry.path().to_path_buf(),
                artist,
                title,
            }),
            None => report.skipped.push(entry.path().to_path_buf()),
        }
    }

    report
}

/// Inserts one song per track, optionally copying the files into `copy_to`
pub async fn import_tracks(
    store: &dyn Store,
    tracks: &[TrackFile],
    copy_to: Option<&Path>,
) -> AppResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    if let Some(dir) = copy_to {
        tokio::fs::create_dir_all(dir).await?;
    }

    for track in tracks {
        if let (Some(dir), Some(name)) = (copy_to, compact_file_name(&track.path)) {
            tokio::fs::copy(&track.path, dir.join(&name)).await?;
            summary.copied += 1;
        }

        let song = store
            .create_song(NewSong::new(&track.title, &track.artist, None, None))
            .await?;
        tracing::debug!(song_id = song.id, path = %track.path.display(), "Imported track");
        summary.imported += 1;
    }

    Ok(summary)
}
