//! Bulk-loads a directory of `Artist-Title.ext` audio files into the catalog.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use encore_api::{
    config::Config,
    db::{create_pool, PgStore},
    services::library_import::{import_tracks, scan_directory},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "encore-import")]
#[clap(about = "Import audio files named Artist-Title.ext into the song catalog")]
struct Args {
    /// Directory scanned recursively for audio files
    #[clap(long, value_name = "DIR")]
    dir: PathBuf,

    /// Copy each file here with spaces removed from its name
    #[clap(long, value_name = "DIR")]
    copy_to: Option<PathBuf>,

    /// List what would be imported without touching the database
    #[clap(long)]
    dry_run: bool,

    /// Overrides DATABASE_URL
    #[clap(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("encore_api=info,encore_import=info")),
        )
        .init();

    let args = Args::parse();
    if !args.dir.is_dir() {
        anyhow::bail!("{} is not a directory", args.dir.display());
    }

    let report = scan_directory(&args.dir);
    for skipped in &report.skipped {
        tracing::warn!(path = %skipped.display(), "Skipping file without Artist-Title name");
    }
    tracing::info!(
        found = report.tracks.len(),
        skipped = report.skipped.len(),
        "Scan finished"
    );

    if args.dry_run {
        for track in &report.tracks {
            println!("{}\t{}\t{}", track.artist, track.title, track.path.display());
        }
        return Ok(());
    }

    let config = Config::from_env()?;
    let database_url = args.database_url.unwrap_or(config.database_url);
    let pool = create_pool(&database_url, config.db_max_connections)
        .await
        .context("Failed to connect to the database")?;
    let store = PgStore::new(pool);

    let summary = import_tracks(&store, &report.tracks, args.copy_to.as_deref()).await?;
    tracing::info!(
        imported = summary.imported,
        copied = summary.copied,
        skipped = report.skipped.len(),
        "Import finished"
    );

    Ok(())
}
