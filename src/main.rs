//! # Shufflr
//!
//! Offline playlist sequencer: imports a catalog snapshot into a local SQLite
//! database and orders tracks so that consecutive songs sound alike.
//!
//! ## Usage
//!
//! ```bash
//! # Import a catalog snapshot
//! shufflr import library.json
//!
//! # List tracks
//! shufflr list
//!
//! # Sequence the whole catalog, 20 seconds at most
//! shufflr shuffle --timeout 20
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{info, LevelFilter};
use shufflr::catalog::{Catalog, CatalogSnapshot};
use shufflr::cli::{self, ShuffleArgs};
use shufflr::completion;
use shufflr::config::{self, ShuffleConfig};
use shufflr::genre::{GenreDistanceComputer, GenreTable};
use shufflr::report::PlaylistReport;
use shufflr::shuffle::{optimizer_for, shuffle_tracks};
use std::path::{Path, PathBuf};

/// Main entry point for the Shufflr application.
///
/// Parses command-line arguments, initializes logging and routes commands to
/// the library. Logging defaults to INFO; `-q`, `-v` and `-vv` adjust it and
/// `RUST_LOG` overrides per module:
/// - `RUST_LOG=debug shufflr shuffle` - Enable debug logging
/// - `RUST_LOG=shufflr::monitor=debug shufflr shuffle` - Follow the search
fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose, args.quiet);

    match args.command {
        cli::Command::Import { snapshot } => {
            let snapshot_path = config::absolutize(&snapshot)?;
            info!("Importing catalog snapshot {}", snapshot_path.display());
            let snapshot = CatalogSnapshot::load(&snapshot_path)?;
            let mut catalog = open_catalog(args.catalog.as_deref())?;
            let summary = catalog.import(snapshot)?;
            println!(
                "Imported {} artists and {} tracks ({} skipped)",
                summary.artists, summary.tracks, summary.skipped_tracks
            );
        }
        cli::Command::List => {
            let catalog = open_catalog(args.catalog.as_deref())?;
            list_tracks(&catalog)?;
        }
        cli::Command::Shuffle(shuffle) => {
            let catalog = open_catalog(args.catalog.as_deref())?;
            run_shuffle(&catalog, &shuffle)?;
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn resolve_path(explicit: Option<&Path>, default: fn() -> Result<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => config::absolutize(path),
        None => default(),
    }
}

fn open_catalog(path: Option<&Path>) -> Result<Catalog> {
    let path = resolve_path(path, config::get_db_path)?;
    Catalog::open(&path)
}

fn list_tracks(catalog: &Catalog) -> Result<()> {
    let artists = catalog.artists()?;
    let tracks = catalog.tracks()?;

    if tracks.is_empty() {
        println!("The catalog is empty. Import a snapshot with `shufflr import <FILE>`.");
        return Ok(());
    }

    println!("{:<24}  {:<32}  {:<32}  {:>3}  {:>3}", "ID", "ARTIST", "TITLE", "KEY", "TMP");
    for track in &tracks {
        let names: Vec<&str> = artists
            .resolve(track.artist_ids())
            .into_iter()
            .map(|artist| artist.name.as_str())
            .collect();
        let key = track.key().map_or_else(|| "-".to_string(), |key| key.to_string());
        println!(
            "{:<24}  {:<32}  {:<32}  {:>3}  {:>3.0}",
            track.id(),
            names.join(", ").chars().take(32).collect::<String>(),
            track.name().chars().take(32).collect::<String>(),
            key,
            track.features().tempo
        );
    }
    println!("\n{} tracks, {} artists", tracks.len(), artists.len());
    Ok(())
}

fn run_shuffle(catalog: &Catalog, args: &ShuffleArgs) -> Result<()> {
    let config_path = resolve_path(args.config.as_deref(), config::get_config_path)?;
    let mut config = ShuffleConfig::load(&config_path)?;
    args.apply(&mut config).context("Invalid command-line override")?;

    let genres_path = resolve_path(args.genres.as_deref(), config::get_genres_path)?;
    let genres = GenreDistanceComputer::new(GenreTable::load(&genres_path)?);

    let artists = catalog.artists()?;
    let tracks = if args.track_ids.is_empty() {
        catalog.tracks()?
    } else {
        catalog.tracks_by_ids(&args.track_ids)?
    };
    info!("Sequencing {} tracks", tracks.len());

    let mut optimizer = optimizer_for(&config.search);
    let playlist = shuffle_tracks(tracks, &artists, &genres, &config, &mut optimizer)
        .context("Failed to sequence tracks")?;

    let report = PlaylistReport::new(&playlist, &artists);
    if args.json {
        println!("{}", report.to_json().context("Failed to serialize result")?);
    } else {
        println!("{}", report.to_table());
    }
    Ok(())
}
