//! Similarity-driven playlist sequencing.
//!
//! Shufflr orders a set of tracks so that every track is followed by one that
//! sounds alike. Pairwise track distances combine audio features, key
//! compatibility, genre proximity and an artist-repetition penalty; the ordering is
//! the shortest open path through those distances, found by a guided local search
//! that stops early once it stops paying off.
//!
//! Core modules:
//! - [`genre`] - Genre embedding table and memoized genre distances
//! - [`artist`] - Artists and the closest-genre artist distance
//! - [`key`] - Musical keys and circle-of-fifths compatibility
//! - [`track`] - Tracks, feature axes and the weighted track distance
//! - [`matrix`] - Pairwise distance matrix and the depot-augmented cost matrix
//! - [`optimizer`] - Tour optimizer interface and guided local search
//! - [`monitor`] - Early-stop controller for the search
//! - [`shuffle`] - End-to-end sequencing
//!
//! ### Supporting Modules
//!
//! - [`catalog`] - Local SQLite catalog and snapshot import
//! - [`config`] - Configuration, weights and data directory management
//! - [`error`] - Error type of the core
//! - [`report`] - Table and JSON rendering of results
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use shufflr::catalog::Catalog;
//! use shufflr::config::{self, ShuffleConfig};
//! use shufflr::genre::{GenreDistanceComputer, GenreTable};
//! use shufflr::shuffle::{optimizer_for, shuffle_tracks};
//!
//! let catalog = Catalog::open(&config::get_db_path()?)?;
//! let genres = GenreDistanceComputer::new(GenreTable::load(&config::get_genres_path()?)?);
//! let artists = catalog.artists()?;
//! let config = ShuffleConfig::default();
//!
//! let mut optimizer = optimizer_for(&config.search);
//! let playlist = shuffle_tracks(catalog.tracks()?, &artists, &genres, &config, &mut optimizer)?;
//! for (track, distance) in playlist.tracks.iter().skip(1).zip(&playlist.distances) {
//!     println!("{:.3}  {}", distance, track.name());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! The core (distances, matrix, search) returns [`error::ShuffleError`]; catalog,
//! file and CLI code uses `anyhow::Result` with context messages.

pub mod artist;
pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod genre;
pub mod key;
pub mod matrix;
pub mod monitor;
pub mod optimizer;
pub mod report;
pub mod shuffle;
pub mod track;
