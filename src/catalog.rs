//! # Catalog Module
//!
//! Local SQLite catalog of tracks and artists.
//!
//! Tracks and artists enter the catalog through a JSON snapshot
//! ([`CatalogSnapshot`]). Audio features in a snapshot use a 0-100 scale and are
//! rescaled to [0, 1] on import; tempo stays in BPM and the key uses pitch-class
//! notation (`-1` = not detected, `mode` 1 = major).
//!
//! ## Schema
//!
//! ```sql
//! artists(id TEXT PRIMARY KEY, name TEXT)
//! artist_genres(artist_id TEXT, genre TEXT)
//! tracks(id TEXT PRIMARY KEY, name TEXT, <8 audio features> REAL, key_index INTEGER NULL)
//! track_artists(track_id TEXT, position INTEGER, artist_id TEXT)
//! ```
//!
//! Importing the same id twice replaces the earlier record.

use crate::artist::{Artist, ArtistIndex};
use crate::error;
use crate::key::Key;
use crate::track::{AudioFeatures, Track};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS artists (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS artist_genres (
        artist_id TEXT NOT NULL,
        genre     TEXT NOT NULL,
        PRIMARY KEY (artist_id, genre)
    );
    CREATE TABLE IF NOT EXISTS tracks (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL,
        acousticness     REAL NOT NULL,
        danceability     REAL NOT NULL,
        energy           REAL NOT NULL,
        instrumentalness REAL NOT NULL,
        liveness         REAL NOT NULL,
        speechiness      REAL NOT NULL,
        tempo            REAL NOT NULL,
        valence          REAL NOT NULL,
        key_index        INTEGER
    );
    CREATE TABLE IF NOT EXISTS track_artists (
        track_id  TEXT    NOT NULL,
        position  INTEGER NOT NULL,
        artist_id TEXT    NOT NULL,
        PRIMARY KEY (track_id, position)
    );
";

const TRACK_COLUMNS: &str = "id, name, acousticness, danceability, energy, instrumentalness, \
                             liveness, speechiness, tempo, valence, key_index";

/// Scale of the audio features in a snapshot.
const SNAPSHOT_FEATURE_SCALE: f64 = 100.0;

/// An artist as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// A track as it appears in a snapshot, features on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub id: String,
    pub name: String,
    pub artist_ids: Vec<String>,
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub speechiness: f64,
    pub tempo: f64,
    pub valence: f64,
    #[serde(default = "undetected_key")]
    pub key: i32,
    #[serde(default)]
    pub mode: i32,
}

const fn undetected_key() -> i32 {
    -1
}

impl TrackRecord {
    /// Rescales the features to [0, 1] and validates the result.
    ///
    /// # Errors
    ///
    /// Fails if the track has no artists or a feature is out of range.
    pub fn into_track(self) -> error::Result<Track> {
        let features = AudioFeatures {
            acousticness: self.acousticness / SNAPSHOT_FEATURE_SCALE,
            danceability: self.danceability / SNAPSHOT_FEATURE_SCALE,
            energy: self.energy / SNAPSHOT_FEATURE_SCALE,
            instrumentalness: self.instrumentalness / SNAPSHOT_FEATURE_SCALE,
            liveness: self.liveness / SNAPSHOT_FEATURE_SCALE,
            speechiness: self.speechiness / SNAPSHOT_FEATURE_SCALE,
            tempo: self.tempo,
            valence: self.valence / SNAPSHOT_FEATURE_SCALE,
        };
        let key = Key::from_spotify_notation(self.key, self.mode);
        Track::new(self.id, self.name, self.artist_ids, features, key)
    }
}

/// JSON catalog snapshot: `{"artists": [...], "tracks": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSnapshot {
    pub artists: Vec<ArtistRecord>,
    pub tracks: Vec<TrackRecord>,
}

impl CatalogSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog snapshot {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse catalog snapshot {}", path.display()))
    }
}

/// Counts of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub artists: usize,
    pub tracks: usize,
    pub skipped_tracks: usize,
}

/// Handle to the catalog database.
#[derive(Debug)]
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Opens (and creates if needed) the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database at {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory catalog")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create catalog tables")?;
        Ok(Self { conn })
    }

    /// Imports a snapshot in one transaction.
    ///
    /// Tracks that fail validation are skipped with a warning; everything else is
    /// inserted or replaced.
    pub fn import(&mut self, snapshot: CatalogSnapshot) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let tx = self.conn.transaction().context("Failed to start import transaction")?;

        {
            let mut insert_artist = tx.prepare("INSERT OR REPLACE INTO artists (id, name) VALUES (?1, ?2)")?;
            let mut clear_genres = tx.prepare("DELETE FROM artist_genres WHERE artist_id = ?1")?;
            let mut insert_genre =
                tx.prepare("INSERT OR IGNORE INTO artist_genres (artist_id, genre) VALUES (?1, ?2)")?;

            for artist in &snapshot.artists {
                insert_artist
                    .execute(params![artist.id, artist.name])
                    .with_context(|| format!("Failed to insert artist {}", artist.id))?;
                clear_genres.execute(params![artist.id])?;
                for genre in &artist.genres {
                    insert_genre.execute(params![artist.id, genre])?;
                }
                summary.artists += 1;
            }

            let mut insert_track = tx.prepare(&format!(
                "INSERT OR REPLACE INTO tracks ({TRACK_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ))?;
            let mut clear_artists = tx.prepare("DELETE FROM track_artists WHERE track_id = ?1")?;
            let mut insert_track_artist =
                tx.prepare("INSERT INTO track_artists (track_id, position, artist_id) VALUES (?1, ?2, ?3)")?;

            for record in snapshot.tracks {
                let id = record.id.clone();
                let track = match record.into_track() {
                    Ok(track) => track,
                    Err(err) => {
                        warn!("Skipping track {id}: {err}");
                        summary.skipped_tracks += 1;
                        continue;
                    }
                };

                let f = track.features();
                let key_index = track.key().and_then(|key| i64::try_from(key.index()).ok());
                insert_track
                    .execute(params![
                        track.id(),
                        track.name(),
                        f.acousticness,
                        f.danceability,
                        f.energy,
                        f.instrumentalness,
                        f.liveness,
                        f.speechiness,
                        f.tempo,
                        f.valence,
                        key_index,
                    ])
                    .with_context(|| format!("Failed to insert track {}", track.id()))?;

                clear_artists.execute(params![track.id()])?;
                for (position, artist_id) in track.artist_ids().iter().enumerate() {
                    insert_track_artist.execute(params![track.id(), i64::try_from(position)?, artist_id])?;
                }
                summary.tracks += 1;
            }
        }

        tx.commit().context("Failed to commit catalog import")?;
        info!(
            "Imported {} artists and {} tracks ({} skipped)",
            summary.artists, summary.tracks, summary.skipped_tracks
        );
        Ok(summary)
    }

    /// Every track, in import order.
    pub fn tracks(&self) -> Result<Vec<Track>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY rowid"))?;
        let rows = stmt
            .query_map([], read_track_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read tracks from catalog")?;

        let tracks = rows
            .into_iter()
            .map(|row| self.assemble(row))
            .collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} tracks from catalog", tracks.len());
        Ok(tracks)
    }

    /// Tracks for `ids` in the given order. Unknown ids are skipped with a warning.
    pub fn tracks_by_ids(&self, ids: &[String]) -> Result<Vec<Track>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"))?;

        let mut tracks = Vec::with_capacity(ids.len());
        for id in ids {
            let row = stmt
                .query_row(params![id], read_track_row)
                .optional()
                .with_context(|| format!("Failed to look up track {id}"))?;
            match row {
                Some(row) => tracks.push(self.assemble(row)?),
                None => warn!("Track {id} is not in the catalog, skipping"),
            }
        }
        Ok(tracks)
    }

    /// All artists with their genres.
    pub fn artists(&self) -> Result<ArtistIndex> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.name, g.genre FROM artists a \
             LEFT JOIN artist_genres g ON g.artist_id = a.id ORDER BY a.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read artists from catalog")?;

        let mut index = ArtistIndex::new();
        let mut current: Option<Artist> = None;
        for (id, name, genre) in rows {
            if current.as_ref().map_or(true, |artist| artist.id != id) {
                if let Some(done) = current.take() {
                    index.insert(done);
                }
                current = Some(Artist::new(id, name, Vec::<String>::new()));
            }
            if let (Some(artist), Some(genre)) = (current.as_mut(), genre) {
                artist.genres.push(genre);
            }
        }
        if let Some(done) = current {
            index.insert(done);
        }

        debug!("Loaded {} artists from catalog", index.len());
        Ok(index)
    }

    pub fn track_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
            .context("Failed to count tracks")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn artist_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM artists", [], |row| row.get(0))
            .context("Failed to count artists")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn artist_ids(&self, track_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT artist_id FROM track_artists WHERE track_id = ?1 ORDER BY position")?;
        let ids = stmt
            .query_map(params![track_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .with_context(|| format!("Failed to read artists of track {track_id}"))?;
        Ok(ids)
    }

    fn assemble(&self, row: TrackRow) -> Result<Track> {
        let artist_ids = self.artist_ids(&row.id)?;
        let key = row
            .key_index
            .and_then(|index| usize::try_from(index).ok())
            .and_then(Key::from_index);
        let id = row.id.clone();
        Track::new(row.id, row.name, artist_ids, row.features, key)
            .with_context(|| format!("Catalog holds an invalid record for track {id}"))
    }
}

struct TrackRow {
    id: String,
    name: String,
    features: AudioFeatures,
    key_index: Option<i64>,
}

fn read_track_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackRow> {
    Ok(TrackRow {
        id: row.get(0)?,
        name: row.get(1)?,
        features: AudioFeatures {
            acousticness: row.get(2)?,
            danceability: row.get(3)?,
            energy: row.get(4)?,
            instrumentalness: row.get(5)?,
            liveness: row.get(6)?,
            speechiness: row.get(7)?,
            tempo: row.get(8)?,
            valence: row.get(9)?,
        },
        key_index: row.get(10)?,
    })
}
