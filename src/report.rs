//! Rendering of sequenced playlists as a text table or JSON.

use crate::artist::ArtistIndex;
use crate::monitor::{ObjectivePoint, StopReason};
use crate::shuffle::Playlist;
use crate::track::{AudioFeatures, Track};
use serde::Serialize;

const ARTIST_WIDTH: usize = 24;
const TITLE_WIDTH: usize = 32;

/// Distances are shown as percentages, capped so the column stays three wide.
const MAXIMUM_SHOWN_DISTANCE: f64 = 9.99;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackReport {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    /// Distance to the previous track, absent for the first one.
    pub distance: Option<f64>,
    pub key: Option<String>,
    pub features: AudioFeatures,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistReport {
    pub tracks: Vec<TrackReport>,
    pub total_distance: f64,
    pub objective: i64,
    pub stop_reason: StopReason,
    pub history: Vec<ObjectivePoint>,
}

impl PlaylistReport {
    #[must_use]
    pub fn new(playlist: &Playlist, artists: &ArtistIndex) -> Self {
        let tracks = playlist
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| TrackReport {
                id: track.id().to_string(),
                name: track.name().to_string(),
                artists: artist_names(track, artists),
                distance: index.checked_sub(1).and_then(|previous| playlist.distances.get(previous).copied()),
                key: track.key().map(|key| key.to_string()),
                features: *track.features(),
            })
            .collect();

        Self {
            tracks,
            total_distance: playlist.total_distance(),
            objective: playlist.objective,
            stop_reason: playlist.stop_reason,
            history: playlist.history.clone(),
        }
    }

    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Fixed-width table with one row per track.
    #[must_use]
    pub fn to_table(&self) -> String {
        let header = format!(
            "{:<ARTIST_WIDTH$}  {:<TITLE_WIDTH$}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}",
            "ARTIST", "TITLE", "DST", "ACS", "DNC", "ENR", "INS", "KEY", "LVN", "SPC", "TMP", "VLN"
        );

        let rows = self.tracks.iter().map(|track| {
            let f = &track.features;
            format!(
                "{:<ARTIST_WIDTH$}  {:<TITLE_WIDTH$}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}",
                truncate(&track.artists.join(", "), ARTIST_WIDTH),
                truncate(&track.name, TITLE_WIDTH),
                track
                    .distance
                    .map_or_else(|| "-".to_string(), |d| percent(d.min(MAXIMUM_SHOWN_DISTANCE))),
                percent(f.acousticness),
                percent(f.danceability),
                percent(f.energy),
                percent(f.instrumentalness),
                track.key.as_deref().unwrap_or("-"),
                percent(f.liveness),
                percent(f.speechiness),
                format!("{:.0}", f.tempo),
                percent(f.valence),
            )
        });

        let footer = format!(
            "\n{} tracks, total distance {:.3}, search ended by {}",
            self.tracks.len(),
            self.total_distance,
            self.stop_reason
        );

        std::iter::once(header).chain(rows).chain(std::iter::once(footer)).collect::<Vec<_>>().join("\n")
    }
}

fn artist_names(track: &Track, artists: &ArtistIndex) -> Vec<String> {
    track
        .artist_ids()
        .iter()
        .map(|id| artists.get(id).map_or_else(|| id.clone(), |artist| artist.name.clone()))
        .collect()
}

fn percent(fraction: f64) -> String {
    format!("{:.0}", 100.0 * fraction)
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
