//! Tracks and the weighted multi-feature track distance.
//!
//! Each pair of tracks is compared along 11 axes, one per [`Feature`]. Every axis
//! yields a component in [0, 1]; the components are combined as a weighted
//! Euclidean norm:
//!
//! ```text
//! distance(t1, t2) = sqrt(Σ weight_f · component_f²)
//! ```
//!
//! Axes with weight zero are skipped entirely, so expensive components (genre,
//! shared artist, key) only cost something when they matter.

use crate::artist::{Artist, ArtistIndex};
use crate::config::Weights;
use crate::error::{Result, ShuffleError};
use crate::genre::GenreDistanceComputer;
use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Tempo gap (BPM) at which the tempo component saturates.
pub const MAXIMUM_TEMPO_DIFFERENCE: f64 = 10.0;

/// The 11 comparison axes, in the order used for weight tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Acousticness,
    Danceability,
    DifferentArtist,
    Energy,
    Genre,
    Instrumentalness,
    Key,
    Liveness,
    Speechiness,
    Tempo,
    Valence,
}

impl Feature {
    pub const ALL: [Feature; 11] = [
        Feature::Acousticness,
        Feature::Danceability,
        Feature::DifferentArtist,
        Feature::Energy,
        Feature::Genre,
        Feature::Instrumentalness,
        Feature::Key,
        Feature::Liveness,
        Feature::Speechiness,
        Feature::Tempo,
        Feature::Valence,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Feature::Acousticness => "acousticness",
            Feature::Danceability => "danceability",
            Feature::DifferentArtist => "differentArtist",
            Feature::Energy => "energy",
            Feature::Genre => "genre",
            Feature::Instrumentalness => "instrumentalness",
            Feature::Key => "key",
            Feature::Liveness => "liveness",
            Feature::Speechiness => "speechiness",
            Feature::Tempo => "tempo",
            Feature::Valence => "valence",
        }
    }

    /// Whether the feature is a per-track audio measurement (and can be bounded).
    #[must_use]
    pub const fn is_audio(self) -> bool {
        !matches!(self, Feature::DifferentArtist | Feature::Genre | Feature::Key)
    }

    /// Whether evaluating the feature needs the tracks' artists.
    #[must_use]
    pub const fn needs_artists(self) -> bool {
        matches!(self, Feature::DifferentArtist | Feature::Genre | Feature::Key)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = ShuffleError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ShuffleError::UnknownFeature(s.to_string()))
    }
}

/// Audio measurements of a track. Everything but `tempo` lies in [0, 1];
/// `tempo` is in BPM.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub speechiness: f64,
    pub tempo: f64,
    pub valence: f64,
}

impl AudioFeatures {
    /// Value of an audio feature, `None` for the non-audio axes.
    #[must_use]
    pub const fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Acousticness => Some(self.acousticness),
            Feature::Danceability => Some(self.danceability),
            Feature::Energy => Some(self.energy),
            Feature::Instrumentalness => Some(self.instrumentalness),
            Feature::Liveness => Some(self.liveness),
            Feature::Speechiness => Some(self.speechiness),
            Feature::Tempo => Some(self.tempo),
            Feature::Valence => Some(self.valence),
            Feature::DifferentArtist | Feature::Genre | Feature::Key => None,
        }
    }
}

/// A track to be sequenced. Equality and hashing use the id only.
///
/// Fields are only reachable through [`Track::new`], which validates them:
///
/// ```compile_fail
/// use shufflr::track::{AudioFeatures, Track};
///
/// let track = Track {
///     id: "t".to_string(),
///     name: "T".to_string(),
///     artist_ids: Vec::new(),
///     features: AudioFeatures::default(),
///     key: None,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Track {
    id: String,
    name: String,
    /// Ordered artist ids, never empty.
    artist_ids: Vec<String>,
    features: AudioFeatures,
    /// `None` when key detection was not confident.
    key: Option<Key>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Track {
    /// Builds a validated track.
    ///
    /// # Errors
    ///
    /// Fails if `artist_ids` is empty, a unit feature lies outside [0, 1] or the
    /// tempo is negative or not finite.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artist_ids: Vec<String>,
        features: AudioFeatures,
        key: Option<Key>,
    ) -> Result<Self> {
        let id = id.into();

        if artist_ids.is_empty() {
            return Err(ShuffleError::NoArtistIds { track_id: id });
        }

        for feature in Feature::ALL.into_iter().filter(|f| f.is_audio()) {
            let Some(value) = features.value(feature) else { continue };
            let valid = match feature {
                Feature::Tempo => value.is_finite() && value >= 0.0,
                _ => (0.0..=1.0).contains(&value),
            };
            if !valid {
                return Err(ShuffleError::FeatureOutOfRange {
                    track_id: id,
                    feature: feature.name().to_string(),
                    value,
                });
            }
        }

        Ok(Self {
            id,
            name: name.into(),
            artist_ids,
            features,
            key,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn artist_ids(&self) -> &[String] {
        &self.artist_ids
    }

    #[must_use]
    pub const fn features(&self) -> &AudioFeatures {
        &self.features
    }

    /// `None` when key detection was not confident.
    #[must_use]
    pub const fn key(&self) -> Option<Key> {
        self.key
    }

    /// Whether the two tracks have at least one artist id in common.
    #[must_use]
    pub fn shares_artist_with(&self, other: &Track) -> bool {
        self.artist_ids.iter().any(|id| other.artist_ids.contains(id))
    }
}

/// Weighted distance between tracks.
#[derive(Debug, Clone, Copy)]
pub struct TrackSimilarityModel<'a> {
    weights: &'a Weights,
    artists: &'a ArtistIndex,
    genres: &'a GenreDistanceComputer,
}

impl<'a> TrackSimilarityModel<'a> {
    /// `weights` are expected to be validated (see [`Weights::validate`]).
    #[must_use]
    pub fn new(weights: &'a Weights, artists: &'a ArtistIndex, genres: &'a GenreDistanceComputer) -> Self {
        Self { weights, artists, genres }
    }

    #[must_use]
    pub fn weights(&self) -> &Weights {
        self.weights
    }

    /// Checks the preconditions of [`TrackSimilarityModel::distance`] for one track.
    ///
    /// # Errors
    ///
    /// [`ShuffleError::NoResolvableArtists`] if an artist-dependent axis has a
    /// non-zero weight and none of the track's artists is known.
    pub fn validate(&self, track: &Track) -> Result<()> {
        let needs_artists = self
            .weights
            .iter()
            .any(|(feature, weight)| weight > 0.0 && feature.needs_artists());

        if needs_artists && self.artists.resolve(&track.artist_ids).is_empty() {
            return Err(ShuffleError::NoResolvableArtists {
                track_id: track.id.clone(),
            });
        }
        Ok(())
    }

    /// Distance between two tracks; zero for the same track.
    ///
    /// # Errors
    ///
    /// Fails when the genre axis is weighted and a track resolves to no artist.
    pub fn distance(&self, track1: &Track, track2: &Track) -> Result<f64> {
        if track1 == track2 {
            return Ok(0.0);
        }

        let mut sum = 0.0;
        for (feature, weight) in self.weights.iter() {
            if weight > 0.0 {
                let component = self.component(feature, track1, track2)?;
                sum += weight * component * component;
            }
        }
        Ok(sum.sqrt())
    }

    /// Unweighted component of one axis, in [0, 1].
    ///
    /// # Errors
    ///
    /// Fails for [`Feature::Genre`] when a track resolves to no artist.
    pub fn component(&self, feature: Feature, track1: &Track, track2: &Track) -> Result<f64> {
        let a = &track1.features;
        let b = &track2.features;

        let component = match feature {
            Feature::Tempo => ((a.tempo - b.tempo).abs() / MAXIMUM_TEMPO_DIFFERENCE).min(1.0),
            Feature::DifferentArtist => {
                if track1.shares_artist_with(track2) {
                    1.0
                } else {
                    0.0
                }
            }
            Feature::Genre => self.genre_component(track1, track2)?,
            Feature::Key => match (track1.key, track2.key) {
                (Some(k1), Some(k2)) if k1.is_compatible(k2) => 0.0,
                _ => 1.0,
            },
            audio => match (a.value(audio), b.value(audio)) {
                (Some(x), Some(y)) => (x - y).abs(),
                _ => 0.0,
            },
        };
        Ok(component)
    }

    fn genre_component(&self, track1: &Track, track2: &Track) -> Result<f64> {
        let artists1 = self.resolve(track1)?;
        let artists2 = self.resolve(track2)?;

        let total: f64 = artists1
            .iter()
            .flat_map(|a| artists2.iter().map(move |b| a.distance(b, self.genres)))
            .sum();

        #[allow(clippy::cast_precision_loss)]
        let pairs = (artists1.len() * artists2.len()) as f64;
        Ok(total / pairs)
    }

    fn resolve(&self, track: &Track) -> Result<Vec<&'a Artist>> {
        let artists = self.artists.resolve(&track.artist_ids);
        if artists.is_empty() {
            return Err(ShuffleError::NoResolvableArtists {
                track_id: track.id.clone(),
            });
        }
        Ok(artists)
    }
}
