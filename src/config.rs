//! # Configuration Module
//!
//! Configuration management and data directory setup for Shufflr.
//!
//! ## Data Storage
//!
//! Shufflr keeps its files in the platform-standard data directory:
//! - Linux: `~/.local/share/shufflr/`
//! - macOS: `~/Library/Application Support/shufflr/`
//! - Windows: `%APPDATA%\shufflr\`
//!
//! | File           | Purpose                                    |
//! |----------------|--------------------------------------------|
//! | `catalog.db`   | Local SQLite catalog of tracks and artists |
//! | `genres.json`  | Genre embedding snapshot                   |
//! | `config.json`  | Optional [`ShuffleConfig`] overrides       |
//!
//! ## Shuffle Configuration
//!
//! [`ShuffleConfig`] bundles the 11 feature weights, optional feature bounds used to
//! select input tracks, and the search parameters that drive the tour optimizer. It
//! is (de)serialized as camelCase JSON; every field has a default, so a config file
//! only needs to name what it changes:
//!
//! ```json
//! { "weights": { "genre": 4.0 }, "search": { "timeoutSecs": 20.0 } }
//! ```

use crate::error::{self, ShuffleError};
use crate::track::{AudioFeatures, Feature};
use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns the platform-appropriate data directory for Shufflr, creating it if needed.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or the `shufflr`
/// subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let shufflr_dir = data_dir.join("shufflr");
    fs::create_dir_all(&shufflr_dir).with_context(|| {
        format!(
            "Failed to create Shufflr data directory at {}. Please check file permissions.",
            shufflr_dir.display()
        )
    })?;

    Ok(shufflr_dir)
}

/// Path of the default catalog database.
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.db"))
}

/// Path of the default genre snapshot.
pub fn get_genres_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("genres.json"))
}

/// Path of the default configuration file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("config.json"))
}

/// Makes a user-supplied path absolute relative to the working directory.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Failed to resolve path {}", path.display()))?
        .into_owned())
}

/// The 11 feature weights.
///
/// Weights scale the axes of the track distance before the norm is taken; zero
/// disables an axis. Negative weights would reward differences and are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weights {
    pub acousticness: f64,
    pub danceability: f64,
    pub different_artist: f64,
    pub energy: f64,
    pub genre: f64,
    pub instrumentalness: f64,
    pub key: f64,
    pub liveness: f64,
    pub speechiness: f64,
    pub tempo: f64,
    pub valence: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            acousticness: 1.0,
            danceability: 1.0,
            different_artist: 5.0,
            energy: 1.0,
            genre: 3.0,
            instrumentalness: 1.0,
            key: 3.0,
            liveness: 1.0,
            speechiness: 1.0,
            tempo: 2.0,
            valence: 1.0,
        }
    }
}

impl Weights {
    /// All weights zero except `feature`.
    #[must_use]
    pub fn only(feature: Feature, weight: f64) -> Self {
        let mut weights = Self::zero();
        *weights.slot(feature) = weight;
        weights
    }

    #[must_use]
    pub fn zero() -> Self {
        Self {
            acousticness: 0.0,
            danceability: 0.0,
            different_artist: 0.0,
            energy: 0.0,
            genre: 0.0,
            instrumentalness: 0.0,
            key: 0.0,
            liveness: 0.0,
            speechiness: 0.0,
            tempo: 0.0,
            valence: 0.0,
        }
    }

    #[must_use]
    pub const fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Acousticness => self.acousticness,
            Feature::Danceability => self.danceability,
            Feature::DifferentArtist => self.different_artist,
            Feature::Energy => self.energy,
            Feature::Genre => self.genre,
            Feature::Instrumentalness => self.instrumentalness,
            Feature::Key => self.key,
            Feature::Liveness => self.liveness,
            Feature::Speechiness => self.speechiness,
            Feature::Tempo => self.tempo,
            Feature::Valence => self.valence,
        }
    }

    /// Sets one weight after validating it.
    ///
    /// # Errors
    ///
    /// Rejects negative and non-finite weights.
    pub fn set(&mut self, feature: Feature, weight: f64) -> error::Result<()> {
        check_weight(feature, weight)?;
        *self.slot(feature) = weight;
        Ok(())
    }

    /// `(feature, weight)` pairs in [`Feature::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().map(|feature| (feature, self.get(feature)))
    }

    /// # Errors
    ///
    /// Returns the first negative or non-finite weight.
    pub fn validate(&self) -> error::Result<()> {
        self.iter().try_for_each(|(feature, weight)| check_weight(feature, weight))
    }

    fn slot(&mut self, feature: Feature) -> &mut f64 {
        match feature {
            Feature::Acousticness => &mut self.acousticness,
            Feature::Danceability => &mut self.danceability,
            Feature::DifferentArtist => &mut self.different_artist,
            Feature::Energy => &mut self.energy,
            Feature::Genre => &mut self.genre,
            Feature::Instrumentalness => &mut self.instrumentalness,
            Feature::Key => &mut self.key,
            Feature::Liveness => &mut self.liveness,
            Feature::Speechiness => &mut self.speechiness,
            Feature::Tempo => &mut self.tempo,
            Feature::Valence => &mut self.valence,
        }
    }
}

fn check_weight(feature: Feature, weight: f64) -> error::Result<()> {
    if !weight.is_finite() {
        return Err(ShuffleError::NonFiniteWeight {
            feature: feature.name().to_string(),
            value: weight,
        });
    }
    if weight < 0.0 {
        return Err(ShuffleError::NegativeWeight {
            feature: feature.name().to_string(),
            value: weight,
        });
    }
    Ok(())
}

/// Inclusive range an audio feature must fall into for a track to be selected.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bounds {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl Bounds {
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.minimum.map_or(true, |min| value >= min) && self.maximum.map_or(true, |max| value <= max)
    }
}

/// Per-feature selection bounds, only meaningful for audio features.
pub type FeatureBounds = BTreeMap<Feature, Bounds>;

/// Whether `features` satisfy every configured bound.
#[must_use]
pub fn within_bounds(bounds: &FeatureBounds, features: &AudioFeatures) -> bool {
    bounds.iter().all(|(&feature, range)| {
        features.value(feature).map_or(true, |value| range.contains(value))
    })
}

/// Parameters of the tour search and its early-stop controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Absolute search deadline in seconds.
    pub timeout_secs: f64,
    /// Minimum share of the total improvement the trailing window must contribute.
    pub improvement_size: f64,
    /// Length of the trailing window in seconds.
    pub improvement_timeout_secs: f64,
    /// Seed for the optimizer's random choices; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10.0,
            improvement_size: 0.05,
            improvement_timeout_secs: 3.0,
            seed: None,
        }
    }
}

impl SearchConfig {
    /// # Errors
    ///
    /// Rejects non-finite or negative durations and an improvement size outside [0, 1].
    pub fn validate(&self) -> error::Result<()> {
        seconds("timeoutSecs", self.timeout_secs)?;
        seconds("improvementTimeoutSecs", self.improvement_timeout_secs)?;
        if !(0.0..=1.0).contains(&self.improvement_size) {
            return Err(ShuffleError::InvalidSearchParameter {
                name: "improvementSize".to_string(),
                reason: format!("expected a fraction in [0, 1], got {}", self.improvement_size),
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if `timeout_secs` is negative or not finite.
    pub fn timeout(&self) -> error::Result<Duration> {
        seconds("timeoutSecs", self.timeout_secs)
    }

    /// # Errors
    ///
    /// Fails if `improvement_timeout_secs` is negative or not finite.
    pub fn improvement_timeout(&self) -> error::Result<Duration> {
        seconds("improvementTimeoutSecs", self.improvement_timeout_secs)
    }
}

fn seconds(name: &str, value: f64) -> error::Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| ShuffleError::InvalidSearchParameter {
        name: name.to_string(),
        reason: format!("expected a non-negative number of seconds, got {value}"),
    })
}

/// Everything that shapes one shuffle run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShuffleConfig {
    pub weights: Weights,
    pub feature_bounds: FeatureBounds,
    pub search: SearchConfig,
    /// Keep only the first N tracks of the sequenced list.
    pub maximum_number_of_songs: Option<usize>,
}

impl ShuffleConfig {
    /// Loads a configuration file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse configuration {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invalid weight, bound or search parameter.
    pub fn validate(&self) -> error::Result<()> {
        self.weights.validate()?;
        self.search.validate()?;

        for (feature, bounds) in &self.feature_bounds {
            if let (Some(minimum), Some(maximum)) = (bounds.minimum, bounds.maximum) {
                if minimum > maximum {
                    return Err(ShuffleError::InvalidFeatureBounds {
                        feature: feature.name().to_string(),
                        minimum,
                        maximum,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_weights() {
        let weights = Weights::default();
        assert_eq!(weights.get(Feature::DifferentArtist), 5.0);
        assert_eq!(weights.get(Feature::Genre), 3.0);
        assert_eq!(weights.get(Feature::Key), 3.0);
        assert_eq!(weights.get(Feature::Tempo), 2.0);
        assert_eq!(weights.get(Feature::Energy), 1.0);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let mut weights = Weights::default();
        let err = weights.set(Feature::Energy, -1.0).unwrap_err();
        assert!(matches!(err, ShuffleError::NegativeWeight { .. }));
        assert_eq!(weights.get(Feature::Energy), 1.0);

        weights.valence = -0.5;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_non_finite_weight_is_rejected() {
        let mut weights = Weights::default();
        assert!(matches!(
            weights.set(Feature::Genre, f64::INFINITY),
            Err(ShuffleError::NonFiniteWeight { .. })
        ));
    }

    #[test]
    fn test_only_sets_a_single_axis() {
        let weights = Weights::only(Feature::Liveness, 2.5);
        for (feature, weight) in weights.iter() {
            let expected = if feature == Feature::Liveness { 2.5 } else { 0.0 };
            assert_eq!(weight, expected, "{feature}");
        }
    }

    #[test]
    fn test_search_config_validation() {
        assert!(SearchConfig::default().validate().is_ok());

        let config = SearchConfig { improvement_size: 1.5, ..SearchConfig::default() };
        assert!(config.validate().is_err());

        let config = SearchConfig { timeout_secs: -1.0, ..SearchConfig::default() };
        assert!(config.validate().is_err());
        assert!(config.timeout().is_err());

        let config = SearchConfig { improvement_timeout_secs: f64::NAN, ..SearchConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bounds() {
        let bounds = Bounds { minimum: Some(0.2), maximum: Some(0.8) };
        assert!(bounds.contains(0.2));
        assert!(bounds.contains(0.8));
        assert!(!bounds.contains(0.1));
        assert!(Bounds::default().contains(123.0));

        let mut table = FeatureBounds::new();
        table.insert(Feature::Tempo, Bounds { minimum: Some(100.0), maximum: None });
        let features = AudioFeatures { tempo: 90.0, ..AudioFeatures::default() };
        assert!(!within_bounds(&table, &features));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "weights": { "genre": 4.0, "differentArtist": 0.0 },
                "featureBounds": { "energy": { "minimum": 0.3 } },
                "search": { "timeoutSecs": 2.5 },
                "maximumNumberOfSongs": 20
            }"#,
        )
        .unwrap();

        let config = ShuffleConfig::load(&path).unwrap();
        assert_eq!(config.weights.genre, 4.0);
        assert_eq!(config.weights.different_artist, 0.0);
        assert_eq!(config.weights.tempo, 2.0);
        assert_eq!(config.search.timeout_secs, 2.5);
        assert_eq!(config.search.improvement_size, 0.05);
        assert_eq!(config.maximum_number_of_songs, Some(20));
        assert_eq!(
            config.feature_bounds.get(&Feature::Energy),
            Some(&Bounds { minimum: Some(0.3), maximum: None })
        );
    }

    #[test]
    fn test_invalid_config_file_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "weights": { "key": -3.0 } }"#).unwrap();
        assert!(ShuffleConfig::load(&path).is_err());

        fs::write(&path, r#"{ "featureBounds": { "valence": { "minimum": 0.9, "maximum": 0.1 } } }"#).unwrap();
        assert!(ShuffleConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_config_file_is_default() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = ShuffleConfig::load(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ShuffleConfig::default());
    }

    #[test]
    fn test_absolutize_relative_path() {
        let path = absolutize(Path::new("catalog.db")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("catalog.db"));
    }
}
