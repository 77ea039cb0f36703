//! Typed errors raised by the sequencing core.
//!
//! Application layers (catalog, CLI) wrap these into `anyhow::Error` with context.

use thiserror::Error;

/// Errors that can occur while validating input or sequencing tracks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShuffleError {
    #[error("weight for `{feature}` must not be negative, got {value}")]
    NegativeWeight { feature: String, value: f64 },

    #[error("weight for `{feature}` must be finite, got {value}")]
    NonFiniteWeight { feature: String, value: f64 },

    #[error("invalid search parameter `{name}`: {reason}")]
    InvalidSearchParameter { name: String, reason: String },

    #[error("invalid bounds for `{feature}`: minimum {minimum} exceeds maximum {maximum}")]
    InvalidFeatureBounds {
        feature: String,
        minimum: f64,
        maximum: f64,
    },

    #[error("unknown feature `{0}`")]
    UnknownFeature(String),

    #[error("track `{track_id}` has no artist ids")]
    NoArtistIds { track_id: String },

    #[error(
        "track `{track_id}` resolves to no known artist, but a non-zero genre, \
         differentArtist or key weight requires one"
    )]
    NoResolvableArtists { track_id: String },

    #[error("track `{track_id}` has out-of-range {feature} = {value}")]
    FeatureOutOfRange {
        track_id: String,
        feature: String,
        value: f64,
    },

    #[error("the tour optimizer did not find any solution")]
    NoSolutionFound,
}

pub type Result<T> = std::result::Result<T, ShuffleError>;
