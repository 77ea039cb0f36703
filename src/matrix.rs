//! Pairwise distance matrix over a track list.
//!
//! The builder evaluates the upper triangle only, in parallel rows, and mirrors it.
//! [`DistanceMatrix::to_augmented_costs`] turns the result into the integer problem
//! the tour optimizer works on: scaled, truncated costs plus a zero-cost depot node
//! at index `n`, which reduces the open path over the tracks to a closed tour.

use crate::error::Result;
use crate::optimizer::CostMatrix;
use crate::track::{Track, TrackSimilarityModel};
use log::{debug, info};
use rayon::prelude::*;

/// Factor applied to float distances before truncation to integer costs.
pub const COST_SCALE: f64 = 1000.0;

/// Dense symmetric `n × n` matrix of track distances with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Builds a matrix from explicit rows. Rows must form a square.
    ///
    /// Returns `None` for ragged input.
    #[must_use]
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Self {
            size,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.size + j]
    }

    /// Whether the matrix equals its transpose and has a zero diagonal.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| {
            self.get(i, i) == 0.0 && (i + 1..self.size).all(|j| self.get(i, j) == self.get(j, i))
        })
    }

    /// Scales by [`COST_SCALE`], truncates, and appends a zero-cost depot node.
    ///
    /// The returned matrix has size `n + 1`; the depot is index `n`.
    #[must_use]
    pub fn to_augmented_costs(&self) -> CostMatrix {
        let n = self.size;
        let mut costs = vec![0_i64; (n + 1) * (n + 1)];
        for i in 0..n {
            for j in 0..n {
                #[allow(clippy::cast_possible_truncation)]
                let cost = (self.get(i, j) * COST_SCALE) as i64;
                costs[i * (n + 1) + j] = cost;
            }
        }
        CostMatrix::from_vec(n + 1, costs)
    }
}

/// Computes the distance matrix of `tracks` under `model`.
///
/// Every track is validated against the model before any pair is evaluated, so a
/// track with no resolvable artists fails fast instead of mid-build.
///
/// # Errors
///
/// Returns the first validation or distance error.
pub fn build_distance_matrix(tracks: &[Track], model: &TrackSimilarityModel<'_>) -> Result<DistanceMatrix> {
    let size = tracks.len();
    info!("Building {size}x{size} distance matrix");

    tracks.iter().try_for_each(|track| model.validate(track))?;

    let upper: Vec<Vec<f64>> = (0..size)
        .into_par_iter()
        .map(|i| {
            tracks[i + 1..]
                .iter()
                .map(|other| model.distance(&tracks[i], other))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut data = vec![0.0; size * size];
    for (i, row) in upper.iter().enumerate() {
        for (offset, &distance) in row.iter().enumerate() {
            let j = i + 1 + offset;
            data[i * size + j] = distance;
            data[j * size + i] = distance;
        }
    }

    debug!("Distance matrix complete ({} pairs)", size * size.saturating_sub(1) / 2);
    Ok(DistanceMatrix { size, data })
}
