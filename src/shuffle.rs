//! End-to-end sequencing of a track list.
//!
//! The pipeline is: select (dedupe + feature bounds), build the distance matrix,
//! solve the open path through the depot-augmented tour problem under the search
//! monitor, drop the depot, and finally truncate to the configured length.

use crate::artist::ArtistIndex;
use crate::config::{within_bounds, FeatureBounds, SearchConfig, ShuffleConfig};
use crate::error::{Result, ShuffleError};
use crate::genre::GenreDistanceComputer;
use crate::matrix::{build_distance_matrix, DistanceMatrix};
use crate::monitor::{ObjectivePoint, SearchMonitor, Solution, StopReason};
use crate::optimizer::{GuidedLocalSearch, TourOptimizer};
use crate::track::{Track, TrackSimilarityModel};
use log::{debug, info};
use std::collections::HashSet;
use std::time::Instant;

/// Open path through the nodes of a distance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPath {
    /// Node indices in visiting order.
    pub order: Vec<usize>,
    /// `distances[k]` is the distance between `order[k]` and `order[k + 1]`.
    pub distances: Vec<f64>,
    /// Integer objective of the augmented tour.
    pub objective: i64,
    pub stop_reason: StopReason,
    pub history: Vec<ObjectivePoint>,
}

/// A sequenced playlist.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub tracks: Vec<Track>,
    pub distances: Vec<f64>,
    pub objective: i64,
    pub stop_reason: StopReason,
    pub history: Vec<ObjectivePoint>,
}

impl Playlist {
    #[must_use]
    pub fn total_distance(&self) -> f64 {
        self.distances.iter().sum()
    }
}

/// The reference optimizer configured from `search`.
#[must_use]
pub fn optimizer_for(search: &SearchConfig) -> GuidedLocalSearch {
    search.seed.map_or_else(GuidedLocalSearch::new, GuidedLocalSearch::with_seed)
}

/// Drops repeated ids (first occurrence wins) and tracks outside `bounds`.
#[must_use]
pub fn select_tracks(tracks: Vec<Track>, bounds: &FeatureBounds) -> Vec<Track> {
    let input = tracks.len();
    let mut seen = HashSet::new();

    let selected: Vec<Track> = tracks
        .into_iter()
        .filter(|track| seen.insert(track.id().to_string()))
        .filter(|track| within_bounds(bounds, track.features()))
        .collect();

    if selected.len() != input {
        debug!("Selected {} of {} tracks", selected.len(), input);
    }
    selected
}

/// Finds a short open path visiting every node of `matrix` once.
///
/// # Errors
///
/// [`ShuffleError::NoSolutionFound`] if the optimizer returns nothing, or an
/// invalid search parameter.
pub fn solve_open_path(
    matrix: &DistanceMatrix,
    search: &SearchConfig,
    optimizer: &mut dyn TourOptimizer,
) -> Result<OpenPath> {
    let n = matrix.size();
    if n == 0 {
        return Ok(OpenPath {
            order: Vec::new(),
            distances: Vec::new(),
            objective: 0,
            stop_reason: StopReason::Exhausted,
            history: Vec::new(),
        });
    }

    let timeout = search.timeout()?;
    let mut monitor = SearchMonitor::new(search.improvement_size, search.improvement_timeout()?);
    let costs = matrix.to_augmented_costs();
    let depot = n;

    let started = Instant::now();
    let tour = optimizer.solve(&costs, depot, timeout, &mut |nodes, objective| {
        monitor.on_solution(Solution {
            nodes: nodes.to_vec(),
            objective,
            elapsed: started.elapsed(),
        })
    });
    let tour = tour.ok_or(ShuffleError::NoSolutionFound)?;

    // The monitor's best-known tour breaks ties towards the newest one; fall back
    // to the optimizer's own answer only if nothing was reported.
    let (nodes, objective) = match monitor.best() {
        Some(best) => (best.nodes.clone(), best.objective),
        None => (tour.nodes, tour.objective),
    };
    let stop_reason = match monitor.stop_reason() {
        StopReason::Deadline if tour.exhausted => StopReason::Exhausted,
        reason => reason,
    };

    let order: Vec<usize> = nodes.into_iter().filter(|&node| node != depot).collect();
    let distances = order.windows(2).map(|pair| matrix.get(pair[0], pair[1])).collect();

    info!(
        "Search finished after {:.2}s with objective {objective} ({stop_reason})",
        started.elapsed().as_secs_f64()
    );

    Ok(OpenPath {
        order,
        distances,
        objective,
        stop_reason,
        history: monitor.objective_history(),
    })
}

/// Sequences `tracks` so that consecutive tracks are as similar as possible.
///
/// # Errors
///
/// Fails on invalid configuration, unresolvable artists under an artist-dependent
/// weight, or when the search finds no solution.
pub fn shuffle_tracks(
    tracks: Vec<Track>,
    artists: &ArtistIndex,
    genres: &GenreDistanceComputer,
    config: &ShuffleConfig,
    optimizer: &mut dyn TourOptimizer,
) -> Result<Playlist> {
    config.validate()?;

    let selected = select_tracks(tracks, &config.feature_bounds);
    let model = TrackSimilarityModel::new(&config.weights, artists, genres);
    let matrix = build_distance_matrix(&selected, &model)?;
    let mut path = solve_open_path(&matrix, &config.search, optimizer)?;

    if let Some(maximum) = config.maximum_number_of_songs {
        path.order.truncate(maximum);
        path.distances.truncate(maximum.saturating_sub(1));
    }

    let mut slots: Vec<Option<Track>> = selected.into_iter().map(Some).collect();
    let tracks = path.order.iter().filter_map(|&index| slots[index].take()).collect();

    Ok(Playlist {
        tracks,
        distances: path.distances,
        objective: path.objective,
        stop_reason: path.stop_reason,
        history: path.history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artist::Artist;
    use crate::config::{Bounds, Weights};
    use crate::genre::{GenrePoint, GenreTable};
    use crate::optimizer::{CostMatrix, SolutionCallback, Tour};
    use crate::track::{AudioFeatures, Feature};
    use std::time::Duration;

    /// Passes every reported tour through to the monitor and keeps a copy.
    struct Recording {
        inner: GuidedLocalSearch,
        reported: Vec<(Vec<usize>, i64)>,
    }

    impl TourOptimizer for Recording {
        fn solve(
            &mut self,
            costs: &CostMatrix,
            start: usize,
            time_limit: Duration,
            on_solution: &mut SolutionCallback<'_>,
        ) -> Option<Tour> {
            let reported = &mut self.reported;
            self.inner.solve(costs, start, time_limit, &mut |nodes, objective| {
                reported.push((nodes.to_vec(), objective));
                on_solution(nodes, objective)
            })
        }
    }

    fn search(timeout_secs: f64) -> SearchConfig {
        SearchConfig {
            timeout_secs,
            improvement_size: 0.05,
            improvement_timeout_secs: 0.1,
            seed: Some(11),
        }
    }

    fn track(id: &str, energy: f64) -> Track {
        let features = AudioFeatures { energy, tempo: 120.0, ..AudioFeatures::default() };
        Track::new(id, id, vec!["a".to_string()], features, None).unwrap()
    }

    #[test]
    fn test_select_dedupes_and_filters() {
        let tracks = vec![track("a", 0.1), track("b", 0.5), track("a", 0.9), track("c", 0.95)];
        let mut bounds = FeatureBounds::new();
        bounds.insert(Feature::Energy, Bounds { minimum: None, maximum: Some(0.9) });

        let selected = select_tracks(tracks, &bounds);
        let ids: Vec<&str> = selected.iter().map(Track::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(selected[0].features().energy, 0.1);
    }

    #[test]
    fn test_open_path_on_square_cycle() {
        let matrix = DistanceMatrix::from_rows(&[
            vec![0.0, 1.0, 2.0, 1.0],
            vec![1.0, 0.0, 1.0, 2.0],
            vec![2.0, 1.0, 0.0, 1.0],
            vec![1.0, 2.0, 1.0, 0.0],
        ])
        .unwrap();
        let mut optimizer = GuidedLocalSearch::with_seed(1);
        let path = solve_open_path(&matrix, &search(0.2), &mut optimizer).unwrap();

        assert_eq!(path.order.len(), 4);
        assert_eq!(path.objective, 3000);
        assert_eq!(path.distances, vec![1.0, 1.0, 1.0]);
        assert!(!path.history.is_empty());
    }

    #[test]
    fn test_open_path_on_a_line_is_monotonic() {
        let rows: Vec<Vec<f64>> = (0..8)
            .map(|i: i32| (0..8).map(|j: i32| f64::from((i - j).abs())).collect())
            .collect();
        let matrix = DistanceMatrix::from_rows(&rows).unwrap();
        let mut optimizer = GuidedLocalSearch::with_seed(5);
        let path = solve_open_path(&matrix, &search(0.2), &mut optimizer).unwrap();

        let ascending: Vec<usize> = (0..8).collect();
        let descending: Vec<usize> = (0..8).rev().collect();
        assert!(path.order == ascending || path.order == descending, "{:?}", path.order);
        assert_eq!(path.objective, 7000);
    }

    #[test]
    fn test_tied_tours_resolve_to_newest() {
        let rows: Vec<Vec<f64>> = (0..7)
            .map(|i| (0..7).map(|j| if i == j { 0.0 } else { 1.0 }).collect())
            .collect();
        let matrix = DistanceMatrix::from_rows(&rows).unwrap();
        let mut optimizer = Recording { inner: GuidedLocalSearch::with_seed(2), reported: Vec::new() };
        let path = solve_open_path(&matrix, &search(0.1), &mut optimizer).unwrap();

        let without_depot = |nodes: &[usize]| nodes.iter().copied().filter(|&node| node != 7).collect::<Vec<_>>();
        let minimum = optimizer.reported.iter().map(|(_, objective)| *objective).min().unwrap();
        let (newest, _) = optimizer.reported.iter().rev().find(|(_, objective)| *objective == minimum).unwrap();
        let (first, _) = &optimizer.reported[0];

        assert!(optimizer.reported.iter().all(|(_, objective)| *objective == 6000));
        assert_eq!(path.order, without_depot(newest));
        assert_ne!(path.order, without_depot(first));
        assert_eq!(path.objective, minimum);
    }

    #[test]
    fn test_zero_cost_instance_stops_by_exhaustion() {
        let matrix = DistanceMatrix::from_rows(&vec![vec![0.0; 5]; 5]).unwrap();
        let mut optimizer = GuidedLocalSearch::with_seed(1);
        let path = solve_open_path(&matrix, &search(5.0), &mut optimizer).unwrap();

        assert_eq!(path.objective, 0);
        assert_eq!(path.stop_reason, StopReason::Exhausted);
        assert_eq!(path.stop_reason.to_string(), "exhaustion");
    }

    #[test]
    fn test_zero_timeout_is_no_solution() {
        let matrix = DistanceMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let mut optimizer = GuidedLocalSearch::with_seed(1);
        assert_eq!(
            solve_open_path(&matrix, &search(0.0), &mut optimizer),
            Err(ShuffleError::NoSolutionFound)
        );
    }

    #[test]
    fn test_empty_input_is_empty_path() {
        let matrix = DistanceMatrix::from_rows(&[]).unwrap();
        let mut optimizer = GuidedLocalSearch::with_seed(1);
        let path = solve_open_path(&matrix, &search(1.0), &mut optimizer).unwrap();
        assert!(path.order.is_empty());
        assert!(path.distances.is_empty());
    }

    #[test]
    fn test_single_track_path() {
        let matrix = DistanceMatrix::from_rows(&[vec![0.0]]).unwrap();
        let mut optimizer = GuidedLocalSearch::with_seed(1);
        let path = solve_open_path(&matrix, &search(0.1), &mut optimizer).unwrap();
        assert_eq!(path.order, vec![0]);
        assert!(path.distances.is_empty());
    }

    #[test]
    fn test_shuffle_orders_and_truncates() {
        let genres = GenreDistanceComputer::new(GenreTable::from_points([(
            "rock",
            GenrePoint { x: 0.0, y: 0.0, r: 0.0, g: 0.0, b: 0.0 },
        )]));
        let artists: ArtistIndex = [Artist::new("a", "A", ["rock"])].into_iter().collect();
        let config = ShuffleConfig {
            weights: Weights::only(Feature::Energy, 1.0),
            search: search(0.2),
            maximum_number_of_songs: Some(3),
            ..ShuffleConfig::default()
        };
        let tracks = vec![
            track("e4", 0.4),
            track("e0", 0.0),
            track("e3", 0.3),
            track("e1", 0.1),
            track("e2", 0.2),
        ];

        let mut optimizer = optimizer_for(&config.search);
        let playlist = shuffle_tracks(tracks, &artists, &genres, &config, &mut optimizer).unwrap();

        assert_eq!(playlist.tracks.len(), 3);
        assert_eq!(playlist.distances.len(), 2);
        let ids: Vec<&str> = playlist.tracks.iter().map(Track::id).collect();
        assert!(ids == ["e0", "e1", "e2"] || ids == ["e4", "e3", "e2"], "{ids:?}");
        assert!((playlist.total_distance() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_shuffle_rejects_invalid_config() {
        let genres = GenreDistanceComputer::new(GenreTable::default());
        let artists = ArtistIndex::new();
        let mut config = ShuffleConfig::default();
        config.weights.tempo = -1.0;
        let mut optimizer = GuidedLocalSearch::with_seed(1);
        let result = shuffle_tracks(vec![track("a", 0.5)], &artists, &genres, &config, &mut optimizer);
        assert!(matches!(result, Err(ShuffleError::NegativeWeight { .. })));
    }
}
