//! Closed-tour optimization over an integer cost matrix.
//!
//! [`TourOptimizer`] is the seam between the sequencing pipeline and whatever
//! searches for a short tour: it receives the augmented cost matrix, a start node,
//! a time limit and a callback that is told about every solution and may ask the
//! search to stop. [`GuidedLocalSearch`] is the in-crate implementation.
//!
//! ## Guided local search
//!
//! 1. Nearest-neighbour construction from the start node.
//! 2. 2-opt descent on the augmented cost `c(a, b) + λ · p(a, b)`.
//! 3. The local optimum is reported with its true cost.
//! 4. Edges of maximal utility `c(a, b) / (1 + p(a, b))` get their penalty raised,
//!    which reshapes the landscape for the next descent.
//!
//! `λ = α · cost(first local optimum) / nodes`. The start node never moves, so every
//! tour is walked from the start back to the start.

use crate::monitor::SearchCommand;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Scaling factor of the penalty term.
const ALPHA: f64 = 0.3;

const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Square matrix of integer arc costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostMatrix {
    size: usize,
    data: Vec<i64>,
}

impl CostMatrix {
    /// Wraps row-major `data` of `size × size` entries.
    #[must_use]
    pub fn from_vec(size: usize, data: Vec<i64>) -> Self {
        debug_assert_eq!(data.len(), size * size, "cost matrix must be square");
        Self { size, data }
    }

    /// Builds a matrix from rows, `None` if they do not form a square.
    #[must_use]
    pub fn from_rows(rows: &[Vec<i64>]) -> Option<Self> {
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

    #[inline]
    #[must_use]
    pub fn get(&self, from: usize, to: usize) -> i64 {
        self.data[from * self.size + to]
    }

    /// Cost of a closed walk given as consecutive nodes (`[s, .., s]`).
    #[must_use]
    pub fn walk_cost(&self, nodes: &[usize]) -> i64 {
        nodes.windows(2).map(|arc| self.get(arc[0], arc[1])).sum()
    }
}

/// A closed tour, `nodes` starts and ends at the same node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tour {
    pub nodes: Vec<usize>,
    pub objective: i64,
    /// The search ended on its own before the time limit and without being told
    /// to stop: nothing was left to improve or to penalise.
    pub exhausted: bool,
}

/// Callback invoked with each solution (closed tour and objective).
pub type SolutionCallback<'a> = dyn FnMut(&[usize], i64) -> SearchCommand + 'a;

/// Searches for a minimum-cost closed tour.
pub trait TourOptimizer {
    /// Returns the best tour found from `start`, or `None` if the search produced
    /// no solution before `time_limit` (for instance a zero limit).
    ///
    /// `on_solution` is called for solutions found along the way; returning
    /// [`SearchCommand::Terminate`] asks the search to stop at its next check.
    fn solve(
        &mut self,
        costs: &CostMatrix,
        start: usize,
        time_limit: Duration,
        on_solution: &mut SolutionCallback<'_>,
    ) -> Option<Tour>;
}

/// Guided local search over 2-opt moves.
#[derive(Debug)]
pub struct GuidedLocalSearch {
    rng: StdRng,
}

impl Default for GuidedLocalSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl GuidedLocalSearch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible search for a given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl TourOptimizer for GuidedLocalSearch {
    fn solve(
        &mut self,
        costs: &CostMatrix,
        start: usize,
        time_limit: Duration,
        on_solution: &mut SolutionCallback<'_>,
    ) -> Option<Tour> {
        let n = costs.size();
        if n == 0 || start >= n || time_limit.is_zero() {
            return None;
        }
        let deadline = Instant::now() + time_limit;

        let mut order = nearest_neighbour(costs, start);
        let mut best = Tour {
            nodes: closed(&order),
            objective: cycle_cost(costs, &order),
            exhausted: false,
        };

        // With three nodes or fewer every tour has the same cost.
        if n <= 3 {
            let command = on_solution(&best.nodes, best.objective);
            best.exhausted = command == SearchCommand::Continue;
            return Some(best);
        }

        let mut penalties = Penalties::new(n);
        let mut lambda = 0.0;
        let mut iteration = 0_usize;

        loop {
            iteration += 1;
            let converged = two_opt(costs, &penalties, lambda, &mut order, deadline, &mut self.rng);
            let objective = cycle_cost(costs, &order);
            trace!("Local optimum {iteration}: objective {objective}");

            if objective < best.objective {
                best = Tour {
                    nodes: closed(&order),
                    objective,
                    exhausted: false,
                };
            }

            if on_solution(&closed(&order), objective) == SearchCommand::Terminate {
                debug!("Search stopped by callback after {iteration} local optima");
                break;
            }
            if !converged || Instant::now() >= deadline {
                debug!("Search reached its time limit after {iteration} local optima");
                break;
            }
            if best.objective <= 0 {
                debug!("Zero-cost tour after {iteration} local optima");
                best.exhausted = true;
                break;
            }

            if iteration == 1 {
                #[allow(clippy::cast_precision_loss)]
                let scale = objective as f64 / n as f64;
                lambda = ALPHA * scale;
            }
            if !penalties.penalize(costs, &order) {
                debug!("No edge left to penalize after {iteration} local optima");
                best.exhausted = true;
                break;
            }
        }

        Some(best)
    }
}

/// Per-edge penalty counters, symmetric.
#[derive(Debug)]
struct Penalties {
    size: usize,
    counts: Vec<u32>,
}

impl Penalties {
    fn new(size: usize) -> Self {
        Self {
            size,
            counts: vec![0; size * size],
        }
    }

    #[inline]
    fn get(&self, a: usize, b: usize) -> u32 {
        self.counts[a * self.size + b]
    }

    /// Raises the penalty of every maximal-utility edge of the tour.
    ///
    /// Returns `false` when no edge has positive utility.
    fn penalize(&mut self, costs: &CostMatrix, order: &[usize]) -> bool {
        let edges: Vec<(usize, usize)> = (0..order.len())
            .map(|k| (order[k], order[(k + 1) % order.len()]))
            .collect();

        let utility = |&(a, b): &(usize, usize)| {
            #[allow(clippy::cast_precision_loss)]
            let cost = costs.get(a, b) as f64;
            cost / (1.0 + f64::from(self.get(a, b)))
        };
        let max_utility = edges.iter().map(|edge| utility(edge)).fold(f64::NEG_INFINITY, f64::max);
        if max_utility <= 0.0 {
            return false;
        }

        let chosen: Vec<(usize, usize)> = edges
            .iter()
            .filter(|&edge| utility(edge) >= max_utility)
            .copied()
            .collect();
        for (a, b) in chosen {
            let forward = a * self.size + b;
            let backward = b * self.size + a;
            self.counts[forward] = self.counts[forward].saturating_add(1);
            if backward != forward {
                self.counts[backward] = self.counts[backward].saturating_add(1);
            }
        }
        true
    }
}

fn nearest_neighbour(costs: &CostMatrix, start: usize) -> Vec<usize> {
    let n = costs.size();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut current = start;
    visited[start] = true;
    order.push(start);

    while order.len() < n {
        let next = (0..n)
            .filter(|&node| !visited[node])
            .min_by_key(|&node| costs.get(current, node));
        let Some(next) = next else { break };
        visited[next] = true;
        order.push(next);
        current = next;
    }
    order
}

fn cycle_cost(costs: &CostMatrix, order: &[usize]) -> i64 {
    (0..order.len())
        .map(|k| costs.get(order[k], order[(k + 1) % order.len()]))
        .sum()
}

fn closed(order: &[usize]) -> Vec<usize> {
    let mut nodes = order.to_vec();
    if let Some(&first) = order.first() {
        nodes.push(first);
    }
    nodes
}

/// First-improvement 2-opt descent on the augmented cost.
///
/// Position 0 is fixed. Returns `false` if the deadline interrupted the descent.
fn two_opt(
    costs: &CostMatrix,
    penalties: &Penalties,
    lambda: f64,
    order: &mut [usize],
    deadline: Instant,
    rng: &mut StdRng,
) -> bool {
    let n = order.len();
    let augmented = |a: usize, b: usize| {
        #[allow(clippy::cast_precision_loss)]
        let cost = costs.get(a, b) as f64;
        cost + lambda * f64::from(penalties.get(a, b))
    };

    let rows = n - 1;
    let mut improved = true;
    while improved {
        improved = false;
        let offset = rng.gen_range(0..rows);

        for step in 0..rows {
            if Instant::now() >= deadline {
                return false;
            }
            let i = (offset + step) % rows;
            for j in i + 2..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let (a, b) = (order[i], order[i + 1]);
                let (c, d) = (order[j], order[(j + 1) % n]);
                let delta = augmented(a, c) + augmented(b, d) - augmented(a, b) - augmented(c, d);
                if delta < -IMPROVEMENT_EPSILON {
                    order[i + 1..=j].reverse();
                    improved = true;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_cycle() -> CostMatrix {
        CostMatrix::from_rows(&[
            vec![0, 1, 2, 1],
            vec![1, 0, 1, 2],
            vec![2, 1, 0, 1],
            vec![1, 2, 1, 0],
        ])
        .unwrap()
    }

    fn random_symmetric(size: usize, seed: u64) -> CostMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = vec![vec![0_i64; size]; size];
        for i in 0..size {
            for j in i + 1..size {
                let cost = rng.gen_range(1..100);
                rows[i][j] = cost;
                rows[j][i] = cost;
            }
        }
        CostMatrix::from_rows(&rows).unwrap()
    }

    fn brute_force(costs: &CostMatrix) -> i64 {
        fn permute(costs: &CostMatrix, rest: &mut Vec<usize>, k: usize, best: &mut i64) {
            if k == rest.len() {
                let mut nodes = vec![0];
                nodes.extend_from_slice(rest);
                nodes.push(0);
                *best = (*best).min(costs.walk_cost(&nodes));
                return;
            }
            for i in k..rest.len() {
                rest.swap(k, i);
                permute(costs, rest, k + 1, best);
                rest.swap(k, i);
            }
        }
        let mut rest: Vec<usize> = (1..costs.size()).collect();
        let mut best = i64::MAX;
        permute(costs, &mut rest, 0, &mut best);
        best
    }

    fn run(costs: &CostMatrix, start: usize, limit: Duration) -> (Option<Tour>, Vec<i64>) {
        let mut reported = Vec::new();
        let tour = GuidedLocalSearch::with_seed(7).solve(costs, start, limit, &mut |_, objective| {
            reported.push(objective);
            SearchCommand::Continue
        });
        (tour, reported)
    }

    #[test]
    fn test_square_cycle_has_cost_four() {
        let costs = square_cycle();
        let (tour, reported) = run(&costs, 0, Duration::from_millis(50));
        let tour = tour.unwrap();
        assert_eq!(tour.objective, 4);
        assert_eq!(tour.nodes.first(), Some(&0));
        assert_eq!(tour.nodes.last(), Some(&0));
        assert_eq!(costs.walk_cost(&tour.nodes), 4);
        assert!(!reported.is_empty());
        assert_eq!(brute_force(&costs), 4);
    }

    #[test]
    fn test_tour_visits_every_node_once() {
        let costs = random_symmetric(9, 3);
        let (tour, _) = run(&costs, 4, Duration::from_millis(50));
        let tour = tour.unwrap();
        assert_eq!(tour.nodes.len(), 10);
        assert_eq!(tour.nodes[0], 4);
        assert_eq!(tour.nodes[9], 4);
        let mut visited = tour.nodes[..9].to_vec();
        visited.sort_unstable();
        assert_eq!(visited, (0..9).collect::<Vec<_>>());
        assert_eq!(costs.walk_cost(&tour.nodes), tour.objective);
    }

    #[test]
    fn test_matches_brute_force_on_small_instances() {
        for (size, seed) in [(5, 1), (6, 2), (7, 3)] {
            let costs = random_symmetric(size, seed);
            let (tour, _) = run(&costs, 0, Duration::from_millis(300));
            assert_eq!(tour.unwrap().objective, brute_force(&costs), "size {size}, seed {seed}");
        }
    }

    #[test]
    fn test_zero_time_limit_yields_no_solution() {
        let (tour, reported) = run(&square_cycle(), 0, Duration::ZERO);
        assert!(tour.is_none());
        assert!(reported.is_empty());
    }

    #[test]
    fn test_callback_can_terminate() {
        let costs = random_symmetric(12, 9);
        let mut calls = 0;
        let tour = GuidedLocalSearch::with_seed(1).solve(&costs, 0, Duration::from_secs(30), &mut |_, _| {
            calls += 1;
            SearchCommand::Terminate
        });
        assert_eq!(calls, 1);
        assert!(!tour.unwrap().exhausted);
    }

    #[test]
    fn test_zero_cost_instance_ends_before_deadline() {
        let costs = CostMatrix::from_vec(5, vec![0; 25]);
        let started = Instant::now();
        let (tour, reported) = run(&costs, 0, Duration::from_secs(5));
        let tour = tour.unwrap();
        assert!(tour.exhausted);
        assert_eq!(tour.objective, 0);
        assert_eq!(reported, vec![0]);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_deadline_is_not_exhaustion() {
        let (tour, _) = run(&random_symmetric(10, 4), 0, Duration::from_millis(30));
        assert!(!tour.unwrap().exhausted);
    }

    #[test]
    fn test_tiny_instances() {
        let single = CostMatrix::from_rows(&[vec![0]]).unwrap();
        let (tour, _) = run(&single, 0, Duration::from_millis(10));
        assert_eq!(tour.unwrap().nodes, vec![0, 0]);

        let pair = CostMatrix::from_rows(&[vec![0, 5], vec![5, 0]]).unwrap();
        let (tour, _) = run(&pair, 1, Duration::from_millis(10));
        assert_eq!(tour.unwrap(), Tour { nodes: vec![1, 0, 1], objective: 10, exhausted: true });
    }

    #[test]
    fn test_reported_objectives_match_tours() {
        let costs = random_symmetric(8, 5);
        let mut mismatches = 0;
        GuidedLocalSearch::with_seed(3).solve(&costs, 0, Duration::from_millis(30), &mut |nodes, objective| {
            if costs.walk_cost(nodes) != objective {
                mismatches += 1;
            }
            SearchCommand::Continue
        });
        assert_eq!(mismatches, 0);
    }
}
