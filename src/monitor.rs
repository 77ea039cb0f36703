//! Early-stop controller for the tour search.
//!
//! The monitor sees every solution the optimizer reports and keeps an append-only
//! log of them together with the best-known solution at each step. Once the log
//! covers more than the improvement window, it compares the best objective at the
//! start of the window with the current best:
//!
//! ```text
//! ratio = (baseline_best - current_best) / (first_best - current_best)
//! ```
//!
//! A ratio below the configured improvement size means the last window contributed
//! a negligible share of everything gained so far, and the search is told to stop.
//! Nothing here is synchronized: the optimizer calls back on its own thread.

use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Answer to the optimizer after each reported solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchCommand {
    #[default]
    Continue,
    Terminate,
}

/// Why the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// The monitor saw too little improvement over its trailing window.
    ImprovementPlateau,
    /// The optimizer ran until its absolute deadline.
    Deadline,
    /// The optimizer ended on its own, with nothing left to improve.
    Exhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::ImprovementPlateau => write!(f, "improvement timeout"),
            StopReason::Deadline => write!(f, "timeout"),
            StopReason::Exhausted => write!(f, "exhaustion"),
        }
    }
}

/// One reported solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub nodes: Vec<usize>,
    pub objective: i64,
    /// Time since the search started.
    pub elapsed: Duration,
}

/// One entry of the objective history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectivePoint {
    pub elapsed_secs: f64,
    pub objective: i64,
    pub best_objective: i64,
}

#[derive(Debug, Clone)]
pub struct SearchMonitor {
    improvement_size: f64,
    improvement_timeout: Duration,
    solutions: Vec<Solution>,
    /// Index into `solutions` of the best-known solution after each step.
    best_known: Vec<usize>,
    stopped: bool,
}

impl SearchMonitor {
    /// `improvement_size` is a fraction in [0, 1], `improvement_timeout` the length
    /// of the trailing comparison window.
    #[must_use]
    pub fn new(improvement_size: f64, improvement_timeout: Duration) -> Self {
        Self {
            improvement_size,
            improvement_timeout,
            solutions: Vec::new(),
            best_known: Vec::new(),
            stopped: false,
        }
    }

    /// Records `solution` and decides whether the search should go on.
    ///
    /// Solutions must arrive in non-decreasing `elapsed` order. An objective equal to
    /// the best known replaces it, so ties favour the newest tour.
    pub fn on_solution(&mut self, solution: Solution) -> SearchCommand {
        debug!(
            "Solution {} at {:.3}s: objective {}",
            self.solutions.len(),
            solution.elapsed.as_secs_f64(),
            solution.objective
        );

        let now = solution.elapsed;
        let index = self.solutions.len();
        let best = match self.best() {
            Some(best) if best.objective < solution.objective => self.best_known[index - 1],
            _ => index,
        };
        self.solutions.push(solution);
        self.best_known.push(best);

        if self.stopped {
            return SearchCommand::Terminate;
        }
        if self.window_is_stale(now) {
            info!(
                "Less than {:.1}% improvement in the last {:.1}s, stopping search",
                self.improvement_size * 100.0,
                self.improvement_timeout.as_secs_f64()
            );
            self.stopped = true;
            return SearchCommand::Terminate;
        }
        SearchCommand::Continue
    }

    fn window_is_stale(&self, now: Duration) -> bool {
        let Some(threshold) = now.checked_sub(self.improvement_timeout) else {
            return false;
        };
        let covered = self.solutions.partition_point(|s| s.elapsed <= threshold);
        if covered == 0 {
            return false;
        }

        let (Some(first), Some(current)) = (self.solutions.first(), self.best()) else {
            return false;
        };
        let baseline = &self.solutions[self.best_known[covered - 1]];

        let total = first.objective - current.objective;
        if total == 0 {
            return false;
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = (baseline.objective - current.objective) as f64 / total as f64;
        ratio < self.improvement_size
    }

    /// Best-known solution so far.
    #[must_use]
    pub fn best(&self) -> Option<&Solution> {
        self.best_known.last().map(|&index| &self.solutions[index])
    }

    #[must_use]
    pub fn stop_reason(&self) -> StopReason {
        if self.stopped {
            StopReason::ImprovementPlateau
        } else {
            StopReason::Deadline
        }
    }

    #[must_use]
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    /// `(elapsed, objective, best objective)` for every reported solution.
    #[must_use]
    pub fn objective_history(&self) -> Vec<ObjectivePoint> {
        self.solutions
            .iter()
            .zip(&self.best_known)
            .map(|(solution, &best)| ObjectivePoint {
                elapsed_secs: solution.elapsed.as_secs_f64(),
                objective: solution.objective,
                best_objective: self.solutions[best].objective,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(objective: i64, secs: u64) -> Solution {
        Solution {
            nodes: vec![0, 1, 2, 0],
            objective,
            elapsed: Duration::from_secs(secs),
        }
    }

    fn monitor() -> SearchMonitor {
        SearchMonitor::new(0.05, Duration::from_secs(3))
    }

    #[test]
    fn test_improving_then_flat_stops_after_window() {
        let mut monitor = monitor();
        let events = [(100, 0), (90, 1), (80, 2), (70, 3), (70, 4), (70, 5), (70, 6), (70, 7)];

        let mut stopped_at = None;
        for (objective, secs) in events {
            if monitor.on_solution(solution(objective, secs)) == SearchCommand::Terminate {
                stopped_at = Some(secs);
                break;
            }
        }

        assert_eq!(stopped_at, Some(6));
        assert_eq!(monitor.stop_reason(), StopReason::ImprovementPlateau);
        assert_eq!(monitor.stop_reason().to_string(), "improvement timeout");
        assert_eq!(monitor.best().map(|s| s.objective), Some(70));
    }

    #[test]
    fn test_continuous_improvement_never_stops() {
        let mut monitor = monitor();
        for secs in 0..=20 {
            let objective = 1000 - 10 * i64::try_from(secs).unwrap();
            assert_eq!(monitor.on_solution(solution(objective, secs)), SearchCommand::Continue);
        }
        assert_eq!(monitor.stop_reason(), StopReason::Deadline);
        assert_eq!(monitor.stop_reason().to_string(), "timeout");
    }

    #[test]
    fn test_no_action_before_window_elapses() {
        let mut monitor = monitor();
        assert_eq!(monitor.on_solution(solution(100, 0)), SearchCommand::Continue);
        assert_eq!(monitor.on_solution(solution(50, 1)), SearchCommand::Continue);
        assert_eq!(monitor.on_solution(solution(50, 2)), SearchCommand::Continue);
    }

    #[test]
    fn test_no_improvement_at_all_skips_check() {
        let mut monitor = monitor();
        for secs in 0..10 {
            assert_eq!(monitor.on_solution(solution(42, secs)), SearchCommand::Continue);
        }
    }

    #[test]
    fn test_ties_adopt_newest_solution() {
        let mut monitor = monitor();
        monitor.on_solution(solution(10, 0));
        let mut tie = solution(10, 1);
        tie.nodes = vec![0, 2, 1, 0];
        monitor.on_solution(tie.clone());
        monitor.on_solution(solution(11, 2));
        assert_eq!(monitor.best(), Some(&tie));
    }

    #[test]
    fn test_worse_solutions_keep_best() {
        let mut monitor = monitor();
        monitor.on_solution(solution(50, 0));
        monitor.on_solution(solution(80, 1));
        let history = monitor.objective_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].objective, 80);
        assert_eq!(history[1].best_objective, 50);
        assert_eq!(monitor.solutions().len(), 2);
    }
}
