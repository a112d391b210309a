//! Cover selection: choosing a small subset of valid inequalities whose
//! exclusion sets together contain every infeasible point.

mod direct;
mod exact;
mod greedy;
mod search;

use core::fmt;
use core::str::FromStr;

use sbox_core::PointSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inequality::{Inequality, InequalitySet};
use crate::milp::SolveError;

pub use direct::{direct_search, DirectSearchBounds};
pub use exact::exact;
pub use greedy::{greedy, TieBreak};
pub use search::search_and_reduce;

/// Failures of cover selection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoverError {
    /// No candidate excludes some of the remaining infeasible points.
    #[error("cover is incomplete: {remaining} infeasible points cannot be excluded")]
    IncompleteCover {
        /// Points left uncovered.
        remaining: usize,
    },
    /// A direct search round found no inequality excluding a remaining point.
    #[error("direct search stalled with {remaining} infeasible points left")]
    StalledSearch {
        /// Points left uncovered.
        remaining: usize,
    },
    /// Infeasible points exist but there are no candidates at all.
    #[error("no candidate inequalities for {infeasible} infeasible points")]
    EmptyPool {
        /// Infeasible points.
        infeasible: usize,
    },
    /// The integer program has no solution.
    #[error("cover program is infeasible")]
    SolverInfeasible,
    /// The integer program ran out of time.
    #[error("cover program timed out")]
    SolverTimeout,
    /// Any other solver failure.
    #[error(transparent)]
    Solver(SolveError),
}

impl From<SolveError> for CoverError {
    fn from(err: SolveError) -> Self {
        match err {
            SolveError::Infeasible => CoverError::SolverInfeasible,
            SolveError::Timeout { .. } => CoverError::SolverTimeout,
            other => CoverError::Solver(other),
        }
    }
}

/// Selection strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Repeatedly pick the candidate excluding the most remaining points.
    Greedy,
    /// Minimum set cover over the candidate pool.
    #[default]
    Exact,
    /// Search one optimal inequality per round with an integer program.
    Direct,
    /// Collect inequalities with an integer program, then reduce exactly.
    SearchReduce,
}

impl Strategy {
    /// All strategies.
    pub const ALL: [Strategy; 4] = [
        Strategy::Greedy,
        Strategy::Exact,
        Strategy::Direct,
        Strategy::SearchReduce,
    ];

    /// Short name used in configs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Greedy => "greedy",
            Strategy::Exact => "exact",
            Strategy::Direct => "direct",
            Strategy::SearchReduce => "search-reduce",
        }
    }

    /// Returns true if the strategy selects from a facet candidate pool.
    pub fn uses_candidates(&self) -> bool {
        matches!(self, Strategy::Greedy | Strategy::Exact)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown strategy '{s}'"))
    }
}

/// Selected inequalities and the number of selection rounds it took.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cover {
    /// Chosen inequalities in selection order.
    pub inequalities: InequalitySet,
    /// Rounds (greedy picks, direct searches, or solver calls).
    pub rounds: usize,
    /// Direct search rounds whose program stopped at a solver limit; their
    /// inequality is the best found, not a proven optimum.
    pub inexact_rounds: usize,
}

/// Infeasible points excluded by each candidate.
#[derive(Clone, Debug)]
pub struct ExclusionMap {
    sets: Vec<PointSet>,
}

impl ExclusionMap {
    /// Computes the exclusion set of every candidate over `infeasible`.
    pub fn new(candidates: &[Inequality], infeasible: &PointSet) -> Self {
        Self {
            sets: candidates
                .iter()
                .map(|ineq| ineq.excluded(infeasible))
                .collect(),
        }
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns true if there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Exclusion set of candidate `idx`.
    pub fn get(&self, idx: usize) -> &PointSet {
        &self.sets[idx]
    }

    /// Points of `target` excluded by no candidate.
    pub fn uncovered(&self, target: &PointSet) -> PointSet {
        self.sets
            .iter()
            .fold(target.clone(), |rest, set| rest.difference(set))
    }
}
