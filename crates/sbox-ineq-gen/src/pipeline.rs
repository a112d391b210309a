//! End-to-end generation jobs.

use core::fmt;
use std::time::{Duration, Instant};

use log::{info, warn};
use rayon::prelude::*;
use sbox_core::{SBox, SBoxError, TableKind, TransitionSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::augment::augment;
use crate::config::JobConfig;
use crate::cover::{self, Cover, CoverError, Strategy};
use crate::hull::{enumerate_facets, HullError};
use crate::inequality::InequalitySet;
use crate::validate::{useless_members, validate, ValidationError};

/// Failures of a single job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The property table could not be built.
    #[error(transparent)]
    SBox(#[from] SBoxError),
    /// Facet enumeration failed.
    #[error(transparent)]
    Hull(#[from] HullError),
    /// Cover selection failed.
    #[error(transparent)]
    Cover(#[from] CoverError),
    /// The selected set does not describe the feasible points.
    #[error("generated inequalities are invalid: {0}")]
    Validation(#[from] ValidationError),
}

/// Statistics of a finished job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// S-box name.
    pub name: String,
    /// Property table kind.
    pub table: TableKind,
    /// Cover strategy.
    pub strategy: Strategy,
    /// Number of infeasible points.
    pub infeasible: usize,
    /// Number of feasible points.
    pub feasible: usize,
    /// Hull facets, zero for the direct strategies.
    pub hull_facets: usize,
    /// Candidate pool size after augmentation, zero for the direct strategies.
    pub candidates: usize,
    /// Size of the final inequality set.
    pub inequalities: usize,
    /// Selection rounds.
    pub rounds: usize,
    /// Direct search rounds stopped at a solver limit.
    pub inexact_rounds: usize,
    /// Wall-clock time of the job.
    pub elapsed: Duration,
}

impl Summary {
    /// Column header matching the [`fmt::Display`] rows.
    pub fn header() -> String {
        format!(
            "{:<16} {:<10} {:<13} {:>6} {:>6} {:>6} {:>6} {:>6} {:>7} {:>10}",
            "sbox",
            "table",
            "strategy",
            "feas",
            "infeas",
            "facets",
            "cands",
            "ineqs",
            "inexact",
            "seconds"
        )
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:<10} {:<13} {:>6} {:>6} {:>6} {:>6} {:>6} {:>7} {:>10.3}",
            self.name,
            self.table,
            self.strategy,
            self.feasible,
            self.infeasible,
            self.hull_facets,
            self.candidates,
            self.inequalities,
            self.inexact_rounds,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Result of a successful job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// S-box name.
    pub name: String,
    /// Validated inequality set.
    pub inequalities: InequalitySet,
    /// Job statistics.
    pub summary: Summary,
}

impl JobOutcome {
    /// Serializes the outcome with `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserializes an outcome with `bincode`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Per S-box entry of a batch.
#[derive(Debug)]
pub struct JobReport {
    /// S-box name.
    pub name: String,
    /// Outcome or failure of the job.
    pub result: Result<JobOutcome, JobError>,
}

/// Runs every stage for one S-box and validates the result.
pub fn run_job(sbox: &SBox, config: &JobConfig) -> Result<JobOutcome, JobError> {
    let start = Instant::now();
    let table = config.table.generate(sbox)?;
    let transitions = TransitionSet::from_table(&table);
    info!(
        "{}: {} table, {} feasible, {} infeasible",
        sbox.name(),
        config.table,
        transitions.feasible().len(),
        transitions.infeasible().len()
    );

    let mut hull_facets = 0;
    let mut candidates_len = 0;
    let cover: Cover = match config.strategy {
        Strategy::Greedy | Strategy::Exact => {
            let hull = enumerate_facets(transitions.feasible(), Some(start + config.hull_timeout()))?;
            hull_facets = hull.facets().len();
            let mut candidates = hull.inequalities();
            let extra = augment(&candidates, &transitions, config.augment_arity);
            info!(
                "{}: {} facets, {} equations, {} augmented candidates",
                sbox.name(),
                hull_facets,
                hull.equations().len(),
                extra.len()
            );
            candidates.extend(extra);
            candidates_len = candidates.len();
            if config.strategy == Strategy::Greedy {
                cover::greedy(&candidates, &transitions, config.tie_break())?
            } else {
                cover::exact(&candidates, &transitions, &config.solve_limits())?
            }
        }
        Strategy::Direct => {
            let bounds = config.search_bounds(sbox.input_bits());
            cover::direct_search(&transitions, &bounds, &config.round_limits())?
        }
        Strategy::SearchReduce => {
            let bounds = config.search_bounds(sbox.input_bits());
            cover::search_and_reduce(
                &transitions,
                &bounds,
                &config.round_limits(),
                config.search_rounds,
            )?
        }
    };

    validate(&transitions, &cover.inequalities)?;
    let useless = useless_members(&transitions, &cover.inequalities);
    if !useless.is_empty() {
        warn!(
            "{}: {} selected inequalities exclude nothing (positions {:?})",
            sbox.name(),
            useless.len(),
            useless
        );
    }

    let summary = Summary {
        name: sbox.name().to_string(),
        table: config.table,
        strategy: config.strategy,
        infeasible: transitions.infeasible().len(),
        feasible: transitions.feasible().len(),
        hull_facets,
        candidates: candidates_len,
        inequalities: cover.inequalities.len(),
        rounds: cover.rounds,
        inexact_rounds: cover.inexact_rounds,
        elapsed: start.elapsed(),
    };
    if summary.inexact_rounds > 0 {
        warn!(
            "{}: {} of {} rounds kept a solution that was not proven optimal",
            sbox.name(),
            summary.inexact_rounds,
            summary.rounds
        );
    }
    info!(
        "{}: {} inequalities via {} in {} rounds ({:.3}s)",
        sbox.name(),
        summary.inequalities,
        config.strategy,
        summary.rounds,
        summary.elapsed.as_secs_f64()
    );
    Ok(JobOutcome {
        name: summary.name.clone(),
        inequalities: cover.inequalities,
        summary,
    })
}

/// Runs one job per S-box in parallel; failures are reported per job.
pub fn run_batch(sboxes: &[SBox], config: &JobConfig) -> Vec<JobReport> {
    sboxes
        .par_iter()
        .map(|sbox| JobReport {
            name: sbox.name().to_string(),
            result: run_job(sbox, config),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbox_core::catalog;

    #[test]
    fn outcome_survives_bincode() {
        let sbox = catalog::builtin("swap2").unwrap();
        let outcome = run_job(&sbox, &JobConfig::default()).unwrap();
        let bytes = outcome.to_bytes().unwrap();
        assert_eq!(JobOutcome::from_bytes(&bytes).unwrap(), outcome);
    }

    #[test]
    fn summary_row_lines_up_with_header() {
        let sbox = catalog::builtin("printcipher").unwrap();
        let outcome = run_job(&sbox, &JobConfig::default()).unwrap();
        let row = outcome.summary.to_string();
        assert_eq!(row.len(), Summary::header().len());
        assert!(row.starts_with("printcipher"));
    }

    #[test]
    fn batch_keeps_failures_separate() {
        let sboxes = vec![
            catalog::builtin("swap2").unwrap(),
            SBox::new("narrow", 2, 1, vec![0, 1, 1, 0]).unwrap(),
        ];
        let config = JobConfig {
            table: TableKind::Boomerang,
            ..JobConfig::default()
        };
        let reports = run_batch(&sboxes, &config);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].result.is_ok());
        assert!(matches!(
            reports[1].result,
            Err(JobError::SBox(SBoxError::NonBijective { .. }))
        ));
    }
}
