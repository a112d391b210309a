//! Search and reduce: collect inequalities by repeated search, then reduce.

use std::collections::HashSet;

use log::{debug, warn};
use sbox_core::{Point, TransitionSet};

use super::direct::{DirectSearchBounds, SearchModel};
use super::{exact, Cover, CoverError, ExclusionMap};
use crate::inequality::Inequality;
use crate::milp::{Cmp, SolveError, SolveLimits};

/// Collects inequalities from repeated direct searches, then reduces them
/// with the exact cover.
///
/// The search program ranges over all infeasible points. After each solution
/// with indicator set `N`, two cuts are added: `Σ_{v∈N} y_v ≤ |N| − 1` and
/// `Σ_{v∉N} y_v ≥ 1`, so every later solution excludes a point outside `N`.
/// Collection ends when the program becomes infeasible or after
/// `max_rounds` solutions. A round stopped by a solver limit keeps its best
/// solution when `limits` allow it and counts as inexact; a limit reached
/// with no solution at all also ends collection.
pub fn search_and_reduce(
    transitions: &TransitionSet,
    bounds: &DirectSearchBounds,
    limits: &SolveLimits,
    max_rounds: usize,
) -> Result<Cover, CoverError> {
    let infeasible = transitions.infeasible();
    if infeasible.is_empty() {
        return Ok(Cover::default());
    }

    let mut search = SearchModel::new(transitions.feasible(), infeasible, bounds);
    let mut pool: Vec<Inequality> = Vec::new();
    let mut known: HashSet<Inequality> = HashSet::new();
    let mut rounds = 0usize;
    let mut inexact_rounds = 0usize;

    loop {
        if rounds == max_rounds {
            warn!("search and reduce stopped at the round cap ({max_rounds})");
            break;
        }
        let round = match search.solve(limits) {
            Ok(round) => round,
            Err(CoverError::SolverInfeasible) => break,
            Err(CoverError::SolverTimeout)
            | Err(CoverError::Solver(SolveError::NodeLimit { .. }))
                if limits.keep_incumbent =>
            {
                warn!(
                    "search and reduce: round {} found nothing within the solver limits",
                    rounds + 1
                );
                inexact_rounds += 1;
                break;
            }
            Err(err) => return Err(err),
        };
        rounds += 1;
        if !round.proven {
            inexact_rounds += 1;
        }
        debug!(
            "search round {}: {} with {} indicated points",
            rounds,
            round.inequality,
            round.indicated.len()
        );
        let ineq = round.inequality.normalized();
        if !ineq.excluded(infeasible).is_empty() && known.insert(ineq.clone()) {
            pool.push(ineq);
        }
        add_no_good_cuts(&mut search, &round.indicated);
    }

    let map = ExclusionMap::new(&pool, infeasible);
    let uncovered = map.uncovered(infeasible);
    if !uncovered.is_empty() {
        return Err(CoverError::IncompleteCover {
            remaining: uncovered.len(),
        });
    }
    debug!("search and reduce: {} collected over {} rounds", pool.len(), rounds);
    let reduced = exact(&pool, transitions, limits)?;
    Ok(Cover {
        inequalities: reduced.inequalities,
        rounds,
        inexact_rounds,
    })
}

fn add_no_good_cuts(search: &mut SearchModel, selected: &[Point]) {
    let chosen: HashSet<Point> = selected.iter().copied().collect();
    let (inside, outside): (Vec<_>, Vec<_>) = search
        .indicators
        .iter()
        .partition(|(point, _)| chosen.contains(point));
    let size = inside.len() as f64;
    search
        .model
        .add_constraint(inside.iter().map(|&&(_, y)| (y, 1.0)), Cmp::Le, size - 1.0);
    search
        .model
        .add_constraint(outside.iter().map(|&&(_, y)| (y, 1.0)), Cmp::Ge, 1.0);
}
