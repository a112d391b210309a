//! Exact minimum cover over a candidate pool.

use log::debug;
use sbox_core::TransitionSet;

use super::{Cover, CoverError, ExclusionMap};
use crate::inequality::Inequality;
use crate::milp::{Cmp, Model, Sense, SolveLimits};

/// Indices of candidates whose exclusion sets are non-empty, distinct and not
/// strictly contained in another candidate's set. The first of several equal
/// sets is kept.
fn undominated(map: &ExclusionMap) -> Vec<usize> {
    let mut order: Vec<usize> = (0..map.len()).filter(|&i| !map.get(i).is_empty()).collect();
    // Larger sets first, so a set can only be dominated by an earlier one.
    order.sort_by_key(|&i| (std::cmp::Reverse(map.get(i).len()), i));
    let mut kept: Vec<usize> = Vec::new();
    for idx in order {
        let set = map.get(idx);
        if kept.iter().all(|&k| !set.is_subset(map.get(k))) {
            kept.push(idx);
        }
    }
    kept.sort_unstable();
    kept
}

/// Minimum-size subset of `candidates` excluding every infeasible point.
///
/// Solved as a binary set cover program: one variable per undominated
/// candidate, one `≥ 1` row per infeasible point. A point no candidate
/// excludes makes the program infeasible. A solver limit is an error even
/// when `limits` ask to keep the incumbent.
pub fn exact(
    candidates: &[Inequality],
    transitions: &TransitionSet,
    limits: &SolveLimits,
) -> Result<Cover, CoverError> {
    let infeasible = transitions.infeasible();
    if infeasible.is_empty() {
        return Ok(Cover::default());
    }
    if candidates.is_empty() {
        return Err(CoverError::EmptyPool {
            infeasible: infeasible.len(),
        });
    }

    let map = ExclusionMap::new(candidates, infeasible);
    let kept = undominated(&map);
    debug!(
        "exact cover: {} candidates, {} after dominance, {} points",
        candidates.len(),
        kept.len(),
        infeasible.len()
    );

    let mut model = Model::new();
    let vars: Vec<_> = kept.iter().map(|_| model.add_binary()).collect();
    for point in infeasible.iter() {
        let terms = kept
            .iter()
            .zip(&vars)
            .filter(|&(&idx, _)| map.get(idx).contains(point))
            .map(|(_, &var)| (var, 1.0));
        model.add_constraint(terms, Cmp::Ge, 1.0);
    }
    model.set_objective(Sense::Minimize, vars.iter().map(|&var| (var, 1.0)));
    let strict = SolveLimits {
        keep_incumbent: false,
        ..*limits
    };
    let solution = model.solve(&strict)?;

    let inequalities = kept
        .iter()
        .zip(&vars)
        .filter(|&(_, &var)| solution.value(var) == 1)
        .map(|(&idx, _)| candidates[idx].clone())
        .collect();
    Ok(Cover {
        inequalities,
        rounds: 1,
        inexact_rounds: 0,
    })
}
