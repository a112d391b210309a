//! Candidate augmentation from jointly tight facets.
//!
//! Summing valid inequalities gives another valid inequality. Sums of facets
//! that are tight on a common feasible point are tight there too and often
//! cut away infeasible points that no single facet excludes alone, which can
//! shrink the final cover.

use std::collections::HashSet;

use itertools::Itertools;
use log::debug;
use sbox_core::{PointSet, TransitionSet};

use crate::inequality::Inequality;

/// Extra candidates formed from `arity`-sized sums of `base`.
///
/// For every feasible point, each combination of `arity` base members tight
/// at that point is summed and gcd-reduced. A sum is kept when it excludes at
/// least one infeasible point, its exclusion set is not contained in that of
/// a single base member, and it is not already present. Base members
/// themselves are never returned. Arity below 2 yields nothing.
pub fn augment(base: &[Inequality], transitions: &TransitionSet, arity: usize) -> Vec<Inequality> {
    if arity < 2 || base.len() < arity {
        return Vec::new();
    }
    let infeasible = transitions.infeasible();
    let base_excluded: Vec<PointSet> = base.iter().map(|ineq| ineq.excluded(infeasible)).collect();

    let mut seen_keys: HashSet<Vec<usize>> = HashSet::new();
    let mut known: HashSet<Inequality> = base.iter().cloned().collect();
    let mut out = Vec::new();

    for point in transitions.feasible().iter() {
        let tight: Vec<usize> = base
            .iter()
            .enumerate()
            .filter(|(_, ineq)| ineq.is_tight(point))
            .map(|(idx, _)| idx)
            .collect();
        if tight.len() < arity {
            continue;
        }
        // `combinations` yields indices in ascending order, so each key is sorted.
        for key in tight.into_iter().combinations(arity) {
            if !seen_keys.insert(key.clone()) {
                continue;
            }
            let mut members = key.iter().map(|&idx| &base[idx]);
            let Some(first) = members.next() else {
                continue;
            };
            let candidate = members
                .fold(first.clone(), |acc, ineq| acc.sum(ineq))
                .normalized();
            if known.contains(&candidate) {
                continue;
            }
            let excluded = candidate.excluded(infeasible);
            if excluded.is_empty() || base_excluded.iter().any(|b| excluded.is_subset(b)) {
                continue;
            }
            known.insert(candidate.clone());
            out.push(candidate);
        }
    }
    debug!(
        "augmentation: {} base, arity {}, {} keys, {} new",
        base.len(),
        arity,
        seen_keys.len(),
        out.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::enumerate_facets;
    use sbox_core::{catalog, Point, PropertyTable, TableKind};

    fn transitions_of(bits: u32, feasible: &[Point]) -> TransitionSet {
        let half = bits / 2;
        let mut entries = vec![0i64; 1 << bits];
        for &p in feasible {
            entries[p as usize] = 1;
        }
        let table = PropertyTable::from_entries(half, bits - half, entries).unwrap();
        TransitionSet::from_table(&table)
    }

    #[test]
    fn sums_are_valid_and_new() {
        let sbox = catalog::builtin("printcipher").unwrap();
        let table = TableKind::Difference.generate(&sbox).unwrap();
        let transitions = TransitionSet::from_table(&table);
        let base = enumerate_facets(transitions.feasible(), None)
            .unwrap()
            .inequalities();
        let extra = augment(&base, &transitions, 2);
        for ineq in &extra {
            assert!(ineq.is_valid_on(transitions.feasible()), "{ineq}");
            assert!(!base.contains(ineq));
            let excluded = ineq.excluded(transitions.infeasible());
            assert!(!excluded.is_empty());
        }
        let unique: HashSet<&Inequality> = extra.iter().collect();
        assert_eq!(unique.len(), extra.len());
    }

    #[test]
    fn arity_below_two_is_a_no_op() {
        let transitions = transitions_of(2, &[0, 1, 2]);
        let base = vec![Inequality::new(vec![-1, -1], 1)];
        assert!(augment(&base, &transitions, 0).is_empty());
        assert!(augment(&base, &transitions, 1).is_empty());
    }

    #[test]
    fn sum_dominated_by_a_member_is_dropped() {
        // Feasible {00, 01, 10}: facets x0 >= 0, x1 >= 0, 1 - x0 - x1 >= 0.
        // Every pairwise sum excludes at most what 1 - x0 - x1 excludes.
        let transitions = transitions_of(2, &[0b00, 0b01, 0b10]);
        let base = enumerate_facets(transitions.feasible(), None)
            .unwrap()
            .inequalities();
        assert_eq!(base.len(), 3);
        assert!(augment(&base, &transitions, 2).is_empty());
    }
}
