//! Direct inequality search: one integer program per round.

use log::{debug, warn};
use sbox_core::{coordinate, Point, PointSet, TransitionSet};
use serde::{Deserialize, Serialize};

use super::{Cover, CoverError};
use crate::inequality::{Inequality, InequalitySet};
use crate::milp::{Cmp, Model, Sense, SolveLimits, Var};

/// Box bounds for the inequality searched by the direct strategies:
/// `a_i ∈ [−coefficient, coefficient]`, `b ∈ [0, constant]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectSearchBounds {
    /// Bound on coefficient magnitudes.
    pub coefficient: i64,
    /// Upper bound on the constant.
    pub constant: i64,
}

impl DirectSearchBounds {
    /// Bounds `2^(m−1)` and `2^m` for an `m`-bit input.
    ///
    /// These are a rule of thumb, not a guarantee that the optimum is
    /// representable.
    pub fn heuristic(input_bits: u32) -> Self {
        let bounds = Self {
            coefficient: 1i64 << input_bits.saturating_sub(1),
            constant: 1i64 << input_bits,
        };
        warn!(
            "using heuristic direct search bounds A = {}, B = {}",
            bounds.coefficient, bounds.constant
        );
        bounds
    }

    /// Big-M constant `w·A + B + 1` for a point with `w` one bits, the
    /// largest value `a·p + b + 1` can take within the bounds.
    pub fn big_m(&self, weight: u32) -> i64 {
        i64::from(weight) * self.coefficient + self.constant + 1
    }
}

/// Result of one search program.
pub(super) struct SearchRound {
    /// Found inequality, not yet normalised.
    pub inequality: Inequality,
    /// Target points whose indicator is set.
    pub indicated: Vec<Point>,
    /// False if a solver limit stopped the search before optimality was
    /// proven.
    pub proven: bool,
}

/// One direct search program: inequality variables, validity rows on the
/// feasible points and an indicator `y_p` per target point.
pub(super) struct SearchModel {
    pub model: Model,
    coeffs: Vec<Var>,
    constant: Var,
    pub indicators: Vec<(Point, Var)>,
}

impl SearchModel {
    /// `y_p = 1` forces `a·p + b ≤ −1`; the objective maximises `Σ y_p`.
    pub fn new(feasible: &PointSet, targets: &PointSet, bounds: &DirectSearchBounds) -> Self {
        let bits = feasible.bits();
        let dims = bits as usize;

        let mut model = Model::new();
        let coeffs: Vec<Var> = (0..dims)
            .map(|_| model.add_integer(-bounds.coefficient, bounds.coefficient))
            .collect();
        let constant = model.add_integer(0, bounds.constant);

        let row = |point: Point| {
            coeffs
                .iter()
                .enumerate()
                .map(move |(i, &var)| (var, coordinate(point, bits, i) as f64))
                .chain(std::iter::once((constant, 1.0)))
        };
        for point in feasible.iter() {
            model.add_constraint(row(point), Cmp::Ge, 0.0);
        }
        let mut indicators = Vec::with_capacity(targets.len());
        for point in targets.iter() {
            let y = model.add_binary();
            let big_m = bounds.big_m(point.count_ones()) as f64;
            // a·p + b − M(1 − y) ≤ −1
            model.add_constraint(
                row(point).chain(std::iter::once((y, big_m))),
                Cmp::Le,
                big_m - 1.0,
            );
            indicators.push((point, y));
        }
        model.set_objective(Sense::Maximize, indicators.iter().map(|&(_, y)| (y, 1.0)));
        Self {
            model,
            coeffs,
            constant,
            indicators,
        }
    }

    /// Solves the program; see [`SolveLimits::keep_incumbent`] for rounds
    /// stopped by a limit.
    pub fn solve(&self, limits: &SolveLimits) -> Result<SearchRound, CoverError> {
        let solution = self.model.solve(limits)?;
        let inequality = Inequality::new(
            self.coeffs.iter().map(|&var| solution.value(var)).collect(),
            solution.value(self.constant),
        );
        let indicated = self
            .indicators
            .iter()
            .filter(|&&(_, y)| solution.value(y) == 1)
            .map(|&(point, _)| point)
            .collect();
        Ok(SearchRound {
            inequality,
            indicated,
            proven: solution.is_optimal(),
        })
    }
}

/// Builds a cover one optimal inequality at a time.
///
/// Each round solves a program over the still remaining infeasible points for
/// a valid inequality within `bounds` that excludes as many of them as
/// possible. A round excluding nothing while points remain is a stalled
/// search. When `limits` keep the incumbent, a round stopped by a limit uses
/// its best inequality and is counted in [`Cover::inexact_rounds`].
pub fn direct_search(
    transitions: &TransitionSet,
    bounds: &DirectSearchBounds,
    limits: &SolveLimits,
) -> Result<Cover, CoverError> {
    let mut remaining = transitions.infeasible().clone();
    let mut inequalities = InequalitySet::new();
    let mut rounds = 0usize;
    let mut inexact_rounds = 0usize;

    while !remaining.is_empty() {
        let search = SearchModel::new(transitions.feasible(), &remaining, bounds);
        let round = search.solve(limits)?;
        rounds += 1;
        if !round.proven {
            inexact_rounds += 1;
        }
        let ineq = round.inequality;
        let excluded = ineq.excluded(&remaining);
        debug!(
            "direct search round {}: {} excludes {} of {}{}",
            rounds,
            ineq,
            excluded.len(),
            remaining.len(),
            if round.proven { "" } else { " (limit reached)" }
        );
        if excluded.is_empty() {
            return Err(CoverError::StalledSearch {
                remaining: remaining.len(),
            });
        }
        remaining = remaining.difference(&excluded);
        inequalities.push(ineq.normalized());
    }
    Ok(Cover {
        inequalities,
        rounds,
        inexact_rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbox_core::{catalog, TableKind};

    #[test]
    fn heuristic_bounds_scale_with_input_width() {
        let bounds = DirectSearchBounds::heuristic(4);
        assert_eq!(bounds.coefficient, 8);
        assert_eq!(bounds.constant, 16);
        assert_eq!(bounds.big_m(8), 81);
        assert_eq!(bounds.big_m(1), 25);
    }

    #[test]
    fn covers_the_low_bit_swap() {
        let sbox = catalog::builtin("swap2").unwrap();
        let table = TableKind::Difference.generate(&sbox).unwrap();
        let transitions = TransitionSet::from_table(&table);
        let bounds = DirectSearchBounds {
            coefficient: 1,
            constant: 1,
        };
        let cover = direct_search(&transitions, &bounds, &SolveLimits::default()).unwrap();
        assert_eq!(cover.rounds, cover.inequalities.len());
        assert_eq!(
            cover.inequalities.accepted(4).iter().collect::<Vec<_>>(),
            transitions.feasible_points()
        );
    }

    #[test]
    fn one_round_on_a_four_bit_box() {
        let sbox = catalog::builtin("present").unwrap();
        let table = TableKind::Difference.generate(&sbox).unwrap();
        let transitions = TransitionSet::from_table(&table);
        let bounds = DirectSearchBounds {
            coefficient: 8,
            constant: 16,
        };
        let limits = SolveLimits {
            node_limit: Some(2_000),
            keep_incumbent: true,
            ..SolveLimits::default()
        };
        let search = SearchModel::new(transitions.feasible(), transitions.infeasible(), &bounds);
        let round = search.solve(&limits).unwrap();
        assert!(round.inequality.is_valid_on(transitions.feasible()));
        let excluded = round.inequality.excluded(transitions.infeasible());
        assert!(!round.indicated.is_empty());
        assert!(round.indicated.iter().all(|&p| excluded.contains(p)));
    }

    #[test]
    fn tight_bounds_stall() {
        // With every coefficient fixed to zero nothing can be excluded.
        let mut entries = vec![0i64; 4];
        entries[0b01] = 1;
        entries[0b10] = 1;
        let table = sbox_core::PropertyTable::from_entries(1, 1, entries).unwrap();
        let transitions = TransitionSet::from_table(&table);
        let bounds = DirectSearchBounds {
            coefficient: 0,
            constant: 1,
        };
        assert_eq!(
            direct_search(&transitions, &bounds, &SolveLimits::default()),
            Err(CoverError::StalledSearch { remaining: 2 })
        );
    }
}
