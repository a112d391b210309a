//! Soundness and completeness checks for inequality sets.

use sbox_core::{Point, TransitionSet};
use thiserror::Error;

use crate::inequality::{Inequality, InequalitySet};

/// Why an inequality set does not describe the feasible points exactly.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A feasible point violates a member.
    #[error("feasible point {point:#x} violates {inequality}")]
    Soundness {
        /// Offending feasible point.
        point: Point,
        /// First violated member.
        inequality: Inequality,
    },
    /// An infeasible point satisfies every member.
    #[error("infeasible point {point:#x} is accepted")]
    Completeness {
        /// First accepted infeasible point.
        point: Point,
    },
}

/// Checks that `set` accepts exactly the feasible points of `transitions`.
///
/// Points are checked in ascending order; soundness is checked first.
pub fn validate(transitions: &TransitionSet, set: &InequalitySet) -> Result<(), ValidationError> {
    for point in transitions.feasible().iter() {
        if let Some(ineq) = set.iter().find(|ineq| ineq.excludes(point)) {
            return Err(ValidationError::Soundness {
                point,
                inequality: ineq.clone(),
            });
        }
    }
    match transitions.infeasible().iter().find(|&p| set.accepts(p)) {
        Some(point) => Err(ValidationError::Completeness { point }),
        None => Ok(()),
    }
}

/// Positions of members that exclude no infeasible point.
pub fn useless_members(transitions: &TransitionSet, set: &InequalitySet) -> Vec<usize> {
    let infeasible = transitions.infeasible();
    set.iter()
        .enumerate()
        .filter(|(_, ineq)| infeasible.iter().all(|p| ineq.admits(p)))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbox_core::PropertyTable;

    // Feasible {00, 01, 10}.
    fn at_most_one() -> TransitionSet {
        let table = PropertyTable::from_entries(1, 1, vec![1, 1, 1, 0]).unwrap();
        TransitionSet::from_table(&table)
    }

    #[test]
    fn exact_description_passes() {
        let set = InequalitySet::from(vec![Inequality::new(vec![-1, -1], 1)]);
        assert_eq!(validate(&at_most_one(), &set), Ok(()));
    }

    #[test]
    fn reports_first_violation() {
        let unsound = InequalitySet::from(vec![Inequality::new(vec![-1, 0], 0)]);
        assert_eq!(
            validate(&at_most_one(), &unsound),
            Err(ValidationError::Soundness {
                point: 0b10,
                inequality: Inequality::new(vec![-1, 0], 0),
            })
        );
        assert_eq!(
            validate(&at_most_one(), &InequalitySet::new()),
            Err(ValidationError::Completeness { point: 0b11 })
        );
    }

    #[test]
    fn finds_members_without_effect() {
        let set = InequalitySet::from(vec![
            Inequality::new(vec![1, 0], 0),
            Inequality::new(vec![-1, -1], 1),
        ]);
        assert_eq!(useless_members(&at_most_one(), &set), vec![0]);
    }
}
