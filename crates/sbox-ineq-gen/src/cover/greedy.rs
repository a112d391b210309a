//! Greedy cover selection with configurable tie-breaking.

use core::fmt;
use core::str::FromStr;

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use sbox_core::{PointSet, TransitionSet};
use serde::{Deserialize, Serialize};

use super::{Cover, CoverError, ExclusionMap};
use crate::inequality::{Inequality, InequalitySet};

/// Rule for choosing among equally scoring candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Lowest candidate index.
    #[default]
    First,
    /// Highest candidate index.
    Last,
    /// Lower median among the tied candidates, position `(k − 1) / 2` of `k`.
    Middle,
    /// Uniformly random, reproducible from `seed`.
    Random {
        /// ChaCha20 seed.
        seed: u64,
    },
}

impl TieBreak {
    /// Replaces the seed of a random rule; other rules are unchanged.
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            TieBreak::Random { .. } => TieBreak::Random { seed },
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TieBreak::First => "first",
            TieBreak::Last => "last",
            TieBreak::Middle => "middle",
            TieBreak::Random { .. } => "random",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreak::Random { seed } => write!(f, "random({seed})"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for TieBreak {
    type Err = String;

    /// Parses a rule name; `random` starts with seed 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            TieBreak::First,
            TieBreak::Last,
            TieBreak::Middle,
            TieBreak::Random { seed: 0 },
        ]
        .into_iter()
        .find(|rule| rule.name().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown tie-break rule '{s}'"))
    }
}

/// Selection state carried from one round to the next.
struct GreedyState {
    remaining: PointSet,
    available: Vec<bool>,
    chosen: Vec<usize>,
}

impl GreedyState {
    fn new(remaining: PointSet, candidates: usize) -> Self {
        Self {
            remaining,
            available: vec![true; candidates],
            chosen: Vec::new(),
        }
    }

    /// Size of `remaining ∩ excluded(c)` for every candidate still available.
    fn scores(&self, map: &ExclusionMap) -> Vec<usize> {
        (0..map.len())
            .into_par_iter()
            .map(|idx| {
                if self.available[idx] {
                    map.get(idx).intersection_len(&self.remaining)
                } else {
                    0
                }
            })
            .collect()
    }

    fn select(mut self, idx: usize, map: &ExclusionMap) -> Self {
        self.remaining = self.remaining.difference(map.get(idx));
        self.available[idx] = false;
        self.chosen.push(idx);
        self
    }
}

struct TiePicker {
    rule: TieBreak,
    rng: Option<ChaCha20Rng>,
}

impl TiePicker {
    fn new(rule: TieBreak) -> Self {
        let rng = match rule {
            TieBreak::Random { seed } => {
                let mut seed_bytes = [0u8; 32];
                seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
                Some(ChaCha20Rng::from_seed(seed_bytes))
            }
            _ => None,
        };
        Self { rule, rng }
    }

    /// Picks one of `tied`, which is non-empty and in ascending order.
    fn pick(&mut self, tied: &[usize]) -> usize {
        match (self.rule, self.rng.as_mut()) {
            (TieBreak::Last, _) => tied[tied.len() - 1],
            (TieBreak::Middle, _) => tied[(tied.len() - 1) / 2],
            (TieBreak::Random { .. }, Some(rng)) => tied[rng.gen_range(0..tied.len())],
            _ => tied[0],
        }
    }
}

/// Greedy cover of the infeasible points by `candidates`.
///
/// Each round picks an available candidate excluding the most remaining
/// points, resolving ties with `tie_break`. Selection stops once no candidate
/// excludes anything; points still remaining then make the cover incomplete.
pub fn greedy(
    candidates: &[Inequality],
    transitions: &TransitionSet,
    tie_break: TieBreak,
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
    let mut picker = TiePicker::new(tie_break);
    let mut state = GreedyState::new(infeasible.clone(), candidates.len());
    let mut rounds = 0usize;

    while !state.remaining.is_empty() {
        let scores = state.scores(&map);
        let best = scores.iter().copied().max().unwrap_or(0);
        if best == 0 {
            break;
        }
        let tied: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|&(_, &score)| score == best)
            .map(|(idx, _)| idx)
            .collect();
        let idx = picker.pick(&tied);
        rounds += 1;
        debug!(
            "greedy round {}: candidate {} excludes {} of {} ({} tied)",
            rounds,
            idx,
            best,
            state.remaining.len(),
            tied.len()
        );
        state = state.select(idx, &map);
    }

    if !state.remaining.is_empty() {
        return Err(CoverError::IncompleteCover {
            remaining: state.remaining.len(),
        });
    }
    let inequalities: InequalitySet = state
        .chosen
        .iter()
        .map(|&idx| candidates[idx].clone())
        .collect();
    Ok(Cover {
        inequalities,
        rounds,
        inexact_rounds: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbox_core::{PropertyTable, TransitionSet};

    fn two_bit_transitions(feasible: &[u32]) -> TransitionSet {
        let mut entries = vec![0i64; 4];
        for &p in feasible {
            entries[p as usize] = 1;
        }
        TransitionSet::from_table(&PropertyTable::from_entries(1, 1, entries).unwrap())
    }

    #[test]
    fn picks_largest_exclusion_first() {
        // Feasible {00}; infeasible {01, 10, 11}.
        let transitions = two_bit_transitions(&[0]);
        let candidates = vec![
            Inequality::new(vec![-1, 0], 0),
            Inequality::new(vec![-1, -1], 0),
            Inequality::new(vec![0, -1], 0),
        ];
        let cover = greedy(&candidates, &transitions, TieBreak::First).unwrap();
        assert_eq!(cover.rounds, 1);
        assert_eq!(cover.inequalities.as_slice(), &candidates[1..2]);
    }

    #[test]
    fn tie_break_rules_choose_different_candidates() {
        // Feasible {00, 11}; each candidate excludes one infeasible point.
        let transitions = two_bit_transitions(&[0b00, 0b11]);
        let candidates = vec![
            Inequality::new(vec![1, -1], 0),
            Inequality::new(vec![-1, 1], 0),
        ];
        let first = greedy(&candidates, &transitions, TieBreak::First).unwrap();
        let last = greedy(&candidates, &transitions, TieBreak::Last).unwrap();
        assert_eq!(first.inequalities.as_slice()[0], candidates[0]);
        assert_eq!(last.inequalities.as_slice()[0], candidates[1]);
        assert_eq!(first.rounds, 2);
    }

    #[test]
    fn middle_rule_takes_the_lower_median() {
        let transitions = two_bit_transitions(&[0b00, 0b11]);
        let candidates = vec![
            Inequality::new(vec![1, -1], 0),
            Inequality::new(vec![-1, 1], 0),
        ];
        let cover = greedy(&candidates, &transitions, TieBreak::Middle).unwrap();
        assert_eq!(cover.inequalities.as_slice()[0], candidates[0]);

        let mut picker = TiePicker::new(TieBreak::Middle);
        assert_eq!(picker.pick(&[4]), 4);
        assert_eq!(picker.pick(&[1, 5, 6, 9]), 5);
        assert_eq!(picker.pick(&[1, 5, 9]), 5);
    }

    #[test]
    fn random_rule_is_reproducible() {
        let transitions = two_bit_transitions(&[0b00, 0b11]);
        let candidates = vec![
            Inequality::new(vec![1, -1], 0),
            Inequality::new(vec![-1, 1], 0),
        ];
        let rule = TieBreak::Random { seed: 11 };
        let a = greedy(&candidates, &transitions, rule).unwrap();
        let b = greedy(&candidates, &transitions, rule).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn uncoverable_points_fail() {
        let transitions = two_bit_transitions(&[0]);
        let candidates = vec![Inequality::new(vec![-1, 0], 0)];
        assert_eq!(
            greedy(&candidates, &transitions, TieBreak::First),
            Err(CoverError::IncompleteCover { remaining: 1 })
        );
        assert_eq!(
            greedy(&[], &transitions, TieBreak::First),
            Err(CoverError::EmptyPool { infeasible: 3 })
        );
    }

    #[test]
    fn parses_rule_names() {
        assert_eq!("middle".parse::<TieBreak>(), Ok(TieBreak::Middle));
        assert_eq!(
            "random".parse::<TieBreak>().map(|r| r.with_seed(5)),
            Ok(TieBreak::Random { seed: 5 })
        );
        assert!("coin".parse::<TieBreak>().is_err());
    }
}
