//! Small integer-program solver.
//!
//! Models have integer variables with finite bounds, linear rows and a
//! linear objective. `Model::solve` runs depth-first branch and bound over the
//! LP relaxation (see [`simplex`]), solving each node from the previous
//! node's basis, and reports infeasibility, time limits and node limits as
//! distinct errors. Because every variable is bounded, an unbounded outcome
//! cannot occur.

mod simplex;

use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use self::simplex::{LpError, LpStatus, Tableau};

const INTEGRALITY_EPS: f64 = 1e-6;
const ROW_EPS: f64 = 1e-6;

/// Handle to a model variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    /// Position of the variable in the model.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Row comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    /// `Σ ≤ rhs`
    Le,
    /// `Σ ≥ rhs`
    Ge,
    /// `Σ = rhs`
    Eq,
}

/// Optimisation direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sense {
    /// Minimise the objective.
    #[default]
    Minimize,
    /// Maximise the objective.
    Maximize,
}

#[derive(Clone, Debug)]
pub(crate) struct Constraint {
    terms: Vec<(usize, f64)>,
    cmp: Cmp,
    rhs: f64,
}

impl Constraint {
    fn holds(&self, values: &[i64]) -> bool {
        let lhs: f64 = self
            .terms
            .iter()
            .map(|&(j, a)| a * values[j] as f64)
            .sum();
        match self.cmp {
            Cmp::Le => lhs <= self.rhs + ROW_EPS,
            Cmp::Ge => lhs >= self.rhs - ROW_EPS,
            Cmp::Eq => (lhs - self.rhs).abs() <= ROW_EPS,
        }
    }
}

/// Resource limits for one solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolveLimits {
    /// Wall-clock budget for the whole branch and bound.
    pub time_limit: Option<Duration>,
    /// Maximum number of branch and bound nodes.
    pub node_limit: Option<usize>,
    /// Return the best solution found when a limit is reached instead of an
    /// error.
    pub keep_incumbent: bool,
}

/// Failures of [`Model::solve`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SolveError {
    /// No integer assignment satisfies the rows.
    #[error("integer program is infeasible")]
    Infeasible,
    /// The time limit expired.
    #[error("integer program timed out after {nodes} nodes")]
    Timeout {
        /// Nodes explored before the limit.
        nodes: usize,
    },
    /// The node limit was reached.
    #[error("integer program hit the node limit ({nodes} nodes)")]
    NodeLimit {
        /// Nodes explored.
        nodes: usize,
    },
    /// The LP relaxation misbehaved numerically.
    #[error("integer program failed numerically: {0}")]
    Numerical(String),
}

/// Integer assignment found by [`Model::solve`].
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    values: Vec<i64>,
    objective: f64,
    bound: f64,
    nodes: usize,
}

impl Solution {
    /// Value of `var`.
    pub fn value(&self, var: Var) -> i64 {
        self.values[var.0]
    }

    /// Objective value.
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Best objective any assignment can reach; equals [`Self::objective`]
    /// once the search is complete.
    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Returns true if no better assignment exists.
    pub fn is_optimal(&self) -> bool {
        (self.bound - self.objective).abs() <= INTEGRALITY_EPS
    }

    /// Branch and bound nodes explored.
    pub fn nodes(&self) -> usize {
        self.nodes
    }
}

/// Integer program under construction.
#[derive(Clone, Debug, Default)]
pub struct Model {
    lower: Vec<i64>,
    upper: Vec<i64>,
    constraints: Vec<Constraint>,
    objective: Vec<f64>,
    sense: Sense,
}

impl Model {
    /// Empty model (minimising the zero objective).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an integer variable in `[lower, upper]`.
    pub fn add_integer(&mut self, lower: i64, upper: i64) -> Var {
        self.lower.push(lower);
        self.upper.push(upper);
        self.objective.push(0.0);
        Var(self.lower.len() - 1)
    }

    /// Adds a 0/1 variable.
    pub fn add_binary(&mut self) -> Var {
        self.add_integer(0, 1)
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.lower.len()
    }

    /// Number of rows.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Adds the row `Σ coeff·var (cmp) rhs`.
    pub fn add_constraint<I>(&mut self, terms: I, cmp: Cmp, rhs: f64)
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        let terms = terms
            .into_iter()
            .filter(|&(_, a)| a != 0.0)
            .map(|(v, a)| (v.0, a))
            .collect();
        self.constraints.push(Constraint { terms, cmp, rhs });
    }

    /// Replaces the objective.
    pub fn set_objective<I>(&mut self, sense: Sense, terms: I)
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        self.sense = sense;
        self.objective.iter_mut().for_each(|c| *c = 0.0);
        for (v, a) in terms {
            self.objective[v.0] += a;
        }
    }

    /// Solves the model to optimality.
    ///
    /// With [`SolveLimits::keep_incumbent`] set, a limit reached after an
    /// integer solution was found returns that solution; its
    /// [`Solution::bound`] then shows how far from proven it is.
    pub fn solve(&self, limits: &SolveLimits) -> Result<Solution, SolveError> {
        let deadline = limits.time_limit.map(|t| Instant::now() + t);
        if self.lower.iter().zip(&self.upper).any(|(l, u)| l > u) {
            return Err(SolveError::Infeasible);
        }
        // Rows without terms are decided up front.
        if self
            .constraints
            .iter()
            .any(|row| row.terms.is_empty() && !row.holds(&[]))
        {
            return Err(SolveError::Infeasible);
        }

        let sign = match self.sense {
            Sense::Maximize => 1.0,
            Sense::Minimize => -1.0,
        };
        let costs: Vec<f64> = self.objective.iter().map(|c| sign * c).collect();
        let integral_objective = costs.iter().all(|c| c.fract() == 0.0);

        let root = Node {
            lower: self.lower.iter().map(|&l| l as f64).collect(),
            upper: self.upper.iter().map(|&u| u as f64).collect(),
            bound: f64::INFINITY,
        };
        let mut tableau = Tableau::new(&costs, &self.constraints, &root.lower, &root.upper);
        let mut stack = vec![root];
        let mut best: Option<(Vec<i64>, f64)> = None;
        let mut nodes = 0usize;

        while let Some(node) = stack.pop() {
            let limit = if deadline.is_some_and(|d| Instant::now() >= d) {
                Some(SolveError::Timeout { nodes })
            } else if limits.node_limit.is_some_and(|limit| nodes >= limit) {
                Some(SolveError::NodeLimit { nodes })
            } else {
                None
            };
            if let Some(err) = limit {
                let open = stack.iter().fold(node.bound, |acc, n| acc.max(n.bound));
                return stopped(best, open, sign, nodes, limits, err);
            }
            nodes += 1;

            tableau.set_bounds(&node.lower, &node.upper);
            match tableau.reoptimize(deadline) {
                Ok(LpStatus::Optimal) => {}
                Ok(LpStatus::Infeasible) => continue,
                Err(LpError::Timeout) => {
                    let open = stack.iter().fold(node.bound, |acc, n| acc.max(n.bound));
                    let err = SolveError::Timeout { nodes };
                    return stopped(best, open, sign, nodes, limits, err);
                }
                Err(err) => return Err(SolveError::Numerical(format!("{err:?}"))),
            }
            let values = tableau.values();
            let bound: f64 = values.iter().zip(&costs).map(|(x, c)| x * c).sum();
            let bound = if integral_objective {
                (bound + INTEGRALITY_EPS).floor()
            } else {
                bound
            };
            if let Some((_, incumbent)) = &best {
                if bound <= incumbent + INTEGRALITY_EPS {
                    continue;
                }
            }

            let branch = values
                .iter()
                .enumerate()
                .map(|(j, &v)| (j, v, (v - v.round()).abs()))
                .filter(|&(_, _, frac)| frac > INTEGRALITY_EPS)
                .max_by(|a, b| a.2.total_cmp(&b.2));
            match branch {
                None => {
                    let rounded: Vec<i64> = values.iter().map(|v| v.round() as i64).collect();
                    if !self.constraints.iter().all(|row| row.holds(&rounded)) {
                        return Err(SolveError::Numerical(
                            "rounded LP solution violates a row".into(),
                        ));
                    }
                    let objective: f64 = rounded
                        .iter()
                        .zip(&costs)
                        .map(|(&x, c)| x as f64 * c)
                        .sum();
                    if best.as_ref().map_or(true, |(_, inc)| objective > *inc) {
                        debug!(
                            "branch and bound: incumbent {} at node {}",
                            sign * objective,
                            nodes
                        );
                        best = Some((rounded, objective));
                    }
                }
                Some((j, v, _)) => {
                    let floor = v.floor();
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                        bound,
                    };
                    down.upper[j] = floor;
                    let mut up = Node { bound, ..node };
                    up.lower[j] = floor + 1.0;
                    // The child nearer to the LP value is explored first.
                    if v - floor >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }

        debug!(
            "branch and bound: {} vars, {} rows, {} nodes",
            self.num_vars(),
            self.num_constraints(),
            nodes
        );
        let (values, objective) = best.ok_or(SolveError::Infeasible)?;
        Ok(Solution {
            values,
            objective: sign * objective,
            bound: sign * objective,
            nodes,
        })
    }
}

/// Open branch and bound node: variable bounds and the bound of its parent.
struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    bound: f64,
}

fn stopped(
    best: Option<(Vec<i64>, f64)>,
    open_bound: f64,
    sign: f64,
    nodes: usize,
    limits: &SolveLimits,
    err: SolveError,
) -> Result<Solution, SolveError> {
    match best {
        Some((values, objective)) if limits.keep_incumbent => {
            let bound = open_bound.max(objective);
            debug!(
                "branch and bound stopped after {} nodes: incumbent {}, bound {}",
                nodes,
                sign * objective,
                sign * bound
            );
            Ok(Solution {
                values,
                objective: sign * objective,
                bound: sign * bound,
                nodes,
            })
        }
        _ => Err(err),
    }
}
