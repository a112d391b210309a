//! Dense bounded-variable dual simplex for LP relaxations.
//!
//! Row `i` gets a logical column `s_i = Σ a_ij·x_j` whose bounds carry the
//! comparison, so the tableau starts from the all-logical basis with a zero
//! right-hand side. Structural variables have finite bounds and start at the
//! bound their cost prefers, which makes the start dual feasible: dual simplex
//! pivots alone reach the optimum, with no phase one. Changing bounds keeps
//! the basis dual feasible, so branch and bound solves every node from the
//! basis the previous node ended with.

use std::time::Instant;

use super::{Cmp, Constraint};

const PIVOT_EPS: f64 = 1e-9;
const FEAS_EPS: f64 = 1e-7;
const DUAL_EPS: f64 = 1e-9;
/// Pivots between rebuilds of the tableau from the original rows.
const REFACTOR_EVERY: usize = 2_000;
/// Iterations of one solve after which the leaving row follows Bland's rule.
const BLAND_AFTER: usize = 5_000;

#[derive(Debug)]
pub(super) enum LpError {
    Timeout,
    IterationLimit,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum LpStatus {
    Optimal,
    Infeasible,
}

/// Maximises `costs · x` over the current bounds.
pub(super) struct Tableau {
    rows: usize,
    cols: usize,
    structurals: usize,
    data: Vec<f64>,
    original: Vec<f64>,
    beta: Vec<f64>,
    basis: Vec<usize>,
    in_basis: Vec<bool>,
    at_upper: Vec<bool>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    costs: Vec<f64>,
    reduced: Vec<f64>,
    pivots: usize,
}

impl Tableau {
    pub fn new(
        objective: &[f64],
        constraints: &[Constraint],
        lower: &[f64],
        upper: &[f64],
    ) -> Self {
        let n = objective.len();
        let m = constraints.len();
        let cols = n + m;

        let mut data = vec![0.0; m * cols];
        let mut lo = Vec::with_capacity(cols);
        let mut hi = Vec::with_capacity(cols);
        lo.extend_from_slice(lower);
        hi.extend_from_slice(upper);
        for (i, row) in constraints.iter().enumerate() {
            // s_i − Σ a_ij·x_j = 0
            for &(j, a) in &row.terms {
                data[i * cols + j] -= a;
            }
            data[i * cols + n + i] = 1.0;
            let (l, u) = match row.cmp {
                Cmp::Le => (f64::NEG_INFINITY, row.rhs),
                Cmp::Ge => (row.rhs, f64::INFINITY),
                Cmp::Eq => (row.rhs, row.rhs),
            };
            lo.push(l);
            hi.push(u);
        }

        let mut costs = vec![0.0; cols];
        costs[..n].copy_from_slice(objective);
        let at_upper = (0..cols).map(|j| j < n && costs[j] > 0.0).collect();
        let mut tableau = Self {
            rows: m,
            cols,
            structurals: n,
            original: data.clone(),
            data,
            beta: vec![0.0; m],
            basis: (n..cols).collect(),
            in_basis: (0..cols).map(|j| j >= n).collect(),
            at_upper,
            lower: lo,
            upper: hi,
            reduced: costs.clone(),
            costs,
            pivots: 0,
        };
        tableau.refresh_beta();
        tableau
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    fn nonbasic_value(&self, j: usize) -> f64 {
        if self.at_upper[j] {
            self.upper[j]
        } else {
            self.lower[j]
        }
    }

    /// Recomputes the basic values from the non-basic ones.
    fn refresh_beta(&mut self) {
        let fixed: Vec<f64> = (0..self.cols)
            .map(|j| {
                if self.in_basis[j] {
                    0.0
                } else {
                    self.nonbasic_value(j)
                }
            })
            .collect();
        for (i, row) in self.data.chunks(self.cols).enumerate() {
            self.beta[i] = -row.iter().zip(&fixed).map(|(a, x)| a * x).sum::<f64>();
        }
    }

    /// Replaces the structural bounds; the basis is kept.
    pub fn set_bounds(&mut self, lower: &[f64], upper: &[f64]) {
        let n = self.structurals;
        self.lower[..n].copy_from_slice(lower);
        self.upper[..n].copy_from_slice(upper);
        self.refresh_beta();
    }

    /// Current values of the structural variables.
    pub fn values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = (0..self.structurals)
            .map(|j| self.nonbasic_value(j))
            .collect();
        for (i, &b) in self.basis.iter().enumerate() {
            if b < self.structurals {
                values[b] = self.beta[i];
            }
        }
        values
    }

    fn pivot(&mut self, r: usize, j: usize) {
        let cols = self.cols;
        let p = self.at(r, j);
        for c in 0..cols {
            self.data[r * cols + c] /= p;
        }
        let (before, rest) = self.data.split_at_mut(r * cols);
        let (pivot_row, after) = rest.split_at_mut(cols);
        for row in before.chunks_mut(cols).chain(after.chunks_mut(cols)) {
            let factor = row[j];
            if factor != 0.0 {
                for (cell, &pv) in row.iter_mut().zip(pivot_row.iter()) {
                    *cell -= factor * pv;
                }
            }
        }
        let factor = self.reduced[j];
        if factor != 0.0 {
            for (cell, &pv) in self.reduced.iter_mut().zip(pivot_row.iter()) {
                *cell -= factor * pv;
            }
        }
        self.in_basis[self.basis[r]] = false;
        self.in_basis[j] = true;
        self.basis[r] = j;
        self.at_upper[j] = false;
        self.pivots += 1;
    }

    /// Basic row furthest outside its bounds, and whether it must increase.
    fn leaving_row(&self, bland: bool) -> Option<(usize, bool)> {
        let mut best: Option<(usize, bool, f64)> = None;
        for i in 0..self.rows {
            let p = self.basis[i];
            let (excess, increase) = if self.beta[i] < self.lower[p] - FEAS_EPS {
                (self.lower[p] - self.beta[i], true)
            } else if self.beta[i] > self.upper[p] + FEAS_EPS {
                (self.beta[i] - self.upper[p], false)
            } else {
                continue;
            };
            let better = match best {
                None => true,
                Some((k, _, _)) if bland => p < self.basis[k],
                Some((_, _, current)) => excess > current,
            };
            if better {
                best = Some((i, increase, excess));
            }
        }
        best.map(|(i, increase, _)| (i, increase))
    }

    /// Dual ratio test on row `r`; `None` proves the LP infeasible.
    fn entering_column(&self, r: usize, increase: bool) -> Option<usize> {
        let row = &self.data[r * self.cols..(r + 1) * self.cols];
        let mut best: Option<(usize, f64)> = None;
        for (j, &alpha) in row.iter().enumerate() {
            if self.in_basis[j] || self.upper[j] - self.lower[j] <= 0.0 {
                continue;
            }
            let moves_up = !self.at_upper[j];
            let eligible = if increase == moves_up {
                alpha < -PIVOT_EPS
            } else {
                alpha > PIVOT_EPS
            };
            if !eligible {
                continue;
            }
            let ratio = self.reduced[j].abs() / alpha.abs();
            if best.map_or(true, |(_, current)| ratio < current - DUAL_EPS) {
                best = Some((j, ratio));
            }
        }
        best.map(|(j, _)| j)
    }

    /// Restores primal feasibility with dual simplex pivots.
    pub fn reoptimize(&mut self, deadline: Option<Instant>) -> Result<LpStatus, LpError> {
        let limit = 50_000 + 50 * (self.rows + self.cols);
        for iteration in 0..limit {
            if iteration % 64 == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(LpError::Timeout);
            }
            if self.pivots >= REFACTOR_EVERY {
                self.refactor();
            }
            let Some((r, increase)) = self.leaving_row(iteration >= BLAND_AFTER) else {
                return Ok(LpStatus::Optimal);
            };
            let Some(j) = self.entering_column(r, increase) else {
                return Ok(LpStatus::Infeasible);
            };

            let leaving = self.basis[r];
            let target = if increase {
                self.lower[leaving]
            } else {
                self.upper[leaving]
            };
            let theta = (self.beta[r] - target) / self.at(r, j);
            let entering_value = self.nonbasic_value(j) + theta;
            for i in 0..self.rows {
                self.beta[i] -= theta * self.at(i, j);
            }
            self.pivot(r, j);
            self.at_upper[leaving] = !increase;
            self.beta[r] = entering_value;
        }
        Err(LpError::IterationLimit)
    }

    /// Rebuilds the tableau for the current basis from the original rows.
    fn refactor(&mut self) {
        let n = self.structurals;
        let wanted = self.in_basis.clone();
        let target = self.basis.clone();
        self.data.copy_from_slice(&self.original);
        for (i, slot) in self.basis.iter_mut().enumerate() {
            *slot = n + i;
        }
        for (j, flag) in self.in_basis.iter_mut().enumerate() {
            *flag = j >= n;
        }
        for &j in &target {
            if self.in_basis[j] {
                continue;
            }
            let row = (0..self.rows)
                .filter(|&i| !wanted[self.basis[i]])
                .max_by(|&a, &b| self.at(a, j).abs().total_cmp(&self.at(b, j).abs()));
            if let Some(r) = row {
                if self.at(r, j).abs() > PIVOT_EPS {
                    self.pivot(r, j);
                }
            }
        }
        self.pivots = 0;

        for j in 0..self.cols {
            let priced: f64 = (0..self.rows)
                .map(|i| self.costs[self.basis[i]] * self.at(i, j))
                .sum();
            self.reduced[j] = self.costs[j] - priced;
        }
        for j in 0..self.cols {
            if self.in_basis[j] {
                continue;
            }
            let lower_ok = self.lower[j].is_finite();
            let upper_ok = self.upper[j].is_finite();
            self.at_upper[j] = if self.at_upper[j] {
                upper_ok && !(self.reduced[j] < -DUAL_EPS && lower_ok)
            } else {
                !lower_ok || (self.reduced[j] > DUAL_EPS && upper_ok)
            };
        }
        self.refresh_beta();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(terms: &[(usize, f64)], cmp: Cmp, rhs: f64) -> Constraint {
        Constraint {
            terms: terms.to_vec(),
            cmp,
            rhs,
        }
    }

    fn solve(
        objective: &[f64],
        constraints: &[Constraint],
        lower: &[f64],
        upper: &[f64],
    ) -> Option<(Vec<f64>, f64)> {
        let mut tableau = Tableau::new(objective, constraints, lower, upper);
        match tableau.reoptimize(None).expect("small test problem") {
            LpStatus::Optimal => {
                let values = tableau.values();
                let value = values.iter().zip(objective).map(|(x, c)| x * c).sum();
                Some((values, value))
            }
            LpStatus::Infeasible => None,
        }
    }

    #[test]
    fn classic_two_variable_lp() {
        // max 3x + 5y, x <= 4, 2y <= 12, 3x + 2y <= 18
        let constraints = [
            row(&[(0, 1.0)], Cmp::Le, 4.0),
            row(&[(1, 2.0)], Cmp::Le, 12.0),
            row(&[(0, 3.0), (1, 2.0)], Cmp::Le, 18.0),
        ];
        let (values, objective) =
            solve(&[3.0, 5.0], &constraints, &[0.0, 0.0], &[100.0, 100.0]).unwrap();
        assert!((objective - 36.0).abs() < 1e-6);
        assert!((values[0] - 2.0).abs() < 1e-6);
        assert!((values[1] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn upper_bounds_are_respected() {
        // max x + y with x, y in [0, 1] and no rows.
        let (_, objective) = solve(&[1.0, 1.0], &[], &[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!((objective - 2.0).abs() < 1e-9);
    }

    #[test]
    fn covering_rows_with_negative_lower_bounds() {
        // min x + y (max -x - y), x + y >= 1, x - y = 0, x, y in [-2, 2]
        let constraints = [
            row(&[(0, 1.0), (1, 1.0)], Cmp::Ge, 1.0),
            row(&[(0, 1.0), (1, -1.0)], Cmp::Eq, 0.0),
        ];
        let (values, objective) =
            solve(&[-1.0, -1.0], &constraints, &[-2.0, -2.0], &[2.0, 2.0]).unwrap();
        assert!((objective + 1.0).abs() < 1e-6);
        assert!((values[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn detects_infeasibility() {
        let constraints = [
            row(&[(0, 1.0)], Cmp::Ge, 2.0),
            row(&[(0, 1.0)], Cmp::Le, 1.0),
        ];
        assert!(solve(&[1.0], &constraints, &[0.0], &[5.0]).is_none());
    }

    #[test]
    fn tightened_bounds_match_a_fresh_solve() {
        // max 2x + 3y + z, x + y + z <= 2.5, x - y >= -1, all in [0, 2]
        let constraints = [
            row(&[(0, 1.0), (1, 1.0), (2, 1.0)], Cmp::Le, 2.5),
            row(&[(0, 1.0), (1, -1.0)], Cmp::Ge, -1.0),
        ];
        let objective = [2.0, 3.0, 1.0];
        let mut warm = Tableau::new(&objective, &constraints, &[0.0; 3], &[2.0; 3]);
        assert_eq!(warm.reoptimize(None).unwrap(), LpStatus::Optimal);

        for (lower, upper) in [
            ([0.0, 0.0, 0.0], [2.0, 1.0, 2.0]),
            ([0.0, 0.0, 1.0], [2.0, 1.0, 2.0]),
            ([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]),
        ] {
            warm.set_bounds(&lower, &upper);
            assert_eq!(warm.reoptimize(None).unwrap(), LpStatus::Optimal);
            let warm_value: f64 = warm.values().iter().zip(&objective).map(|(x, c)| x * c).sum();
            let (_, fresh_value) = solve(&objective, &constraints, &lower, &upper).unwrap();
            assert!((warm_value - fresh_value).abs() < 1e-6, "{lower:?} {upper:?}");
        }
    }

    #[test]
    fn rebuilt_tableau_keeps_the_optimum() {
        let constraints = [
            row(&[(0, 1.0)], Cmp::Le, 4.0),
            row(&[(1, 2.0)], Cmp::Le, 12.0),
            row(&[(0, 3.0), (1, 2.0)], Cmp::Le, 18.0),
        ];
        let mut tableau = Tableau::new(&[3.0, 5.0], &constraints, &[0.0, 0.0], &[100.0, 100.0]);
        assert_eq!(tableau.reoptimize(None).unwrap(), LpStatus::Optimal);
        tableau.refactor();
        assert_eq!(tableau.reoptimize(None).unwrap(), LpStatus::Optimal);
        let values = tableau.values();
        assert!((values[0] - 2.0).abs() < 1e-6);
        assert!((values[1] - 6.0).abs() < 1e-6);
    }
}
