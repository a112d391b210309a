//! Minimal linear inequality descriptions of S-box property tables.
//!
//! Given the feasible/infeasible partition of an S-box table (see
//! `sbox_core`), this crate produces a small set of integer inequalities
//! `Σ a_i·x_i + b ≥ 0` accepted by exactly the feasible transition points:
//! - exact convex hull facets (`hull`) and their augmented sums (`augment`),
//! - cover selection by greedy, exact or integer-program search (`cover`),
//! - a small branch and bound solver for those programs (`milp`),
//! - validation and batch jobs (`validate`, `pipeline`).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod augment;
pub mod config;
pub mod cover;
pub mod hull;
mod inequality;
pub mod milp;
pub mod pipeline;
pub mod validate;

pub use augment::augment;
pub use config::{ConfigError, JobConfig, TieBreakRule};
pub use cover::{Cover, CoverError, DirectSearchBounds, Strategy, TieBreak};
pub use hull::{enumerate_facets, Hull, HullError};
pub use inequality::{Inequality, InequalitySet};
pub use milp::{SolveError, SolveLimits};
pub use pipeline::{run_batch, run_job, JobError, JobOutcome, JobReport, Summary};
pub use validate::{useless_members, validate, ValidationError};
