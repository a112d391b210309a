//! S-box property tables and feasibility partitions.
//!
//! This crate provides the leaf stages of the inequality pipeline:
//! - The `SBox` lookup table and its validation.
//! - Difference, linear, boomerang and division property tables.
//! - The partition of all transition points into feasible and infeasible sets.
//! - JSON S-box records and a small catalogue of well-known S-boxes.
//!
//! Tables are computed by brute force over the full domain and are meant for
//! S-boxes of a handful of bits.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod catalog;
mod error;
pub mod record;
mod sbox;
mod table;
mod transitions;

pub use crate::error::SBoxError;
pub use crate::sbox::{SBox, MAX_POINT_BITS};
pub use crate::table::{PropertyTable, TableKind};
pub use crate::transitions::{coordinate, encode_point, Point, PointSet, TransitionSet};
