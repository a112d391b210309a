//! Exact convex hull facets of 0/1 point sets.
//!
//! The facets of `conv(V)` are the extreme rays of the cone
//! `C = {(a, b) : a·v + b ≥ 0 for all v ∈ V}` and the affine hull equations
//! span its lineality space. `C` is computed with the double description
//! method: constraints `(v, 1)` are added one vertex at a time, new rays are
//! formed from adjacent pairs on opposite sides, and adjacency is decided
//! combinatorially from incidence sets. All arithmetic is exact.

use std::time::Instant;

use log::debug;
use sbox_core::{coordinate, PointSet};
use thiserror::Error;

use crate::inequality::Inequality;

/// Failures of facet enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HullError {
    /// No vertices were supplied.
    #[error("cannot build the convex hull of an empty vertex set")]
    EmptyVertexSet,
    /// The deadline passed before all vertices were processed.
    #[error("facet enumeration timed out after {processed} of {total} vertices")]
    Timeout {
        /// Vertices processed so far.
        processed: usize,
        /// Total vertices.
        total: usize,
    },
    /// A coefficient no longer fits in 64 bits.
    #[error("facet coefficient overflow")]
    Overflow,
}

/// Irredundant H-representation of a vertex set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hull {
    dims: usize,
    facets: Vec<Inequality>,
    equations: Vec<Inequality>,
}

impl Hull {
    /// Ambient dimension `n`.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Proper facets, each tight on at least one vertex.
    pub fn facets(&self) -> &[Inequality] {
        &self.facets
    }

    /// Basis of the affine hull equations (`= 0` on every vertex).
    pub fn equations(&self) -> &[Inequality] {
        &self.equations
    }

    /// Dimension of the affine hull.
    pub fn dimension(&self) -> usize {
        self.dims - self.equations.len()
    }

    /// Returns true if the vertices span the whole space.
    pub fn is_full_dimensional(&self) -> bool {
        self.equations.is_empty()
    }

    /// Facets followed by both orientations of every equation.
    ///
    /// Together they accept exactly the points of the hull.
    pub fn inequalities(&self) -> Vec<Inequality> {
        let mut out = self.facets.clone();
        for eq in &self.equations {
            out.push(eq.clone());
            out.push(eq.negated());
        }
        out
    }
}

/// Computes the facets and equations of `conv(vertices)`.
///
/// Fewer than two distinct vertices give no proper facets, only equations.
pub fn enumerate_facets(
    vertices: &PointSet,
    deadline: Option<Instant>,
) -> Result<Hull, HullError> {
    let n = vertices.bits() as usize;
    let d = n + 1;
    let constraints: Vec<Vec<i64>> = vertices
        .iter()
        .map(|v| {
            let mut h: Vec<i64> = (0..n).map(|i| coordinate(v, n as u32, i)).collect();
            h.push(1);
            h
        })
        .collect();
    if constraints.is_empty() {
        return Err(HullError::EmptyVertexSet);
    }
    let total = constraints.len();

    let mut lineality: Vec<Vec<i64>> = (0..d)
        .map(|i| {
            let mut e = vec![0i64; d];
            e[i] = 1;
            e
        })
        .collect();
    let mut rays: Vec<Ray> = Vec::new();

    for (idx, h) in constraints.iter().enumerate() {
        check_deadline(deadline, idx, total)?;
        match lineality.iter().position(|l| dot(h, l) != 0) {
            Some(pos) => {
                let mut pivot = lineality.remove(pos);
                let mut hp = dot(h, &pivot);
                if hp < 0 {
                    pivot.iter_mut().for_each(|c| *c = -*c);
                    hp = -hp;
                }
                for l in lineality.iter_mut() {
                    let hl = dot(h, l);
                    if hl != 0 {
                        *l = combine(hp, l, -hl, &pivot)?;
                    }
                }
                for ray in rays.iter_mut() {
                    let hr = dot(h, &ray.coords);
                    if hr != 0 {
                        ray.coords = combine(hp, &ray.coords, -hr, &pivot)?;
                    }
                    ray.incidence.insert(idx);
                }
                let mut incidence = Incidence::new(total);
                (0..idx).for_each(|j| incidence.insert(j));
                rays.push(Ray {
                    coords: pivot,
                    incidence,
                });
            }
            None => {
                rays = refine(rays, h, idx, d - lineality.len(), deadline, total)?;
            }
        }
    }

    debug!(
        "hull of {} vertices in dimension {}: {} rays, {} equations",
        total,
        n,
        rays.len(),
        lineality.len()
    );

    let facets = rays
        .into_iter()
        .filter(|ray| !ray.incidence.is_empty())
        .map(|ray| to_inequality(ray.coords, n))
        .collect();
    let equations = lineality
        .into_iter()
        .map(|mut l| {
            if l.iter().find(|&&c| c != 0).is_some_and(|&c| c < 0) {
                l.iter_mut().for_each(|c| *c = -*c);
            }
            to_inequality(l, n)
        })
        .collect();
    Ok(Hull {
        dims: n,
        facets,
        equations,
    })
}

struct Ray {
    coords: Vec<i64>,
    incidence: Incidence,
}

/// One double description step for a constraint orthogonal to the lineality space.
fn refine(
    rays: Vec<Ray>,
    h: &[i64],
    idx: usize,
    pointed_dim: usize,
    deadline: Option<Instant>,
    total: usize,
) -> Result<Vec<Ray>, HullError> {
    let values: Vec<i128> = rays.iter().map(|r| dot(h, &r.coords)).collect();
    let positive: Vec<usize> = (0..rays.len()).filter(|&i| values[i] > 0).collect();
    let negative: Vec<usize> = (0..rays.len()).filter(|&i| values[i] < 0).collect();
    if negative.is_empty() {
        return Ok(rays
            .into_iter()
            .zip(values)
            .map(|(mut ray, value)| {
                if value == 0 {
                    ray.incidence.insert(idx);
                }
                ray
            })
            .collect());
    }

    let mut created = Vec::new();
    for (step, &p) in positive.iter().enumerate() {
        if step % 64 == 0 {
            check_deadline(deadline, idx, total)?;
        }
        for &q in &negative {
            let common = rays[p].incidence.intersection(&rays[q].incidence);
            if common.len() + 2 < pointed_dim {
                continue;
            }
            let dominated = rays
                .iter()
                .enumerate()
                .any(|(r, ray)| r != p && r != q && common.is_subset(&ray.incidence));
            if dominated {
                continue;
            }
            let coords = combine(values[p], &rays[q].coords, -values[q], &rays[p].coords)?;
            let mut incidence = common;
            incidence.insert(idx);
            created.push(Ray { coords, incidence });
        }
    }

    let mut next: Vec<Ray> = rays
        .into_iter()
        .zip(values)
        .filter(|(_, value)| *value >= 0)
        .map(|(mut ray, value)| {
            if value == 0 {
                ray.incidence.insert(idx);
            }
            ray
        })
        .collect();
    next.extend(created);
    Ok(next)
}

fn check_deadline(deadline: Option<Instant>, processed: usize, total: usize) -> Result<(), HullError> {
    match deadline {
        Some(limit) if Instant::now() >= limit => Err(HullError::Timeout { processed, total }),
        _ => Ok(()),
    }
}

fn to_inequality(mut coords: Vec<i64>, n: usize) -> Inequality {
    let constant = coords[n];
    coords.truncate(n);
    Inequality::new(coords, constant).normalized()
}

fn dot(h: &[i64], y: &[i64]) -> i128 {
    h.iter()
        .zip(y.iter())
        .map(|(&a, &b)| a as i128 * b as i128)
        .sum()
}

/// `a·x + b·y`, reduced by the common divisor.
fn combine(a: i128, x: &[i64], b: i128, y: &[i64]) -> Result<Vec<i64>, HullError> {
    let raw: Vec<i128> = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| {
            let left = a.checked_mul(xi as i128)?;
            let right = b.checked_mul(yi as i128)?;
            left.checked_add(right)
        })
        .collect::<Option<_>>()
        .ok_or(HullError::Overflow)?;
    let g = raw.iter().fold(0u128, |acc, &c| gcd128(acc, c.unsigned_abs()));
    let g = if g == 0 { 1 } else { g as i128 };
    raw.into_iter()
        .map(|c| i64::try_from(c / g).map_err(|_| HullError::Overflow))
        .collect()
}

fn gcd128(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Set of constraint indices a ray is tight on.
#[derive(Clone, Debug)]
struct Incidence {
    words: Vec<u64>,
}

impl Incidence {
    fn new(capacity: usize) -> Self {
        Self {
            words: vec![0u64; (capacity + 63) / 64],
        }
    }

    fn insert(&mut self, idx: usize) {
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    fn intersection(&self, other: &Self) -> Self {
        Self {
            words: self
                .words
                .iter()
                .zip(other.words.iter())
                .map(|(a, b)| a & b)
                .collect(),
        }
    }

    fn is_subset(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & !b == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inequality::InequalitySet;
    use sbox_core::{catalog, Point, TableKind, TransitionSet};

    fn hull_of(bits: u32, points: &[Point]) -> Hull {
        enumerate_facets(&PointSet::from_points(bits, points.iter().copied()), None).unwrap()
    }

    fn accepted(hull: &Hull) -> Vec<Point> {
        InequalitySet::from(hull.inequalities())
            .accepted(hull.dims() as u32)
            .iter()
            .collect()
    }

    #[test]
    fn cube_has_two_facets_per_axis() {
        let hull = hull_of(3, &(0..8).collect::<Vec<_>>());
        assert!(hull.is_full_dimensional());
        assert_eq!(hull.facets().len(), 6);
        let mut facets = hull.facets().to_vec();
        facets.sort();
        assert!(facets.contains(&Inequality::new(vec![1, 0, 0], 0)));
        assert!(facets.contains(&Inequality::new(vec![0, 0, -1], 1)));
    }

    #[test]
    fn simplex_facets_are_tight_on_all_but_one_vertex() {
        // 000, 100, 010, 001
        let points = [0b000, 0b100, 0b010, 0b001];
        let hull = hull_of(3, &points);
        assert_eq!(hull.facets().len(), 4);
        for facet in hull.facets() {
            let tight = points.iter().filter(|&&p| facet.is_tight(p)).count();
            assert_eq!(tight, 3, "{facet}");
        }
        assert_eq!(accepted(&hull), {
            let mut sorted = points.to_vec();
            sorted.sort();
            sorted
        });
    }

    #[test]
    fn segment_in_cube_uses_equations() {
        let hull = hull_of(3, &[0b000, 0b111]);
        assert_eq!(hull.dimension(), 1);
        assert_eq!(hull.equations().len(), 2);
        assert_eq!(hull.facets().len(), 2);
        assert_eq!(accepted(&hull), vec![0b000, 0b111]);
    }

    #[test]
    fn single_point_has_no_proper_facets() {
        let hull = hull_of(4, &[0b1010]);
        assert!(hull.facets().is_empty());
        assert_eq!(hull.equations().len(), 4);
        assert_eq!(accepted(&hull), vec![0b1010]);
    }

    #[test]
    fn empty_vertex_set_is_rejected() {
        let err = enumerate_facets(&PointSet::empty(3), None).unwrap_err();
        assert_eq!(err, HullError::EmptyVertexSet);
    }

    #[test]
    fn expired_deadline_times_out() {
        let err = enumerate_facets(&PointSet::full(4), Some(Instant::now())).unwrap_err();
        assert!(matches!(err, HullError::Timeout { processed: 0, .. }));
    }

    #[test]
    fn facets_of_ddt_hull_are_supporting() {
        let sbox = catalog::builtin("printcipher").unwrap();
        let table = TableKind::Difference.generate(&sbox).unwrap();
        let transitions = TransitionSet::from_table(&table);
        let hull = enumerate_facets(transitions.feasible(), None).unwrap();
        let points = transitions.feasible_points();
        for facet in hull.facets() {
            assert!(facet.is_valid_on(transitions.feasible()), "{facet}");
            assert!(points.iter().any(|&p| facet.is_tight(p)), "{facet}");
        }
        // A facet of a d-dimensional polytope contains at least d vertices.
        for facet in hull.facets() {
            let tight = points.iter().filter(|&&p| facet.is_tight(p)).count();
            assert!(tight >= hull.dimension(), "{facet}");
        }
    }

    #[test]
    fn rerun_classifies_identically() {
        let sbox = catalog::builtin("printcipher").unwrap();
        let table = TableKind::Linear.generate(&sbox).unwrap();
        let transitions = TransitionSet::from_table(&table);
        let first = enumerate_facets(transitions.feasible(), None).unwrap();
        let second = enumerate_facets(transitions.feasible(), None).unwrap();
        assert_eq!(accepted(&first), accepted(&second));
        // 0/1 points are vertices of their hull, so the hull accepts exactly them.
        assert_eq!(accepted(&first), transitions.feasible_points());
    }
}
