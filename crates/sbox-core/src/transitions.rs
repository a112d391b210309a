//! Transition points and the feasible/infeasible partition.

use serde::{Deserialize, Serialize};

use crate::table::PropertyTable;

/// Transition point: an `n`-bit index, row bits followed by column bits.
pub type Point = u32;

/// Concatenates a row index and a column index into a point.
#[inline]
pub const fn encode_point(row: u32, col: u32, output_bits: u32) -> Point {
    (row << output_bits) | col
}

/// Coordinate `i` of `point` (most-significant bit first).
#[inline]
pub const fn coordinate(point: Point, bits: u32, i: usize) -> i64 {
    ((point >> (bits - 1 - i as u32)) & 1) as i64
}

/// Dense set of points over `{0,1}^bits`, packed 64 points per word.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointSet {
    bits: u32,
    words: Vec<u64>,
}

impl PointSet {
    /// Empty set over `bits`-bit points.
    pub fn empty(bits: u32) -> Self {
        let words = ((1usize << bits) + 63) / 64;
        Self {
            bits,
            words: vec![0u64; words],
        }
    }

    /// Set containing every `bits`-bit point.
    pub fn full(bits: u32) -> Self {
        let mut set = Self::empty(bits);
        for point in 0..set.universe() as Point {
            set.insert(point);
        }
        set
    }

    /// Builds a set from an iterator of points.
    pub fn from_points<I: IntoIterator<Item = Point>>(bits: u32, points: I) -> Self {
        let mut set = Self::empty(bits);
        for point in points {
            set.insert(point);
        }
        set
    }

    /// Point width.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of points in the universe (`2^bits`).
    pub fn universe(&self) -> usize {
        1 << self.bits
    }

    /// Adds a point.
    #[inline]
    pub fn insert(&mut self, point: Point) {
        self.words[point as usize / 64] |= 1u64 << (point % 64);
    }

    /// Removes a point.
    #[inline]
    pub fn remove(&mut self, point: Point) {
        self.words[point as usize / 64] &= !(1u64 << (point % 64));
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, point: Point) -> bool {
        (self.words[point as usize / 64] >> (point % 64)) & 1 == 1
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if the set has no points.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Size of `self ∩ other` without allocating.
    pub fn intersection_len(&self, other: &Self) -> usize {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Returns `self ∩ other`.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            bits: self.bits,
            words: self
                .words
                .iter()
                .zip(other.words.iter())
                .map(|(a, b)| a & b)
                .collect(),
        }
    }

    /// Returns `self \ other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            bits: self.bits,
            words: self
                .words
                .iter()
                .zip(other.words.iter())
                .map(|(a, b)| a & !b)
                .collect(),
        }
    }

    /// Adds every point of `other`.
    pub fn union_with(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    /// Returns true if every point of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & !b == 0)
    }

    /// Iterates over points in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.words.iter().enumerate().flat_map(|(idx, &word)| {
            let mut bits = word;
            core::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros();
                bits &= bits - 1;
                Some(idx as Point * 64 + bit)
            })
        })
    }
}

/// Total partition of all transition points into feasible and infeasible ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSet {
    input_bits: u32,
    output_bits: u32,
    feasible: PointSet,
    infeasible: PointSet,
}

impl TransitionSet {
    /// Classifies every `(row, col)` entry of `table`.
    pub fn from_table(table: &PropertyTable) -> Self {
        let input_bits = table.input_bits();
        let output_bits = table.output_bits();
        let bits = input_bits + output_bits;
        let mut feasible = PointSet::empty(bits);
        let mut infeasible = PointSet::empty(bits);
        for row in 0..table.rows() {
            for col in 0..table.cols() {
                let point = encode_point(row as u32, col as u32, output_bits);
                if table.is_feasible(row, col) {
                    feasible.insert(point);
                } else {
                    infeasible.insert(point);
                }
            }
        }
        Self {
            input_bits,
            output_bits,
            feasible,
            infeasible,
        }
    }

    /// Input width `m`.
    pub fn input_bits(&self) -> u32 {
        self.input_bits
    }

    /// Output width `k`.
    pub fn output_bits(&self) -> u32 {
        self.output_bits
    }

    /// Point width `n = m + k`.
    pub fn bits(&self) -> u32 {
        self.input_bits + self.output_bits
    }

    /// Possible transitions.
    pub fn feasible(&self) -> &PointSet {
        &self.feasible
    }

    /// Impossible transitions.
    pub fn infeasible(&self) -> &PointSet {
        &self.infeasible
    }

    /// Feasible points in ascending order.
    pub fn feasible_points(&self) -> Vec<Point> {
        self.feasible.iter().collect()
    }

    /// Infeasible points in ascending order.
    pub fn infeasible_points(&self) -> Vec<Point> {
        self.infeasible.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SBox, TableKind};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn point_encoding_is_msb_first() {
        let point = encode_point(0b10, 0b01, 2);
        assert_eq!(point, 0b1001);
        let coords: Vec<i64> = (0..4).map(|i| coordinate(point, 4, i)).collect();
        assert_eq!(coords, vec![1, 0, 0, 1]);
    }

    #[test]
    fn point_set_operations() {
        let a = PointSet::from_points(7, [0, 3, 64, 127]);
        let b = PointSet::from_points(7, [3, 64, 100]);
        assert_eq!(a.len(), 4);
        assert_eq!(a.intersection_len(&b), 2);
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![3, 64]);
        assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), vec![0, 127]);
        assert!(a.intersection(&b).is_subset(&a));
        assert!(!a.is_subset(&b));
        let mut c = a.clone();
        c.union_with(&b);
        assert_eq!(c.len(), 5);
        c.remove(100);
        assert!(!c.contains(100));
        assert!(PointSet::empty(3).is_empty());
        assert_eq!(PointSet::full(3).len(), 8);
    }

    #[test]
    fn low_bit_swap_partition() {
        let sbox = SBox::square("swap", vec![1, 0, 3, 2]).unwrap();
        let table = TableKind::Difference.generate(&sbox).unwrap();
        let transitions = TransitionSet::from_table(&table);
        assert_eq!(
            transitions.feasible_points(),
            vec![0b0000, 0b0101, 0b1010, 0b1111]
        );
        assert_eq!(transitions.infeasible().len(), 12);
    }

    #[test]
    fn partition_is_total_and_disjoint() {
        let mut rng = ChaCha20Rng::from_seed([7u8; 32]);
        let table: Vec<u32> = (0..16).map(|_| rng.gen_range(0..8)).collect();
        let sbox = SBox::new("random", 4, 3, table).unwrap();
        let ddt = TableKind::Difference.generate(&sbox).unwrap();
        let transitions = TransitionSet::from_table(&ddt);
        let feasible = transitions.feasible();
        let infeasible = transitions.infeasible();
        assert_eq!(feasible.intersection_len(infeasible), 0);
        assert_eq!(feasible.len() + infeasible.len(), 1 << 7);
        assert_eq!(feasible.len(), ddt.nonzero_count());
    }
}
