//! Integer linear inequalities over transition points.

use core::fmt;

use sbox_core::{coordinate, Point, PointSet};
use serde::{Deserialize, Serialize};

/// Constraint `Σ a_i·x_i + b ≥ 0` over `{0,1}^n`.
///
/// Serialized as the flat list `[a_1, …, a_n, b]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "Vec<i64>", try_from = "Vec<i64>")]
pub struct Inequality {
    coeffs: Vec<i64>,
    constant: i64,
}

impl Inequality {
    /// Builds an inequality from coefficients and constant.
    pub fn new(coeffs: Vec<i64>, constant: i64) -> Self {
        Self { coeffs, constant }
    }

    /// Coefficients `a_1, …, a_n`.
    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }

    /// Constant term `b`.
    pub fn constant(&self) -> i64 {
        self.constant
    }

    /// Number of variables.
    pub fn dims(&self) -> usize {
        self.coeffs.len()
    }

    /// Left-hand side `Σ a_i·p_i + b` at `point`.
    pub fn evaluate(&self, point: Point) -> i64 {
        let bits = self.coeffs.len() as u32;
        self.coeffs
            .iter()
            .enumerate()
            .map(|(i, a)| a * coordinate(point, bits, i))
            .sum::<i64>()
            + self.constant
    }

    /// Returns true if `point` satisfies the inequality.
    #[inline]
    pub fn admits(&self, point: Point) -> bool {
        self.evaluate(point) >= 0
    }

    /// Returns true if `point` violates the inequality.
    #[inline]
    pub fn excludes(&self, point: Point) -> bool {
        self.evaluate(point) < 0
    }

    /// Returns true if the inequality is tight (`= 0`) at `point`.
    #[inline]
    pub fn is_tight(&self, point: Point) -> bool {
        self.evaluate(point) == 0
    }

    /// The members of `points` this inequality violates.
    pub fn excluded(&self, points: &PointSet) -> PointSet {
        PointSet::from_points(points.bits(), points.iter().filter(|&p| self.excludes(p)))
    }

    /// Returns true if every member of `points` satisfies the inequality.
    pub fn is_valid_on(&self, points: &PointSet) -> bool {
        points.iter().all(|p| self.admits(p))
    }

    /// Coordinatewise sum of coefficients and constants.
    pub fn sum(&self, other: &Self) -> Self {
        let coeffs = self
            .coeffs
            .iter()
            .zip(other.coeffs.iter())
            .map(|(a, b)| a + b)
            .collect();
        Self::new(coeffs, self.constant + other.constant)
    }

    /// The opposite inequality `−(Σ a_i·x_i + b) ≥ 0`.
    pub fn negated(&self) -> Self {
        Self::new(
            self.coeffs.iter().map(|a| -a).collect(),
            -self.constant,
        )
    }

    /// Divides all terms by their common divisor.
    pub fn normalized(mut self) -> Self {
        let g = self
            .coeffs
            .iter()
            .fold(self.constant.unsigned_abs(), |acc, a| {
                gcd(acc, a.unsigned_abs())
            });
        if g > 1 {
            let g = g as i64;
            for a in self.coeffs.iter_mut() {
                *a /= g;
            }
            self.constant /= g;
        }
        self
    }
}

impl From<Inequality> for Vec<i64> {
    fn from(ineq: Inequality) -> Self {
        let mut flat = ineq.coeffs;
        flat.push(ineq.constant);
        flat
    }
}

impl TryFrom<Vec<i64>> for Inequality {
    type Error = String;

    fn try_from(mut flat: Vec<i64>) -> Result<Self, Self::Error> {
        match flat.pop() {
            Some(constant) if !flat.is_empty() => Ok(Self::new(flat, constant)),
            _ => Err("an inequality needs at least one coefficient and a constant".into()),
        }
    }
}

impl fmt::Display for Inequality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for a in &self.coeffs {
            write!(f, "{a}, ")?;
        }
        write!(f, "{}]", self.constant)
    }
}

/// Ordered collection of inequalities.
///
/// A point is accepted when it satisfies every member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InequalitySet {
    members: Vec<Inequality>,
}

impl InequalitySet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member.
    pub fn push(&mut self, ineq: Inequality) {
        self.members.push(ineq);
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates over members.
    pub fn iter(&self) -> core::slice::Iter<'_, Inequality> {
        self.members.iter()
    }

    /// Members as a slice.
    pub fn as_slice(&self) -> &[Inequality] {
        &self.members
    }

    /// Returns true if `point` satisfies every member.
    pub fn accepts(&self, point: Point) -> bool {
        self.members.iter().all(|ineq| ineq.admits(point))
    }

    /// All `bits`-bit points accepted by the set.
    pub fn accepted(&self, bits: u32) -> PointSet {
        PointSet::from_points(bits, (0..1u32 << bits).filter(|&p| self.accepts(p)))
    }

    /// Parses one `[a_1, …, a_n, b]` list per non-empty line.
    pub fn parse_text(text: &str) -> Result<Self, serde_json::Error> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str::<Inequality>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from)
    }

    /// Renders one member per line.
    pub fn to_text(&self) -> String {
        self.members.iter().map(|ineq| format!("{ineq}\n")).collect()
    }
}

impl From<Vec<Inequality>> for InequalitySet {
    fn from(members: Vec<Inequality>) -> Self {
        Self { members }
    }
}

impl FromIterator<Inequality> for InequalitySet {
    fn from_iter<I: IntoIterator<Item = Inequality>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a InequalitySet {
    type Item = &'a Inequality;
    type IntoIter = core::slice::Iter<'a, Inequality>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_msb_first() {
        // x0 - x3 >= 0 over 4 bits
        let ineq = Inequality::new(vec![1, 0, 0, -1], 0);
        assert!(ineq.admits(0b1001));
        assert!(ineq.excludes(0b0001));
        assert!(ineq.is_tight(0b0000));
    }

    #[test]
    fn normalization_keeps_sign() {
        let ineq = Inequality::new(vec![-4, 6, 0], 2).normalized();
        assert_eq!(ineq, Inequality::new(vec![-2, 3, 0], 1));
        let zero = Inequality::new(vec![0, 0], 0).normalized();
        assert_eq!(zero.constant(), 0);
    }

    #[test]
    fn serializes_as_flat_list() {
        let ineq = Inequality::new(vec![1, -2, 0], 3);
        let json = serde_json::to_string(&ineq).unwrap();
        assert_eq!(json, "[1,-2,0,3]");
        let back: Inequality = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ineq);
        assert!(serde_json::from_str::<Inequality>("[3]").is_err());
    }

    #[test]
    fn text_format_matches_display() {
        let set = InequalitySet::from(vec![
            Inequality::new(vec![1, 0], 0),
            Inequality::new(vec![-1, -1], 1),
        ]);
        let text = set.to_text();
        assert_eq!(text, "[1, 0, 0]\n[-1, -1, 1]\n");
        assert_eq!(InequalitySet::parse_text(&text).unwrap(), set);
    }

    #[test]
    fn accepted_points_of_a_set() {
        // x0 + x1 <= 1 over 2 bits
        let set = InequalitySet::from(vec![Inequality::new(vec![-1, -1], 1)]);
        let accepted: Vec<Point> = set.accepted(2).iter().collect();
        assert_eq!(accepted, vec![0, 1, 2]);
    }
}
