//! Property tables (DDT, LAT, BCT, DPT).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SBoxError;
use crate::sbox::SBox;

/// Feasibility oracle used to build a property table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableKind {
    /// Difference distribution table.
    Difference,
    /// Linear approximation table, centred at zero.
    Linear,
    /// Boomerang connectivity table (permutations only).
    Boomerang,
    /// Bit-based division property table (0/1 entries).
    Division,
}

impl TableKind {
    /// All table kinds in a stable order.
    pub const ALL: [TableKind; 4] = [
        TableKind::Difference,
        TableKind::Linear,
        TableKind::Boomerang,
        TableKind::Division,
    ];

    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Difference => "difference",
            TableKind::Linear => "linear",
            TableKind::Boomerang => "boomerang",
            TableKind::Division => "division",
        }
    }

    /// Computes the table for `sbox`.
    pub fn generate(&self, sbox: &SBox) -> Result<PropertyTable, SBoxError> {
        let entries = match self {
            TableKind::Difference => difference_entries(sbox),
            TableKind::Linear => linear_entries(sbox),
            TableKind::Boomerang => boomerang_entries(sbox)?,
            TableKind::Division => division_entries(sbox),
        };
        PropertyTable::from_entries(sbox.input_bits(), sbox.output_bits(), entries)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "difference" | "ddt" => Ok(TableKind::Difference),
            "linear" | "lat" => Ok(TableKind::Linear),
            "boomerang" | "bct" => Ok(TableKind::Boomerang),
            "division" | "dpt" => Ok(TableKind::Division),
            other => Err(format!("unknown table kind `{other}`")),
        }
    }
}

/// `2^m × 2^k` table of integer scores, stored row-major.
///
/// Entry `(i, j)` is feasible iff it is non-zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTable {
    input_bits: u32,
    output_bits: u32,
    entries: Vec<i64>,
}

impl PropertyTable {
    /// Wraps raw row-major entries.
    pub fn from_entries(
        input_bits: u32,
        output_bits: u32,
        entries: Vec<i64>,
    ) -> Result<Self, SBoxError> {
        let expected = 1usize << (input_bits + output_bits);
        if entries.len() != expected {
            return Err(SBoxError::ShapeMismatch {
                expected,
                actual: entries.len(),
            });
        }
        Ok(Self {
            input_bits,
            output_bits,
            entries,
        })
    }

    /// Row index width `m`.
    pub fn input_bits(&self) -> u32 {
        self.input_bits
    }

    /// Column index width `k`.
    pub fn output_bits(&self) -> u32 {
        self.output_bits
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        1 << self.input_bits
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        1 << self.output_bits
    }

    /// Entry at row `i`, column `j`.
    #[inline]
    pub fn score(&self, i: usize, j: usize) -> i64 {
        self.entries[(i << self.output_bits) | j]
    }

    /// Returns true if the transition `i → j` is possible.
    #[inline]
    pub fn is_feasible(&self, i: usize, j: usize) -> bool {
        self.score(i, j) != 0
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[i64] {
        let cols = self.cols();
        &self.entries[i * cols..(i + 1) * cols]
    }

    /// Number of non-zero entries.
    pub fn nonzero_count(&self) -> usize {
        self.entries.iter().filter(|&&e| e != 0).count()
    }
}

impl fmt::Display for PropertyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .entries
            .iter()
            .map(|e| e.to_string().len())
            .max()
            .unwrap_or(1);
        for i in 0..self.rows() {
            let row: Vec<String> = self
                .row(i)
                .iter()
                .map(|e| format!("{e:>width$}"))
                .collect();
            writeln!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}

fn difference_entries(sbox: &SBox) -> Vec<i64> {
    let rows = sbox.input_len();
    let cols = sbox.output_len();
    let mut ddt = vec![0i64; rows * cols];
    for x in 0..rows as u32 {
        let y = sbox.apply(x);
        for alpha in 0..rows as u32 {
            let beta = y ^ sbox.apply(x ^ alpha);
            ddt[alpha as usize * cols + beta as usize] += 1;
        }
    }
    ddt
}

fn linear_entries(sbox: &SBox) -> Vec<i64> {
    let rows = sbox.input_len();
    let cols = sbox.output_len();
    let offset = (rows / 2) as i64;
    let mut lat = vec![-offset; rows * cols];
    for alpha in 0..rows as u32 {
        for beta in 0..cols as u32 {
            let agree = (0..rows as u32)
                .filter(|&x| parity(alpha & x) == parity(beta & sbox.apply(x)))
                .count() as i64;
            lat[alpha as usize * cols + beta as usize] += agree;
        }
    }
    lat
}

fn boomerang_entries(sbox: &SBox) -> Result<Vec<i64>, SBoxError> {
    let inverse = sbox.inverse()?;
    let size = sbox.input_len();
    let mut bct = vec![0i64; size * size];
    for alpha in 0..size as u32 {
        for beta in 0..size as u32 {
            let count = (0..size as u32)
                .filter(|&x| {
                    let first = inverse[(sbox.apply(x) ^ beta) as usize];
                    let second = inverse[(sbox.apply(x ^ alpha) ^ beta) as usize];
                    first ^ second == alpha
                })
                .count();
            bct[alpha as usize * size + beta as usize] = count as i64;
        }
    }
    Ok(bct)
}

/// Division trail table: `u → v` is kept when the monomial `x^u` appears in the
/// algebraic normal form of `y^v ∘ S`, closed over input subsets and output
/// supersets.
fn division_entries(sbox: &SBox) -> Vec<i64> {
    let m = sbox.input_bits();
    let k = sbox.output_bits();
    let rows = sbox.input_len();
    let cols = sbox.output_len();
    let mut reach = vec![false; rows * cols];

    let mut anf = vec![0u8; rows];
    for v in 0..cols as u32 {
        for (x, coeff) in anf.iter_mut().enumerate() {
            *coeff = u8::from(sbox.apply(x as u32) & v == v);
        }
        moebius_in_place(&mut anf, m);
        for (u, &coeff) in anf.iter().enumerate() {
            if coeff == 1 {
                reach[u * cols + v as usize] = true;
            }
        }
    }

    // Every input subset inherits the reachable outputs of its supersets.
    for bit in 0..m {
        let mask = 1usize << bit;
        for u in (0..rows).filter(|u| u & mask == 0) {
            for v in 0..cols {
                if reach[(u | mask) * cols + v] {
                    reach[u * cols + v] = true;
                }
            }
        }
    }

    // Outputs are closed upward.
    for bit in 0..k {
        let mask = 1usize << bit;
        for u in 0..rows {
            for v in (0..cols).filter(|v| v & mask == 0) {
                if reach[u * cols + v] {
                    reach[u * cols + (v | mask)] = true;
                }
            }
        }
    }

    reach.into_iter().map(i64::from).collect()
}

fn moebius_in_place(values: &mut [u8], bits: u32) {
    for bit in 0..bits {
        let mask = 1usize << bit;
        for x in 0..values.len() {
            if x & mask != 0 {
                values[x] ^= values[x ^ mask];
            }
        }
    }
}

#[inline]
fn parity(value: u32) -> bool {
    value.count_ones() & 1 == 1
}
