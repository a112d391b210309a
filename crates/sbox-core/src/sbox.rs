//! S-box lookup tables.

use serde::{Deserialize, Serialize};

use crate::error::SBoxError;

/// Maximum number of transition bits (`input_bits + output_bits`) supported.
pub const MAX_POINT_BITS: u32 = 16;

/// Total function `{0, …, 2^m − 1} → {0, …, 2^k − 1}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SBox {
    name: String,
    input_bits: u32,
    output_bits: u32,
    table: Vec<u32>,
}

impl SBox {
    /// Validates and wraps a lookup table.
    pub fn new(
        name: impl Into<String>,
        input_bits: u32,
        output_bits: u32,
        table: Vec<u32>,
    ) -> Result<Self, SBoxError> {
        let name = name.into();
        if input_bits == 0 || output_bits == 0 || input_bits + output_bits > MAX_POINT_BITS {
            return Err(SBoxError::UnsupportedSize {
                input_bits,
                output_bits,
                max: MAX_POINT_BITS,
            });
        }
        let expected = 1usize << input_bits;
        if table.len() != expected {
            return Err(SBoxError::InvalidLength {
                name,
                input_bits,
                expected,
                actual: table.len(),
            });
        }
        let limit = 1u32 << output_bits;
        if let Some((input, &value)) = table.iter().enumerate().find(|(_, &v)| v >= limit) {
            return Err(SBoxError::ValueOutOfRange {
                name,
                input: input as u32,
                value,
                output_bits,
            });
        }
        Ok(Self {
            name,
            input_bits,
            output_bits,
            table,
        })
    }

    /// Builds a square S-box, inferring the bit size from the table length.
    pub fn square(name: impl Into<String>, table: Vec<u32>) -> Result<Self, SBoxError> {
        if !table.len().is_power_of_two() {
            let expected = table.len().next_power_of_two();
            return Err(SBoxError::InvalidLength {
                name: name.into(),
                input_bits: expected.trailing_zeros(),
                expected,
                actual: table.len(),
            });
        }
        let bits = table.len().trailing_zeros();
        Self::new(name, bits, bits, table)
    }

    /// S-box name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input size `m` in bits.
    pub fn input_bits(&self) -> u32 {
        self.input_bits
    }

    /// Output size `k` in bits.
    pub fn output_bits(&self) -> u32 {
        self.output_bits
    }

    /// Number of bits of a transition point (`m + k`).
    pub fn point_bits(&self) -> u32 {
        self.input_bits + self.output_bits
    }

    /// Number of inputs (`2^m`).
    pub fn input_len(&self) -> usize {
        1 << self.input_bits
    }

    /// Number of outputs (`2^k`).
    pub fn output_len(&self) -> usize {
        1 << self.output_bits
    }

    /// Evaluates the S-box.
    #[inline]
    pub fn apply(&self, x: u32) -> u32 {
        self.table[x as usize]
    }

    /// Raw lookup table.
    pub fn table(&self) -> &[u32] {
        &self.table
    }

    /// Returns true if the S-box is square and bijective.
    pub fn is_permutation(&self) -> bool {
        self.inverse().is_ok()
    }

    /// Computes the inverse lookup table.
    pub fn inverse(&self) -> Result<Vec<u32>, SBoxError> {
        if self.input_bits != self.output_bits {
            return Err(SBoxError::NonBijective {
                name: self.name.clone(),
            });
        }
        let mut inverse = vec![u32::MAX; self.output_len()];
        for (x, &y) in self.table.iter().enumerate() {
            let slot = &mut inverse[y as usize];
            if *slot != u32::MAX {
                return Err(SBoxError::NonBijective {
                    name: self.name.clone(),
                });
            }
            *slot = x as u32;
        }
        Ok(inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = SBox::new("short", 2, 2, vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, SBoxError::InvalidLength { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn square_rejects_lengths_that_are_not_powers_of_two() {
        let err = SBox::square("three", vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, SBoxError::InvalidLength { expected: 4, actual: 3, .. }));
        let err = SBox::square("none", Vec::new()).unwrap_err();
        assert!(matches!(err, SBoxError::InvalidLength { actual: 0, .. }));
    }

    #[test]
    fn rejects_values_outside_output_range() {
        let err = SBox::new("wide", 2, 2, vec![0, 1, 2, 4]).unwrap_err();
        assert!(matches!(err, SBoxError::ValueOutOfRange { input: 3, value: 4, .. }));
    }

    #[test]
    fn rejects_oversized_points() {
        let err = SBox::new("huge", 9, 9, vec![0; 512]).unwrap_err();
        assert!(matches!(err, SBoxError::UnsupportedSize { .. }));
    }

    #[test]
    fn inverse_of_permutation() {
        let sbox = SBox::square("toy", vec![2, 0, 3, 1]).unwrap();
        let inv = sbox.inverse().unwrap();
        for x in 0..4 {
            assert_eq!(inv[sbox.apply(x) as usize], x);
        }
    }

    #[test]
    fn non_permutation_has_no_inverse() {
        let sbox = SBox::square("collide", vec![0, 0, 1, 2]).unwrap();
        assert!(!sbox.is_permutation());
        assert_eq!(
            sbox.inverse().unwrap_err(),
            SBoxError::NonBijective {
                name: "collide".into()
            }
        );
    }
}
