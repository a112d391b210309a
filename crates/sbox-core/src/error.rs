//! Error type shared by S-box construction and table generation.

use thiserror::Error;

/// Failures raised while building S-boxes or their property tables.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SBoxError {
    /// The lookup table does not have `2^input_bits` entries.
    #[error("S-box `{name}` has {actual} entries, expected {expected} for {input_bits} input bits")]
    InvalidLength {
        /// S-box name.
        name: String,
        /// Declared input size.
        input_bits: u32,
        /// Required number of entries.
        expected: usize,
        /// Number of entries supplied.
        actual: usize,
    },
    /// An output value does not fit in the declared output size.
    #[error("S-box `{name}` maps {input:#x} to {value:#x}, outside the {output_bits}-bit range")]
    ValueOutOfRange {
        /// S-box name.
        name: String,
        /// Offending input.
        input: u32,
        /// Offending output.
        value: u32,
        /// Declared output size.
        output_bits: u32,
    },
    /// Bit sizes are zero or exceed the supported point width.
    #[error("unsupported S-box size {input_bits}x{output_bits} (each side >= 1 bit, at most {max} bits in total)")]
    UnsupportedSize {
        /// Declared input size.
        input_bits: u32,
        /// Declared output size.
        output_bits: u32,
        /// Maximum total width.
        max: u32,
    },
    /// The boomerang table needs an inverse, but the S-box is not a permutation.
    #[error("S-box `{name}` is not a permutation, cannot invert it for the boomerang table")]
    NonBijective {
        /// S-box name.
        name: String,
    },
    /// Raw table entries do not match the declared table shape.
    #[error("property table has {actual} entries, expected {expected}")]
    ShapeMismatch {
        /// Required number of entries.
        expected: usize,
        /// Number of entries supplied.
        actual: usize,
    },
}
